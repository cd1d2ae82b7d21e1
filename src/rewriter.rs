//! Graph-pattern rewriting.
//!
//! Each triple pattern of the query's BGP is moved into its own
//! `GRAPH ?g_i { ... }` block so that every solution also says which
//! credential graph each matched triple came from.

use std::collections::HashMap;

use rand::{Rng, RngCore};
use spargebra::Query;
use spargebra::algebra::GraphPattern;
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern, Variable};

use crate::error::Result;
use crate::parser::ParsedQuery;
use crate::solution::Solution;
use crate::store::{QueryEngine, QueryOptions};

const GRAPH_VAR_PREFIX_LEN: usize = 20;

/// The extended query and what is needed to read its solutions back.
#[derive(Debug, Clone)]
pub struct RewrittenQuery {
    /// Random prefix shared by every internal variable of this evaluation
    pub prefix: String,
    /// The BGP with blank nodes replaced by internal variables
    pub patterns: Vec<TriplePattern>,
    /// One graph variable per entry of `patterns`
    pub graph_variables: Vec<String>,
    pub query: String,
}

impl RewrittenQuery {
    pub fn is_internal(&self, variable: &str) -> bool {
        variable.starts_with(&self.prefix)
    }
}

/// Build the extended `SELECT DISTINCT *` query for a parsed zk-SPARQL query.
pub fn rewrite<R: RngCore>(parsed: &ParsedQuery, rng: &mut R) -> RewrittenQuery {
    let prefix: String = (0..GRAPH_VAR_PREFIX_LEN)
        .map(|_| rng.random_range(b'a'..=b'z') as char)
        .collect();

    let mut blanks: HashMap<String, Variable> = HashMap::new();
    let mut blank_var = |id: &str| -> TermPattern {
        let next = blanks.len();
        TermPattern::Variable(
            blanks
                .entry(id.to_string())
                .or_insert_with(|| Variable::new_unchecked(format!("{prefix}b{next}")))
                .clone(),
        )
    };

    let patterns: Vec<TriplePattern> = parsed
        .bgp
        .iter()
        .map(|tp| TriplePattern {
            subject: match &tp.subject {
                TermPattern::BlankNode(bn) => blank_var(bn.as_str()),
                other => other.clone(),
            },
            predicate: tp.predicate.clone(),
            object: match &tp.object {
                TermPattern::BlankNode(bn) => blank_var(bn.as_str()),
                other => other.clone(),
            },
        })
        .collect();

    let graph_variables: Vec<String> = (0..patterns.len())
        .map(|i| format!("{prefix}{i}"))
        .collect();

    let graph_blocks = patterns
        .iter()
        .zip(&graph_variables)
        .map(|(tp, gv)| GraphPattern::Graph {
            name: NamedNodePattern::Variable(Variable::new_unchecked(gv.clone())),
            inner: Box::new(GraphPattern::Bgp {
                patterns: vec![tp.clone()],
            }),
        })
        .reduce(|left, right| GraphPattern::Join {
            left: Box::new(left),
            right: Box::new(right),
        })
        .unwrap_or(GraphPattern::Bgp {
            patterns: Vec::new(),
        });

    let mut pattern = replace_bgp(&parsed.pattern, &graph_blocks);
    if let Some(expression) = &parsed.modifiers.order_by {
        pattern = GraphPattern::OrderBy {
            inner: Box::new(pattern),
            expression: expression.clone(),
        };
    }
    pattern = GraphPattern::Distinct {
        inner: Box::new(pattern),
    };
    if parsed.modifiers.start > 0 || parsed.modifiers.length.is_some() {
        pattern = GraphPattern::Slice {
            inner: Box::new(pattern),
            start: parsed.modifiers.start,
            length: parsed.modifiers.length,
        };
    }

    let query = Query::Select {
        dataset: None,
        pattern,
        base_iri: None,
    }
    .to_string();

    RewrittenQuery {
        prefix,
        patterns,
        graph_variables,
        query,
    }
}

/// Swap the group's BGP for `replacement`, visiting the same positions as
/// [`crate::parser::collect_bgps`].
fn replace_bgp(pattern: &GraphPattern, replacement: &GraphPattern) -> GraphPattern {
    match pattern {
        GraphPattern::Bgp { patterns } if !patterns.is_empty() => replacement.clone(),
        GraphPattern::Join { left, right } => GraphPattern::Join {
            left: Box::new(replace_bgp(left, replacement)),
            right: Box::new(replace_bgp(right, replacement)),
        },
        GraphPattern::Filter { expr, inner } => GraphPattern::Filter {
            expr: expr.clone(),
            inner: Box::new(replace_bgp(inner, replacement)),
        },
        GraphPattern::Extend {
            inner,
            variable,
            expression,
        } => GraphPattern::Extend {
            inner: Box::new(replace_bgp(inner, replacement)),
            variable: variable.clone(),
            expression: expression.clone(),
        },
        GraphPattern::LeftJoin {
            left,
            right,
            expression,
        } => GraphPattern::LeftJoin {
            left: Box::new(replace_bgp(left, replacement)),
            right: right.clone(),
            expression: expression.clone(),
        },
        GraphPattern::Minus { left, right } => GraphPattern::Minus {
            left: Box::new(replace_bgp(left, replacement)),
            right: right.clone(),
        },
        other => other.clone(),
    }
}

/// Evaluate the extended query over the union of all credential graphs.
#[tracing::instrument(skip_all, fields(patterns = rewritten.patterns.len()))]
pub async fn find_credential_solutions(
    engine: &dyn QueryEngine,
    rewritten: &RewrittenQuery,
) -> Result<Vec<Solution>> {
    tracing::debug!(query = %rewritten.query, "evaluating extended query");
    let solutions = engine
        .query_bindings(
            &rewritten.query,
            QueryOptions {
                union_default_graph: true,
            },
        )
        .await?;
    tracing::debug!(solutions = solutions.len(), "extended query evaluated");
    Ok(solutions)
}
