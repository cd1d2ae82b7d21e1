//! Query parsing and shape validation.
//!
//! A zk-SPARQL query is an ordinary SELECT or ASK query whose WHERE group
//! holds exactly one basic graph pattern. That BGP is what gets matched
//! against the signed credential graphs; every other clause of the group
//! (FILTER, OPTIONAL, MINUS, BIND, VALUES, UNION...) rides along untouched.

use std::collections::BTreeSet;

use spargebra::algebra::{GraphPattern, OrderExpression};
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern};
use spargebra::{Query, SparqlParser};

use crate::error::{Result, ZkSparqlError};
use crate::syntax::SurfaceSyntax;

// =============================================================================
// DATA TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryForm {
    Select,
    Ask,
}

/// Which bound variables may appear verbatim in revealed documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disclosure {
    /// Every variable of the BGP is projected
    All,
    Variables(Vec<String>),
}

impl Disclosure {
    pub fn discloses(&self, variable: &str) -> bool {
        match self {
            Disclosure::All => true,
            Disclosure::Variables(vars) => vars.iter().any(|v| v == variable),
        }
    }
}

/// Solution modifiers peeled off the query root.
#[derive(Debug, Clone, Default)]
pub struct Modifiers {
    pub order_by: Option<Vec<OrderExpression>>,
    pub start: usize,
    pub length: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub form: QueryForm,
    /// Projected variables in SELECT clause order, empty for ASK
    pub variables: Vec<String>,
    pub disclosure: Disclosure,
    /// Triple patterns of the single basic graph pattern
    pub bgp: Vec<TriplePattern>,
    /// The WHERE group without solution modifiers
    pub pattern: GraphPattern,
    pub modifiers: Modifiers,
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse and validate a zk-SPARQL query.
pub fn parse_query(query: &str) -> Result<ParsedQuery> {
    let parsed = SparqlParser::new()
        .parse_query(query)
        .map_err(|e| ZkSparqlError::MalformedQuery(e.to_string()))?;

    let (form, root, dataset) = match parsed {
        Query::Select {
            pattern, dataset, ..
        } => (QueryForm::Select, pattern, dataset),
        Query::Ask {
            pattern, dataset, ..
        } => (QueryForm::Ask, pattern, dataset),
        Query::Construct { .. } | Query::Describe { .. } => {
            return Err(ZkSparqlError::UnsupportedQueryForm);
        }
    };
    if dataset.is_some() {
        tracing::warn!("FROM / FROM NAMED clauses are ignored; credentials are matched across all graphs");
    }

    let syntax = SurfaceSyntax::scan(query);
    if syntax.path_operator {
        return Err(ZkSparqlError::PropertyPathUnsupported);
    }
    if syntax.projected_expression {
        return Err(ZkSparqlError::UnsupportedExpression);
    }

    let (pattern, projection, modifiers) = peel_modifiers(root)?;
    // ASK projects its in-scope variables but reveals none of them
    let projection = match form {
        QueryForm::Select => projection,
        QueryForm::Ask => Vec::new(),
    };

    let mut bgps = Vec::new();
    collect_bgps(&pattern, &mut bgps)?;
    if bgps.len() != 1 {
        return Err(ZkSparqlError::MultipleOrMissingBgp);
    }
    let bgp = bgps.remove(0).to_vec();

    let disclosure = disclosure_for(&bgp, &projection);

    Ok(ParsedQuery {
        form,
        variables: projection,
        disclosure,
        bgp,
        pattern,
        modifiers,
    })
}

/// Strip `Slice`, `Distinct`/`Reduced`, `Project` and `OrderBy` from a query
/// root, rejecting aggregates.
fn peel_modifiers(root: GraphPattern) -> Result<(GraphPattern, Vec<String>, Modifiers)> {
    let mut modifiers = Modifiers::default();
    let mut current = root;

    if let GraphPattern::Slice {
        inner,
        start,
        length,
    } = current
    {
        modifiers.start = start;
        modifiers.length = length;
        current = *inner;
    }
    // The rewritten query is always DISTINCT
    if let GraphPattern::Distinct { inner } | GraphPattern::Reduced { inner } = current {
        current = *inner;
    }

    let projection: Vec<String> = match current {
        GraphPattern::Project { inner, variables } => {
            current = *inner;
            variables.iter().map(|v| v.as_str().to_string()).collect()
        }
        ref other => {
            let mut vars = BTreeSet::new();
            other.on_in_scope_variable(|v| {
                vars.insert(v.as_str().to_string());
            });
            vars.into_iter().collect()
        }
    };

    if let GraphPattern::OrderBy { inner, expression } = current {
        modifiers.order_by = Some(expression);
        current = *inner;
    }

    // GROUP BY, possibly under HAVING
    let mut top = &current;
    while let GraphPattern::Filter { inner, .. } = top {
        top = &**inner;
    }
    if let GraphPattern::Group { .. } = top {
        return Err(ZkSparqlError::UnsupportedExpression);
    }

    Ok((current, projection, modifiers))
}

/// Collect the non-empty BGPs of the WHERE group itself.
///
/// Only the positions that belong to the group are visited: both sides of a
/// join, the input of FILTER and BIND, and the left side of OPTIONAL and MINUS.
/// Nested groups (UNION branches, OPTIONAL bodies, GRAPH blocks) are opaque.
pub(crate) fn collect_bgps<'a>(
    pattern: &'a GraphPattern,
    out: &mut Vec<&'a [TriplePattern]>,
) -> Result<()> {
    match pattern {
        GraphPattern::Bgp { patterns } => {
            if !patterns.is_empty() {
                out.push(patterns);
            }
        }
        GraphPattern::Path { .. } => return Err(ZkSparqlError::PropertyPathUnsupported),
        GraphPattern::Join { left, right } => {
            collect_bgps(left, out)?;
            collect_bgps(right, out)?;
        }
        GraphPattern::Filter { inner, .. } | GraphPattern::Extend { inner, .. } => {
            collect_bgps(inner, out)?;
        }
        GraphPattern::LeftJoin { left, .. } | GraphPattern::Minus { left, .. } => {
            collect_bgps(left, out)?;
        }
        _ => {}
    }
    Ok(())
}

/// Variables named in a triple pattern, blank nodes excluded.
pub(crate) fn pattern_variables(pattern: &TriplePattern) -> Vec<&str> {
    let mut vars = Vec::new();
    if let TermPattern::Variable(v) = &pattern.subject {
        vars.push(v.as_str());
    }
    if let NamedNodePattern::Variable(v) = &pattern.predicate {
        vars.push(v.as_str());
    }
    if let TermPattern::Variable(v) = &pattern.object {
        vars.push(v.as_str());
    }
    vars
}

fn disclosure_for(bgp: &[TriplePattern], projection: &[String]) -> Disclosure {
    let all_projected = bgp
        .iter()
        .flat_map(pattern_variables)
        .all(|v| projection.iter().any(|p| p == v));
    if all_projected && !projection.is_empty() {
        Disclosure::All
    } else {
        Disclosure::Variables(projection.to_vec())
    }
}
