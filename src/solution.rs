//! Per-solution post-processing.
//!
//! Turns one solution of the extended query into the revealed view of every
//! credential graph it touched, plus the bindings the caller asked for.

use oxigraph::model::{GraphName, Literal, NamedNode, Quad, Term};
use rand::RngCore;
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern};

use crate::anonymizer::Anonymizer;
use crate::parser::{Disclosure, ParsedQuery};
use crate::rewriter::RewrittenQuery;
use crate::term::{as_object, as_predicate, as_subject};

/// One row of variable bindings, in engine order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    bindings: Vec<(String, Term)>,
}

impl Solution {
    pub fn new(bindings: Vec<(String, Term)>) -> Self {
        Self { bindings }
    }

    pub fn get(&self, variable: &str) -> Option<&Term> {
        self.bindings
            .iter()
            .find(|(name, _)| name == variable)
            .map(|(_, term)| term)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.bindings.iter().map(|(name, term)| (name.as_str(), term))
    }
}

/// Revealed quads of one credential graph, in the default graph.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealedGraph {
    pub graph: NamedNode,
    pub quads: Vec<Quad>,
}

#[derive(Debug, Clone)]
pub struct RevealedRow {
    /// Credential graphs in first-match order
    pub graphs: Vec<RevealedGraph>,
    /// Projected bindings in SELECT order; unbound variables are absent
    pub bindings: Vec<(String, Term)>,
}

/// Build the revealed view of a solution.
///
/// Placeholders are minted through `anonymizer`, so every graph of the row
/// shares one placeholder table.
pub fn reveal_solution<R: RngCore>(
    solution: &Solution,
    parsed: &ParsedQuery,
    rewritten: &RewrittenQuery,
    anonymizer: &mut Anonymizer<R>,
) -> RevealedRow {
    let mut graphs: Vec<RevealedGraph> = Vec::new();

    for (pattern, graph_variable) in rewritten.patterns.iter().zip(&rewritten.graph_variables) {
        let Some(Term::NamedNode(graph)) = solution.get(graph_variable) else {
            continue;
        };
        let Some(quad) = reveal_quad(pattern, solution, &parsed.disclosure, anonymizer) else {
            tracing::trace!(graph = %graph, "dropping quad with ill-typed binding");
            continue;
        };
        match graphs.iter_mut().find(|revealed| &revealed.graph == graph) {
            Some(revealed) => {
                if !revealed.quads.contains(&quad) {
                    revealed.quads.push(quad);
                }
            }
            None => graphs.push(RevealedGraph {
                graph: graph.clone(),
                quads: vec![quad],
            }),
        }
    }

    let bindings = parsed
        .variables
        .iter()
        .filter_map(|v| solution.get(v).map(|term| (v.clone(), term.clone())))
        .collect();

    RevealedRow { graphs, bindings }
}

fn reveal_quad<R: RngCore>(
    pattern: &TriplePattern,
    solution: &Solution,
    disclosure: &Disclosure,
    anonymizer: &mut Anonymizer<R>,
) -> Option<Quad> {
    let subject = match &pattern.subject {
        TermPattern::Variable(v) => {
            let subject = as_subject(solution.get(v.as_str())?)?;
            if disclosure.discloses(v.as_str()) {
                subject
            } else {
                anonymizer.anonymize(&subject).into()
            }
        }
        other => as_subject(&ground_term(other)?)?,
    };

    let predicate = match &pattern.predicate {
        NamedNodePattern::NamedNode(nn) => NamedNode::new_unchecked(nn.as_str()),
        NamedNodePattern::Variable(v) => {
            let predicate = as_predicate(solution.get(v.as_str())?)?;
            if disclosure.discloses(v.as_str()) {
                predicate
            } else {
                anonymizer.anonymize_predicate(&predicate)
            }
        }
    };

    let object = match &pattern.object {
        TermPattern::Variable(v) => {
            let object = as_object(solution.get(v.as_str())?)?;
            if disclosure.discloses(v.as_str()) {
                object
            } else {
                anonymizer.anonymize_object(&object)?
            }
        }
        other => as_object(&ground_term(other)?)?,
    };

    Some(Quad::new(subject, predicate, object, GraphName::DefaultGraph))
}

/// Concrete query term as a store term.
fn ground_term(pattern: &TermPattern) -> Option<Term> {
    match pattern {
        TermPattern::NamedNode(nn) => Some(NamedNode::new_unchecked(nn.as_str()).into()),
        TermPattern::Literal(l) => {
            let literal = match l.language() {
                Some(language) => {
                    Literal::new_language_tagged_literal_unchecked(l.value(), language)
                }
                None => Literal::new_typed_literal(
                    l.value(),
                    NamedNode::new_unchecked(l.datatype().as_str()),
                ),
            };
            Some(literal.into())
        }
        #[allow(unreachable_patterns)]
        _ => None,
    }
}
