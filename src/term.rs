//! Role guards for RDF terms.
//!
//! Solutions may bind any term shape to a variable; before a bound term is
//! placed back into a quad it has to fit the role of the position it fills.
//! Subjects are IRIs or blank nodes, predicates are IRIs, objects are IRIs,
//! blank nodes or literals.

use oxigraph::model::{NamedNode, NamedOrBlankNode, Term};

pub fn is_disclosable_subject(term: &Term) -> bool {
    matches!(term, Term::NamedNode(_) | Term::BlankNode(_))
}

pub fn is_disclosable_predicate(term: &Term) -> bool {
    matches!(term, Term::NamedNode(_))
}

pub fn is_disclosable_object(term: &Term) -> bool {
    matches!(term, Term::NamedNode(_) | Term::BlankNode(_) | Term::Literal(_))
}

/// Narrow a term to the subject role.
pub fn as_subject(term: &Term) -> Option<NamedOrBlankNode> {
    match term {
        Term::NamedNode(nn) => Some(NamedOrBlankNode::NamedNode(nn.clone())),
        Term::BlankNode(bn) => Some(NamedOrBlankNode::BlankNode(bn.clone())),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

/// Narrow a term to the predicate role.
pub fn as_predicate(term: &Term) -> Option<NamedNode> {
    match term {
        Term::NamedNode(nn) => Some(nn.clone()),
        _ => None,
    }
}

/// Narrow a term to the object role.
pub fn as_object(term: &Term) -> Option<Term> {
    is_disclosable_object(term).then(|| term.clone())
}
