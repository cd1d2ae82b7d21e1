//! Placeholder minting for hidden terms.
//!
//! An [`Anonymizer`] lives for one evaluation scope (a solution row by
//! default, see [`crate::config::AnonymizationScope`]). IRIs and blank nodes
//! are memoized so a term hidden twice in the same scope gets the same
//! placeholder; literals get a new placeholder on every call so equal literal
//! values cannot be correlated through their placeholders.

use std::collections::HashMap;

use oxigraph::model::{Literal, NamedNode, NamedOrBlankNode, Term};
use rand::{Rng, RngCore};

use crate::vocab::{ANON_BNODE_PREFIX, ANON_IRI_PREFIX, ANON_LITERAL_PREFIX};

const ID_LEN: usize = 6;
const ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz_-";

pub struct Anonymizer<R> {
    rng: R,
    iri_to_anon: HashMap<String, NamedNode>,
    bnode_to_anon: HashMap<String, NamedNode>,
    // keyed by `value:id`, never read back
    literal_to_anon: HashMap<String, Literal>,
    anon_to_term: HashMap<String, Term>,
}

impl<R: RngCore> Anonymizer<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            iri_to_anon: HashMap::new(),
            bnode_to_anon: HashMap::new(),
            literal_to_anon: HashMap::new(),
            anon_to_term: HashMap::new(),
        }
    }

    /// Draw a placeholder under `prefix` that is not in use in this scope.
    fn mint(&mut self, prefix: &str) -> String {
        loop {
            let id: String = (0..ID_LEN)
                .map(|_| ID_ALPHABET[self.rng.random_range(0..ID_ALPHABET.len())] as char)
                .collect();
            let candidate = format!("{prefix}{id}");
            if !self.anon_to_term.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    fn anonymize_iri(&mut self, iri: &NamedNode) -> NamedNode {
        if let Some(anon) = self.iri_to_anon.get(iri.as_str()) {
            return anon.clone();
        }
        let anon_iri = self.mint(ANON_IRI_PREFIX);
        let anon = NamedNode::new_unchecked(anon_iri.clone());
        self.iri_to_anon.insert(iri.as_str().to_owned(), anon.clone());
        self.anon_to_term.insert(anon_iri, iri.clone().into());
        anon
    }

    /// Hide a subject-position term behind a placeholder IRI.
    pub fn anonymize(&mut self, subject: &NamedOrBlankNode) -> NamedNode {
        match subject {
            NamedOrBlankNode::NamedNode(nn) => self.anonymize_iri(nn),
            NamedOrBlankNode::BlankNode(bn) => {
                if let Some(anon) = self.bnode_to_anon.get(bn.as_str()) {
                    return anon.clone();
                }
                let anon_bnid = self.mint(ANON_BNODE_PREFIX);
                let anon = NamedNode::new_unchecked(anon_bnid.clone());
                self.bnode_to_anon.insert(bn.as_str().to_owned(), anon.clone());
                self.anon_to_term.insert(anon_bnid, bn.clone().into());
                anon
            }
        }
    }

    /// Hide a predicate. Shares the IRI map with subjects and objects.
    pub fn anonymize_predicate(&mut self, predicate: &NamedNode) -> NamedNode {
        self.anonymize_iri(predicate)
    }

    /// Hide an object-position term.
    ///
    /// Returns `None` for term shapes that cannot appear as a plain object.
    pub fn anonymize_object(&mut self, object: &Term) -> Option<Term> {
        match object {
            Term::NamedNode(nn) => Some(self.anonymize_iri(nn).into()),
            Term::BlankNode(bn) => Some(
                self.anonymize(&NamedOrBlankNode::BlankNode(bn.clone()))
                    .into(),
            ),
            Term::Literal(literal) => Some(self.anonymize_literal(literal).into()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    fn anonymize_literal(&mut self, literal: &Literal) -> Literal {
        let anon_value = self.mint(ANON_LITERAL_PREFIX);
        let anon = match literal.language() {
            Some(language) => {
                Literal::new_language_tagged_literal_unchecked(anon_value.clone(), language)
            }
            None => Literal::new_typed_literal(anon_value.clone(), literal.datatype()),
        };
        let key = format!(
            "{}:{}",
            literal.value(),
            &anon_value[ANON_LITERAL_PREFIX.len()..]
        );
        self.literal_to_anon.insert(key, anon.clone());
        self.anon_to_term.insert(anon_value, literal.clone().into());
        anon
    }
}

impl<R> Anonymizer<R> {
    /// Existing placeholder for a subject, without minting.
    pub fn get(&self, subject: &NamedOrBlankNode) -> Option<&NamedNode> {
        match subject {
            NamedOrBlankNode::NamedNode(nn) => self.iri_to_anon.get(nn.as_str()),
            NamedOrBlankNode::BlankNode(bn) => self.bnode_to_anon.get(bn.as_str()),
        }
    }

    /// Existing placeholder for a predicate, without minting.
    pub fn get_predicate(&self, predicate: &NamedNode) -> Option<&NamedNode> {
        self.iri_to_anon.get(predicate.as_str())
    }

    /// Existing placeholder for an object, without minting.
    ///
    /// Literal placeholders are never deduplicated, so literals always miss.
    pub fn get_object(&self, object: &Term) -> Option<Term> {
        match object {
            Term::NamedNode(nn) => self.iri_to_anon.get(nn.as_str()).cloned().map(Into::into),
            Term::BlankNode(bn) => self.bnode_to_anon.get(bn.as_str()).cloned().map(Into::into),
            _ => None,
        }
    }

    /// Reverse map from placeholder string to the original term.
    pub fn anon_to_term(&self) -> &HashMap<String, Term> {
        &self.anon_to_term
    }

    pub fn is_empty(&self) -> bool {
        self.anon_to_term.is_empty()
    }
}
