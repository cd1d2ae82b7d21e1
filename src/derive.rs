//! Proof derivation and presentation assembly.
//!
//! The signature suite is an external collaborator behind [`ProofDeriver`]:
//! it receives every credential of one answer row at once and returns one
//! derived credential per input, in order.

use std::collections::HashMap;

use async_trait::async_trait;
use oxigraph::model::{BlankNode, GraphName, NamedNode, NamedOrBlankNode, Quad, Term};
use rand::{Rng, RngCore};
use serde_json::{Value, json};

use crate::credential::RevealedCredential;
use crate::error::{Result, ZkSparqlError};
use crate::jsonld::DocumentSerializer;
use crate::vocab::{PROOF, PROOF_VALUE, RDF_TYPE, VC_TYPE, VP_TYPE};

/// One credential handed to the deriver.
#[derive(Debug, Clone)]
pub struct InputDocument {
    /// Full credential without `sec:proof` triples
    pub document: Vec<Quad>,
    pub proofs: Vec<Vec<Quad>>,
    /// Revealed view without `sec:proof` triples
    pub revealed_document: Vec<Quad>,
    pub anon_to_term: HashMap<String, Term>,
}

impl From<&RevealedCredential> for InputDocument {
    fn from(credential: &RevealedCredential) -> Self {
        Self {
            document: without_proof_links(&credential.document),
            proofs: credential.proofs.clone(),
            revealed_document: without_proof_links(&credential.anonymized_document),
            anon_to_term: credential.anon_to_term.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DerivedCredential {
    pub document: Vec<Quad>,
    pub proofs: Vec<Vec<Quad>>,
}

#[async_trait]
pub trait ProofDeriver: Send + Sync {
    /// Derive proofs for all credentials of one row; output order follows input.
    async fn derive_proofs(&self, inputs: Vec<InputDocument>) -> Result<Vec<DerivedCredential>>;
}

/// Returns the revealed documents unchanged and the original proofs without
/// their `sec:proofValue`, showing what a derivation would disclose.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisclosureOnlyDeriver;

#[async_trait]
impl ProofDeriver for DisclosureOnlyDeriver {
    async fn derive_proofs(&self, inputs: Vec<InputDocument>) -> Result<Vec<DerivedCredential>> {
        Ok(inputs
            .into_iter()
            .map(|input| DerivedCredential {
                document: input.revealed_document,
                proofs: input
                    .proofs
                    .into_iter()
                    .map(|proof| {
                        proof
                            .into_iter()
                            .filter(|q| q.predicate.as_str() != PROOF_VALUE)
                            .collect()
                    })
                    .collect(),
            })
            .collect())
    }
}

fn without_proof_links(quads: &[Quad]) -> Vec<Quad> {
    quads
        .iter()
        .filter(|q| q.predicate.as_str() != PROOF)
        .cloned()
        .collect()
}

/// Subject of the `rdf:type VerifiableCredential` triple.
pub fn credential_id(document: &[Quad]) -> Option<&NamedOrBlankNode> {
    document
        .iter()
        .find(|q| {
            q.predicate.as_str() == RDF_TYPE
                && matches!(&q.object, Term::NamedNode(nn) if nn.as_str() == VC_TYPE)
        })
        .map(|q| &q.subject)
}

/// Derive proofs for one row and wrap the result in a presentation.
#[tracing::instrument(skip_all, fields(credentials = credentials.len()))]
pub async fn derive_presentation<R: RngCore>(
    deriver: &dyn ProofDeriver,
    serializer: &dyn DocumentSerializer,
    credentials: &[RevealedCredential],
    contexts: &[String],
    rng: &mut R,
) -> Result<Value> {
    let inputs: Vec<InputDocument> = credentials.iter().map(InputDocument::from).collect();
    let expected = inputs.len();
    let derived = if inputs.is_empty() {
        Vec::new()
    } else {
        deriver.derive_proofs(inputs).await?
    };
    if derived.len() != expected {
        return Err(ZkSparqlError::ProofDerivation(format!(
            "expected {} derived credentials, got {}",
            expected,
            derived.len()
        )));
    }

    let mut verifiable_credentials = Vec::with_capacity(derived.len());
    for DerivedCredential { document, proofs } in derived {
        let id = credential_id(&document)
            .cloned()
            .ok_or(ZkSparqlError::MissingCredentialIdentifier)?;
        let proof_predicate = NamedNode::new_unchecked(PROOF);

        let mut quads = document;
        let mut proof_quads = Vec::new();
        for proof in proofs {
            let graph_id = BlankNode::new_from_unique_id(rng.random::<u128>());
            quads.push(Quad::new(
                id.clone(),
                proof_predicate.clone(),
                graph_id.clone(),
                GraphName::DefaultGraph,
            ));
            proof_quads.extend(
                proof
                    .into_iter()
                    .map(|q| Quad::new(q.subject, q.predicate, q.object, graph_id.clone())),
            );
        }
        quads.extend(proof_quads);

        verifiable_credentials.push(serializer.credential_to_json(&quads)?);
    }

    Ok(json!({
        "@context": contexts,
        "type": VP_TYPE,
        "verifiableCredential": verifiable_credentials,
    }))
}
