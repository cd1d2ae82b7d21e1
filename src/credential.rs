//! Credential reconstruction.
//!
//! A credential lives in its own named graph; each of its proofs lives in a
//! separate graph named by the object of `sec:proof`. The assembler pulls
//! both out of the store and pairs the full document with its revealed view.

use std::collections::HashMap;

use oxigraph::model::{GraphName, NamedNode, Quad, Term};

use crate::anonymizer::Anonymizer;
use crate::error::Result;
use crate::solution::RevealedGraph;
use crate::store::{QuadPattern, QuadStore, QueryEngine, QueryOptions};
use crate::term::as_subject;
use crate::vocab::{PROOF, RDF_TYPE, VC_TYPE};

/// Everything the proof deriver needs for one credential of one row.
#[derive(Debug, Clone)]
pub struct RevealedCredential {
    pub graph: NamedNode,
    /// Full credential, graph name stripped
    pub document: Vec<Quad>,
    /// One quad set per attached proof, graph names stripped
    pub proofs: Vec<Vec<Quad>>,
    /// Revealed pattern quads plus the anonymized credential metadata
    pub anonymized_document: Vec<Quad>,
    pub anon_to_term: HashMap<String, Term>,
}

/// Load the credential behind a revealed graph and build its anonymized view.
#[tracing::instrument(skip_all, fields(graph = %revealed.graph))]
pub async fn assemble_credential<R>(
    store: &dyn QuadStore,
    engine: &dyn QueryEngine,
    revealed: &RevealedGraph,
    anonymizer: &Anonymizer<R>,
) -> Result<RevealedCredential> {
    let graph = &revealed.graph;

    let document = strip_graph(store.get(&QuadPattern::in_graph(graph.clone())).await?);

    let mut proofs = Vec::new();
    for proof_id in proof_ids(engine, graph).await? {
        let proof_graph = match proof_id {
            Term::NamedNode(nn) => GraphName::NamedNode(nn),
            Term::BlankNode(bn) => GraphName::BlankNode(bn),
            _ => continue,
        };
        proofs.push(strip_graph(store.get(&QuadPattern::in_graph(proof_graph)).await?));
    }

    let metadata = credential_metadata(store, engine, graph).await?;

    let mut anonymized_document = revealed.quads.clone();
    for quad in &metadata {
        let anonymized = anonymize_known_terms(quad, anonymizer);
        if !anonymized_document.contains(&anonymized) {
            anonymized_document.push(anonymized);
        }
    }

    tracing::debug!(
        quads = document.len(),
        proofs = proofs.len(),
        revealed = anonymized_document.len(),
        "Assembled credential"
    );

    Ok(RevealedCredential {
        graph: graph.clone(),
        document,
        proofs,
        anonymized_document,
        anon_to_term: anonymizer.anon_to_term().clone(),
    })
}

/// Objects of `sec:proof` on the credential node of `graph`.
pub async fn proof_ids(engine: &dyn QueryEngine, graph: &NamedNode) -> Result<Vec<Term>> {
    let query = format!(
        "SELECT ?proof WHERE {{ GRAPH {graph} {{ ?cred a <{VC_TYPE}> ; <{PROOF}> ?proof . }} }}"
    );
    let solutions = engine.query_bindings(&query, QueryOptions::default()).await?;
    Ok(solutions
        .iter()
        .filter_map(|s| s.get("proof").cloned())
        .collect())
}

/// Triples of the credential node itself, restricted to `graph`.
///
/// Empty when the graph declares no `VerifiableCredential`.
pub async fn credential_metadata(
    store: &dyn QuadStore,
    engine: &dyn QueryEngine,
    graph: &NamedNode,
) -> Result<Vec<Quad>> {
    let query = format!("SELECT ?cred WHERE {{ GRAPH {graph} {{ ?cred a <{VC_TYPE}> . }} }}");
    let solutions = engine.query_bindings(&query, QueryOptions::default()).await?;
    let Some(credential) = solutions
        .first()
        .and_then(|s| s.get("cred"))
        .and_then(as_subject)
    else {
        return Ok(Vec::new());
    };

    let quads = store
        .get(&QuadPattern::in_graph(graph.clone()).with_subject(credential))
        .await?;
    Ok(strip_graph(quads))
}

/// Swap every term that already has a placeholder in this scope.
///
/// The `rdf:type VerifiableCredential` assertion only gets its subject
/// swapped; the deriver locates the credential node through it.
fn anonymize_known_terms<R>(quad: &Quad, anonymizer: &Anonymizer<R>) -> Quad {
    let subject = anonymizer
        .get(&quad.subject)
        .map(|anon| anon.clone().into())
        .unwrap_or_else(|| quad.subject.clone());
    if is_credential_type(quad) {
        return Quad::new(
            subject,
            quad.predicate.clone(),
            quad.object.clone(),
            GraphName::DefaultGraph,
        );
    }
    let predicate = anonymizer
        .get_predicate(&quad.predicate)
        .cloned()
        .unwrap_or_else(|| quad.predicate.clone());
    let object = anonymizer
        .get_object(&quad.object)
        .unwrap_or_else(|| quad.object.clone());
    Quad::new(subject, predicate, object, GraphName::DefaultGraph)
}

fn is_credential_type(quad: &Quad) -> bool {
    quad.predicate.as_str() == RDF_TYPE
        && matches!(&quad.object, Term::NamedNode(nn) if nn.as_str() == VC_TYPE)
}

fn strip_graph(quads: Vec<Quad>) -> Vec<Quad> {
    quads
        .into_iter()
        .map(|q| Quad::new(q.subject, q.predicate, q.object, GraphName::DefaultGraph))
        .collect()
}
