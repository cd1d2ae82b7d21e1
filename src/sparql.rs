//! Plain SPARQL evaluation over the credential store, for debugging.
//!
//! Unlike the zk pipeline this returns raw store terms: no anonymization,
//! no proofs.

use oxigraph::model::{GraphName, Quad};
use serde_json::Value;
use spargebra::SparqlParser;

use crate::error::{Result, ZkSparqlError};
use crate::jsonld::graph_to_json;
use crate::response::JsonResults;
use crate::store::{QueryEngine, QueryOptions, QueryOutcome};

/// Evaluate any SPARQL query over the union of all graphs.
///
/// SELECT yields JSON results, ASK a bare boolean answer and
/// CONSTRUCT/DESCRIBE a JSON-LD `@graph` document.
#[tracing::instrument(skip_all)]
pub async fn process_sparql_query(engine: &dyn QueryEngine, query: &str) -> Result<Value> {
    SparqlParser::new()
        .parse_query(query)
        .map_err(|e| ZkSparqlError::MalformedQuery(e.to_string()))?;

    let outcome = engine
        .query(
            query,
            QueryOptions {
                union_default_graph: true,
            },
        )
        .await?;

    match outcome {
        QueryOutcome::Solutions {
            variables,
            solutions,
        } => {
            let rows: Vec<Vec<_>> = solutions
                .iter()
                .map(|s| s.iter().map(|(v, t)| (v.to_string(), t.clone())).collect())
                .collect();
            tracing::debug!(rows = rows.len(), "plain SELECT evaluated");
            JsonResults::select(variables, &rows).to_json()
        }
        QueryOutcome::Boolean(value) => JsonResults::boolean(value).to_json(),
        QueryOutcome::Graph(triples) => {
            let quads: Vec<Quad> = triples
                .into_iter()
                .map(|t| t.in_graph(GraphName::DefaultGraph))
                .collect();
            graph_to_json(&quads)
        }
    }
}
