//! Quad store and SPARQL engine seams.
//!
//! The pipeline talks to storage through two traits: [`QuadStore`] for
//! pattern lookups and [`QueryEngine`] for SPARQL evaluation.
//! [`OxigraphStore`] implements both over an embedded oxigraph store.

use std::io::Read;

use async_trait::async_trait;
use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{GraphName, NamedNode, NamedOrBlankNode, Quad, Term, Triple};
use oxigraph::sparql::{QueryResults, SparqlEvaluator};
use oxigraph::store::Store;

use crate::error::{Result, ZkSparqlError};
use crate::solution::Solution;

/// Lookup pattern; `None` matches anything in that position.
#[derive(Debug, Clone, Default)]
pub struct QuadPattern {
    pub subject: Option<NamedOrBlankNode>,
    pub predicate: Option<NamedNode>,
    pub object: Option<Term>,
    pub graph: Option<GraphName>,
}

impl QuadPattern {
    pub fn in_graph(graph: impl Into<GraphName>) -> Self {
        Self {
            graph: Some(graph.into()),
            ..Self::default()
        }
    }

    pub fn with_subject(mut self, subject: impl Into<NamedOrBlankNode>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

#[async_trait]
pub trait QuadStore: Send + Sync {
    async fn get(&self, pattern: &QuadPattern) -> Result<Vec<Quad>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    /// Match the default graph against the union of all named graphs
    pub union_default_graph: bool,
}

#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Solutions {
        variables: Vec<String>,
        solutions: Vec<Solution>,
    },
    Graph(Vec<Triple>),
    Boolean(bool),
}

#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn query(&self, query: &str, options: QueryOptions) -> Result<QueryOutcome>;

    /// Evaluate a SELECT query and collect its solutions.
    async fn query_bindings(&self, query: &str, options: QueryOptions) -> Result<Vec<Solution>> {
        match self.query(query, options).await? {
            QueryOutcome::Solutions { solutions, .. } => Ok(solutions),
            _ => Err(ZkSparqlError::EngineQuery(
                "expected SELECT results".to_string(),
            )),
        }
    }
}

/// Embedded in-memory oxigraph store.
#[derive(Clone)]
pub struct OxigraphStore {
    store: Store,
}

impl OxigraphStore {
    pub fn new() -> Result<Self> {
        let store = Store::new().map_err(|e| {
            ZkSparqlError::Store(format!("Failed to create in-memory store: {}", e))
        })?;

        tracing::debug!("Created in-memory oxigraph store");

        Ok(Self { store })
    }

    /// Parse a dataset and add its quads to the store.
    ///
    /// Blank nodes are renamed per load so that separately loaded files
    /// cannot share blank nodes by accident.
    pub fn load(&self, format: RdfFormat, reader: impl Read) -> Result<usize> {
        let parser = RdfParser::from_format(format).rename_blank_nodes();
        let mut count = 0;
        for parsed in parser.for_reader(reader) {
            let quad = parsed.map_err(|e| ZkSparqlError::RdfParse(e.to_string()))?;
            self.store
                .insert(&quad)
                .map_err(|e| ZkSparqlError::Store(format!("Failed to insert quad: {}", e)))?;
            count += 1;
        }

        tracing::info!(quads = count, format = format.name(), "Loaded dataset");

        Ok(count)
    }
}

#[async_trait]
impl QuadStore for OxigraphStore {
    async fn get(&self, pattern: &QuadPattern) -> Result<Vec<Quad>> {
        self.store
            .quads_for_pattern(
                pattern.subject.as_ref().map(Into::into),
                pattern.predicate.as_ref().map(Into::into),
                pattern.object.as_ref().map(Into::into),
                pattern.graph.as_ref().map(Into::into),
            )
            .map(|quad| quad.map_err(|e| ZkSparqlError::Store(e.to_string())))
            .collect()
    }
}

#[async_trait]
impl QueryEngine for OxigraphStore {
    async fn query(&self, query: &str, options: QueryOptions) -> Result<QueryOutcome> {
        let mut prepared = SparqlEvaluator::new()
            .parse_query(query)
            .map_err(|e| ZkSparqlError::EngineQuery(format!("Failed to parse query: {}", e)))?;
        if options.union_default_graph {
            prepared.dataset_mut().set_default_graph_as_union();
        }

        // In-memory evaluation runs inline
        let results = prepared
            .on_store(&self.store)
            .execute()
            .map_err(|e| ZkSparqlError::EngineQuery(e.to_string()))?;

        match results {
            QueryResults::Solutions(solutions) => {
                let variables: Vec<String> = solutions
                    .variables()
                    .iter()
                    .map(|v| v.as_str().to_string())
                    .collect();
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| ZkSparqlError::EngineQuery(e.to_string()))?;
                    rows.push(Solution::new(
                        solution
                            .iter()
                            .map(|(variable, term)| (variable.as_str().to_string(), term.clone()))
                            .collect(),
                    ));
                }
                Ok(QueryOutcome::Solutions {
                    variables,
                    solutions: rows,
                })
            }
            QueryResults::Graph(triples) => {
                let triples = triples
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| ZkSparqlError::EngineQuery(e.to_string()))?;
                Ok(QueryOutcome::Graph(triples))
            }
            QueryResults::Boolean(value) => Ok(QueryOutcome::Boolean(value)),
        }
    }
}
