use thiserror::Error;

/// Errors raised while evaluating a zk-SPARQL query.
///
/// Every variant is terminal for the evaluation that produced it: the pipeline
/// never returns partial results.
#[derive(Error, Debug)]
pub enum ZkSparqlError {
    /// The query text could not be parsed
    #[error("malformed query: {0}")]
    MalformedQuery(String),

    /// Only SELECT and ASK are accepted
    #[error("query must be SELECT or ASK form")]
    UnsupportedQueryForm,

    /// The SELECT clause projects computed expressions or aggregates
    #[error("query must not contain term expressions")]
    UnsupportedExpression,

    /// The WHERE group has zero or several basic graph patterns
    #[error("WHERE clause must consist of only one basic graph pattern")]
    MultipleOrMissingBgp,

    /// A triple pattern uses a property path as predicate
    #[error("property paths are not supported")]
    PropertyPathUnsupported,

    /// The SPARQL engine failed to evaluate a generated query
    #[error("SPARQL evaluation failed: {0}")]
    EngineQuery(String),

    /// The quad store failed to answer a lookup
    #[error("store access failed: {0}")]
    Store(String),

    /// A derived credential carries no `rdf:type VerifiableCredential` triple
    #[error("a stored VC does not have an identifier")]
    MissingCredentialIdentifier,

    /// The proof derivation subroutine failed or broke its contract
    #[error("proof derivation failed: {0}")]
    ProofDerivation(String),

    /// RDF input could not be parsed while loading a dataset
    #[error("RDF parse error: {0}")]
    RdfParse(String),

    /// JSON (de)serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, ZkSparqlError>;
