//! zk-SPARQL - Library
//!
//! Selective-disclosure SPARQL over a store of signed RDF credentials.
//!
//! # Architecture
//!
//! 1. Parse the query and isolate its basic graph pattern (`parser`)
//! 2. Rewrite every triple pattern into its own `GRAPH ?g { ... }` block and
//!    evaluate over the union of all credential graphs (`rewriter`)
//! 3. Per solution, split each matched credential into revealed terms and
//!    anonymized placeholders (`solution`, `anonymizer`)
//! 4. Load the full credentials and their proofs (`credential`)
//! 5. Derive proofs and wrap the credentials in a presentation (`derive`)
//! 6. Serialize the bindings plus `vp` as SPARQL JSON results (`response`)

pub mod anonymizer;
pub mod config;
pub mod credential;
pub mod derive;
pub mod error;
pub mod jsonld;
pub mod parser;
pub mod processor;
pub mod response;
pub mod rewriter;
pub mod solution;
pub mod sparql;
pub mod store;
pub mod syntax;
pub mod term;
pub mod vocab;

pub use anonymizer::Anonymizer;
pub use config::{AnonymizationScope, ProcessorConfig};
pub use credential::RevealedCredential;
pub use derive::{DerivedCredential, DisclosureOnlyDeriver, InputDocument, ProofDeriver};
pub use error::{Result, ZkSparqlError};
pub use jsonld::{DocumentSerializer, JsonLdSerializer};
pub use parser::{Disclosure, ParsedQuery, QueryForm, parse_query};
pub use processor::Processor;
pub use response::{JsonResults, TermJson};
pub use solution::Solution;
pub use store::{OxigraphStore, QuadPattern, QuadStore, QueryEngine, QueryOptions, QueryOutcome};

/// Sample credentials: two vaccination credentials and one vaccine description.
pub const SAMPLE_DATASET: &str = include_str!("../data/vaccination.trig");
