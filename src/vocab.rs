//! IRIs and fixed strings shared across the pipeline.

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

pub const VC_TYPE: &str = "https://www.w3.org/2018/credentials#VerifiableCredential";
pub const VP_TYPE: &str = "VerifiablePresentation";

pub const PROOF: &str = "https://w3id.org/security#proof";
pub const PROOF_VALUE: &str = "https://w3id.org/security#proofValue";

// Placeholder namespaces, one per anonymized term kind
pub const ANON_IRI_PREFIX: &str = "https://zkp-ld.org/.well-known/genid/anonymous/iri#";
pub const ANON_BNODE_PREFIX: &str = "https://zkp-ld.org/.well-known/genid/anonymous/bnid#";
pub const ANON_LITERAL_PREFIX: &str = "https://zkp-ld.org/.well-known/genid/anonymous/literal#";

/// JSON-LD contexts attached to every presentation.
pub const DEFAULT_CONTEXTS: [&str; 3] = [
    "https://www.w3.org/2018/credentials/v1",
    "https://zkp-ld.org/bbs-termwise-2021.jsonld",
    "https://schema.org",
];

pub const DEFAULT_VP_KEY: &str = "vp";
