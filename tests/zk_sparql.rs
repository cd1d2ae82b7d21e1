//! End-to-end evaluation over the bundled vaccination credentials.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use oxigraph::io::RdfFormat;
use oxigraph::model::{NamedNode, Term};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value;

use zk_sparql::store::QueryOptions;
use zk_sparql::vocab::{PROOF_VALUE, RDF_TYPE, VC_TYPE};
use zk_sparql::{
    AnonymizationScope, DerivedCredential, DisclosureOnlyDeriver, InputDocument, JsonLdSerializer,
    JsonResults, OxigraphStore, Processor, ProcessorConfig, ProofDeriver, QueryEngine,
    QueryOutcome, SAMPLE_DATASET, TermJson, ZkSparqlError,
};

const ANON_NAMESPACE: &str = "https://zkp-ld.org/.well-known/genid/anonymous/";

const PREFIXES: &str = "PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>
PREFIX s: <http://schema.org/>
PREFIX : <http://example.org/vocab/>
";

const VACCINATION_BGP: &str = "
    ?s a s:Person .
    ?s :isPatientOf ?ev .
    ?ev :vaccinationDate ?date .
    ?ev :vaccine ?vac .
    ?vac s:status \"active\" .
";

fn vaccination_query(select: &str, tail: &str) -> String {
    format!("{PREFIXES}SELECT {select} WHERE {{ {VACCINATION_BGP} {tail} }}")
}

fn store() -> OxigraphStore {
    let store = OxigraphStore::new().unwrap();
    store.load(RdfFormat::TriG, SAMPLE_DATASET.as_bytes()).unwrap();
    store
}

fn processor() -> Processor {
    Processor::with_oxigraph(store())
}

async fn run(processor: &Processor, query: &str) -> JsonResults {
    processor
        .process_query(query, &mut StdRng::seed_from_u64(2024))
        .await
        .unwrap()
}

fn literal_value(term: &TermJson) -> &str {
    match term {
        TermJson::Literal { value, .. } => value,
        other => panic!("expected literal, got {:?}", other),
    }
}

fn presentation(results: &JsonResults, row: usize) -> Value {
    let bindings = &results.results.as_ref().unwrap().bindings;
    serde_json::from_str(literal_value(&bindings[row]["vp"])).unwrap()
}

fn rows(results: &JsonResults) -> usize {
    results.results.as_ref().unwrap().bindings.len()
}

#[derive(Default)]
struct RecordingDeriver {
    calls: Mutex<Vec<Vec<InputDocument>>>,
}

#[async_trait]
impl ProofDeriver for RecordingDeriver {
    async fn derive_proofs(
        &self,
        inputs: Vec<InputDocument>,
    ) -> zk_sparql::Result<Vec<DerivedCredential>> {
        self.calls.lock().unwrap().push(inputs.clone());
        DisclosureOnlyDeriver.derive_proofs(inputs).await
    }
}

struct UnreachableEngine;

#[async_trait]
impl QueryEngine for UnreachableEngine {
    async fn query(&self, _query: &str, _options: QueryOptions) -> zk_sparql::Result<QueryOutcome> {
        panic!("engine must not be called");
    }
}

#[tokio::test]
async fn select_date_yields_one_row_per_vaccination() {
    let results = run(&processor(), &vaccination_query("?date", "")).await;

    assert_eq!(results.head.vars, vec!["date".to_string(), "vp".to_string()]);
    assert_eq!(rows(&results), 2);

    let mut dates = HashSet::new();
    for binding in &results.results.as_ref().unwrap().bindings {
        let TermJson::Literal {
            value, datatype, ..
        } = &binding["date"]
        else {
            panic!("date should be a literal");
        };
        assert_eq!(
            datatype.as_deref(),
            Some("http://www.w3.org/2001/XMLSchema#dateTime")
        );
        dates.insert(value.clone());
        assert_eq!(binding.len(), 2);
    }
    assert_eq!(
        dates,
        HashSet::from([
            "2022-01-01T00:00:00Z".to_string(),
            "2022-04-04T00:00:00Z".to_string()
        ])
    );
}

#[tokio::test]
async fn presentation_holds_both_credentials_of_a_row() {
    let results = run(&processor(), &vaccination_query("?date", "")).await;

    for row in 0..rows(&results) {
        let vp = presentation(&results, row);
        assert_eq!(vp["type"], "VerifiablePresentation");
        assert_eq!(vp["@context"][0], "https://www.w3.org/2018/credentials/v1");
        let credentials = vp["verifiableCredential"].as_array().unwrap();
        assert_eq!(credentials.len(), 2);
        for credential in credentials {
            assert_eq!(credential["@type"], VC_TYPE);
            let proof = &credential["https://w3id.org/security#proof"];
            assert!(proof["@id"].as_str().unwrap().starts_with("_:"));
            let signature = &proof["@graph"][0];
            assert_eq!(
                signature["@type"],
                "https://w3id.org/security#BbsTermwiseSignature2021"
            );
            assert!(signature.get(PROOF_VALUE).is_none());
        }
        // the holder is hidden
        let text = vp.to_string();
        assert!(!text.contains("did:example:xyz"));
        assert!(!text.contains("did:example:abc"));
        assert!(text.contains(ANON_NAMESPACE));
    }
}

#[tokio::test]
async fn filter_selects_the_later_vaccination() {
    let results = run(
        &processor(),
        &vaccination_query(
            "?date",
            "FILTER(?date > \"2022-03-31T00:00:00Z\"^^xsd:dateTime)",
        ),
    )
    .await;

    assert_eq!(rows(&results), 1);
    let bindings = &results.results.as_ref().unwrap().bindings;
    assert_eq!(literal_value(&bindings[0]["date"]), "2022-04-04T00:00:00Z");
}

#[tokio::test]
async fn out_of_range_filter_yields_no_rows() {
    let results = run(
        &processor(),
        &vaccination_query(
            "?date",
            "FILTER(?date > \"2030-01-01T00:00:00Z\"^^xsd:dateTime)",
        ),
    )
    .await;

    assert_eq!(rows(&results), 0);
    assert_eq!(results.head.vars, vec!["date".to_string(), "vp".to_string()]);
    let json = results.to_json().unwrap();
    assert_eq!(json["results"]["bindings"], serde_json::json!([]));
}

#[tokio::test]
async fn property_path_fails_before_evaluation() {
    let store = Arc::new(store());
    let processor = Processor::new(
        store,
        Arc::new(UnreachableEngine),
        Arc::new(DisclosureOnlyDeriver),
        Arc::new(JsonLdSerializer),
        ProcessorConfig::default(),
    );
    for path in ["s:knows+", "s:knows/s:name", "^s:knows", "s:knows|s:follows"] {
        let query = format!("{PREFIXES}SELECT ?o WHERE {{ ?s {path} ?o }}");
        let result = processor
            .process_query(&query, &mut StdRng::seed_from_u64(0))
            .await;
        assert!(
            matches!(result, Err(ZkSparqlError::PropertyPathUnsupported)),
            "{path} should be rejected"
        );
    }
}

#[tokio::test]
async fn bind_in_where_is_projected() {
    let results = run(
        &processor(),
        &vaccination_query("?date ?year", "BIND(YEAR(?date) AS ?year)"),
    )
    .await;

    assert_eq!(
        results.head.vars,
        vec!["date".to_string(), "year".to_string(), "vp".to_string()]
    );
    assert_eq!(rows(&results), 2);
    for binding in &results.results.as_ref().unwrap().bindings {
        assert_eq!(literal_value(&binding["year"]), "2022");
    }
}

fn types(node: &Value) -> Vec<&str> {
    match &node["@type"] {
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        other => other.as_str().into_iter().collect(),
    }
}

#[tokio::test]
async fn hidden_type_variable_keeps_credential_type() {
    let query = "PREFIX cred: <https://www.w3.org/2018/credentials#>
        SELECT ?s WHERE { ?c a ?t . ?c cred:credentialSubject ?s }";
    let results = run(&processor(), query).await;

    assert_eq!(rows(&results), 3);
    for row in 0..rows(&results) {
        let vp = presentation(&results, row);
        let credentials = vp["verifiableCredential"].as_array().unwrap();
        assert_eq!(credentials.len(), 1);
        assert!(types(&credentials[0]).contains(&VC_TYPE));
        // the credential node itself stays hidden
        let id = credentials[0]["@id"].as_str().unwrap();
        assert!(id.starts_with(ANON_NAMESPACE));
    }
}

#[tokio::test]
async fn wildcard_reveals_every_matched_term() {
    let results = run(
        &processor(),
        &vaccination_query(
            "*",
            "FILTER(?date > \"2022-03-31T00:00:00Z\"^^xsd:dateTime)",
        ),
    )
    .await;

    assert_eq!(rows(&results), 1);
    let binding = &results.results.as_ref().unwrap().bindings[0];
    for var in ["s", "ev", "date", "vac", "vp"] {
        assert!(binding.contains_key(var), "missing {var}");
    }
    assert_eq!(
        binding["s"],
        TermJson::Uri {
            value: "did:example:abc".to_string()
        }
    );
    let vp = presentation(&results, 0).to_string();
    assert!(!vp.contains(ANON_NAMESPACE));
    assert!(vp.contains("did:example:abc"));
}

#[tokio::test]
async fn revealed_documents_keep_identifier_and_resolve_placeholders() {
    let recorder = Arc::new(RecordingDeriver::default());
    let processor = processor().with_deriver(recorder.clone());
    run(&processor, &vaccination_query("?date", "")).await;

    let calls = recorder.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    for inputs in calls.iter() {
        assert_eq!(inputs.len(), 2);
        for input in inputs {
            assert!(input.revealed_document.iter().any(|q| {
                q.predicate.as_str() == RDF_TYPE
                    && q.object == Term::from(NamedNode::new_unchecked(VC_TYPE))
            }));
            assert!(!input.document.is_empty());
            assert_eq!(input.proofs.len(), 1);

            for quad in &input.revealed_document {
                let mut placeholders = Vec::new();
                if quad.subject.to_string().contains(ANON_NAMESPACE) {
                    placeholders.push(quad.subject.to_string());
                }
                match &quad.object {
                    Term::NamedNode(nn) if nn.as_str().starts_with(ANON_NAMESPACE) => {
                        placeholders.push(nn.to_string())
                    }
                    Term::Literal(l) if l.value().starts_with(ANON_NAMESPACE) => {
                        placeholders.push(format!("<{}>", l.value()))
                    }
                    _ => {}
                }
                for placeholder in placeholders {
                    let key = placeholder.trim_start_matches('<').trim_end_matches('>');
                    assert!(input.anon_to_term.contains_key(key), "unresolved {key}");
                }
            }
        }

        // the vaccine is hidden behind one placeholder in both credentials
        let vaccine_link = inputs[0]
            .revealed_document
            .iter()
            .find(|q| q.predicate.as_str() == "http://example.org/vocab/vaccine")
            .unwrap();
        let status = inputs[1]
            .revealed_document
            .iter()
            .find(|q| q.predicate.as_str() == "http://schema.org/status")
            .unwrap();
        assert_eq!(vaccine_link.object.to_string(), status.subject.to_string());
        assert!(status.subject.to_string().contains(ANON_NAMESPACE));
    }
}

#[tokio::test]
async fn row_order_follows_order_by() {
    let results = run(
        &processor(),
        &format!(
            "{PREFIXES}SELECT ?date WHERE {{ {VACCINATION_BGP} }} ORDER BY DESC(?date)"
        ),
    )
    .await;
    let bindings = &results.results.as_ref().unwrap().bindings;
    let dates: Vec<&str> = bindings.iter().map(|b| literal_value(&b["date"])).collect();
    assert_eq!(dates, vec!["2022-04-04T00:00:00Z", "2022-01-01T00:00:00Z"]);

    let limited = run(
        &processor(),
        &format!(
            "{PREFIXES}SELECT ?date WHERE {{ {VACCINATION_BGP} }} ORDER BY ?date LIMIT 1"
        ),
    )
    .await;
    assert_eq!(rows(&limited), 1);
    assert_eq!(
        literal_value(&limited.results.as_ref().unwrap().bindings[0]["date"]),
        "2022-01-01T00:00:00Z"
    );
}

#[tokio::test]
async fn same_seed_gives_same_answer() {
    let query = format!("{PREFIXES}SELECT ?date WHERE {{ {VACCINATION_BGP} }} ORDER BY ?date");
    let processor = processor();
    let a = run(&processor, &query).await;
    let b = run(&processor, &query).await;
    assert_eq!(a, b);

    let c = processor
        .process_query(&query, &mut StdRng::seed_from_u64(1))
        .await
        .unwrap();
    assert_ne!(a, c);
}

#[tokio::test]
async fn ask_reports_boolean_and_presentations() {
    let query = format!("{PREFIXES}ASK {{ ?s a s:Person }}");
    let results = run(&processor(), &query).await;
    assert_eq!(results.boolean, Some(true));
    assert_eq!(results.head.vars, vec!["vp".to_string()]);
    assert_eq!(rows(&results), 2);

    let none = run(
        &processor(),
        &format!("{PREFIXES}ASK {{ ?s a s:Organization }}"),
    )
    .await;
    assert_eq!(none.boolean, Some(false));
}

#[tokio::test]
async fn per_query_scope_shares_placeholders_across_rows() {
    let recorder = Arc::new(RecordingDeriver::default());
    let config = ProcessorConfig {
        anonymization_scope: AnonymizationScope::PerQuery,
        ..ProcessorConfig::default()
    };
    let processor = processor()
        .with_deriver(recorder.clone())
        .with_config(config);
    run(&processor, &vaccination_query("?date", "")).await;

    let calls = recorder.calls.lock().unwrap();
    let vaccine_placeholder = |inputs: &Vec<InputDocument>| {
        inputs[1]
            .revealed_document
            .iter()
            .find(|q| q.predicate.as_str() == "http://schema.org/status")
            .map(|q| q.subject.to_string())
            .unwrap()
    };
    assert_eq!(vaccine_placeholder(&calls[0]), vaccine_placeholder(&calls[1]));
}

#[tokio::test]
async fn custom_vp_key_and_contexts() {
    let config = ProcessorConfig::from_json(
        r#"{"vp_key": "presentation", "contexts": ["https://example.org/context"]}"#,
    )
    .unwrap();
    let processor = processor().with_config(config);
    let results = run(&processor, &vaccination_query("?date", "")).await;
    assert_eq!(
        results.head.vars,
        vec!["date".to_string(), "presentation".to_string()]
    );
    let binding = &results.results.as_ref().unwrap().bindings[0];
    let vp: Value = serde_json::from_str(literal_value(&binding["presentation"])).unwrap();
    assert_eq!(vp["@context"], serde_json::json!(["https://example.org/context"]));
}

#[tokio::test]
async fn plain_query_returns_raw_terms() {
    let json = processor()
        .process_sparql_query(&format!(
            "{PREFIXES}SELECT ?name WHERE {{ ?p a s:Person ; s:name ?name }} ORDER BY ?name"
        ))
        .await
        .unwrap();
    assert_eq!(json["results"]["bindings"][0]["name"]["value"], "Jane Doe");
    assert_eq!(json["results"]["bindings"][1]["name"]["value"], "John Smith");
}
