//! Query evaluation driver.

use std::sync::Arc;

use futures::future::try_join_all;
use oxigraph::model::Term;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde_json::Value;

use crate::anonymizer::Anonymizer;
use crate::config::{AnonymizationScope, ProcessorConfig};
use crate::credential::assemble_credential;
use crate::derive::{DisclosureOnlyDeriver, ProofDeriver, derive_presentation};
use crate::error::Result;
use crate::jsonld::{DocumentSerializer, JsonLdSerializer};
use crate::parser::{ParsedQuery, QueryForm, parse_query};
use crate::response::{JsonResults, presentation_literal};
use crate::rewriter::{RewrittenQuery, find_credential_solutions, rewrite};
use crate::solution::{Solution, reveal_solution};
use crate::sparql::process_sparql_query;
use crate::store::{OxigraphStore, QuadStore, QueryEngine};

type Row = Vec<(String, Term)>;

/// Runs zk-SPARQL queries against a credential store.
#[derive(Clone)]
pub struct Processor {
    store: Arc<dyn QuadStore>,
    engine: Arc<dyn QueryEngine>,
    deriver: Arc<dyn ProofDeriver>,
    serializer: Arc<dyn DocumentSerializer>,
    config: ProcessorConfig,
}

impl Processor {
    pub fn new(
        store: Arc<dyn QuadStore>,
        engine: Arc<dyn QueryEngine>,
        deriver: Arc<dyn ProofDeriver>,
        serializer: Arc<dyn DocumentSerializer>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            store,
            engine,
            deriver,
            serializer,
            config,
        }
    }

    /// Processor over an oxigraph store with the disclosure-only deriver.
    pub fn with_oxigraph(store: OxigraphStore) -> Self {
        let store = Arc::new(store);
        Self::new(
            store.clone(),
            store,
            Arc::new(DisclosureOnlyDeriver),
            Arc::new(JsonLdSerializer),
            ProcessorConfig::default(),
        )
    }

    pub fn with_deriver(mut self, deriver: Arc<dyn ProofDeriver>) -> Self {
        self.deriver = deriver;
        self
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn DocumentSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// Evaluate a zk-SPARQL query.
    ///
    /// Every answer row carries a `vp` binding with the presentation of the
    /// credentials the row was derived from. Placeholders and proof graph ids
    /// are drawn from `rng`.
    #[tracing::instrument(skip_all)]
    pub async fn process_query<R: RngCore>(&self, query: &str, rng: &mut R) -> Result<JsonResults> {
        let parsed = parse_query(query)?;
        let rewritten = rewrite(&parsed, rng);
        let solutions = find_credential_solutions(self.engine.as_ref(), &rewritten).await?;
        tracing::info!(
            solutions = solutions.len(),
            scope = ?self.config.anonymization_scope,
            "Matched credential solutions"
        );

        let rows = match self.config.anonymization_scope {
            AnonymizationScope::PerRow => {
                let (parsed, rewritten) = (&parsed, &rewritten);
                let mut pending = Vec::with_capacity(solutions.len());
                for solution in &solutions {
                    let mut anonymizer = Anonymizer::new(StdRng::from_rng(&mut *rng));
                    let mut row_rng = StdRng::from_rng(&mut *rng);
                    pending.push(async move {
                        self.process_row(solution, parsed, rewritten, &mut anonymizer, &mut row_rng)
                            .await
                    });
                }
                try_join_all(pending).await?
            }
            AnonymizationScope::PerQuery => {
                let mut anonymizer = Anonymizer::new(StdRng::from_rng(&mut *rng));
                let mut row_rng = StdRng::from_rng(&mut *rng);
                let mut rows = Vec::with_capacity(solutions.len());
                for solution in &solutions {
                    rows.push(
                        self.process_row(solution, &parsed, &rewritten, &mut anonymizer, &mut row_rng)
                            .await?,
                    );
                }
                rows
            }
        };

        let mut vars = parsed.variables.clone();
        if !vars.contains(&self.config.vp_key) {
            vars.push(self.config.vp_key.clone());
        }
        Ok(match parsed.form {
            QueryForm::Select => JsonResults::select(vars, &rows),
            QueryForm::Ask => JsonResults::ask(vars, &rows),
        })
    }

    /// Evaluate an ordinary SPARQL query without selective disclosure.
    pub async fn process_sparql_query(&self, query: &str) -> Result<Value> {
        process_sparql_query(self.engine.as_ref(), query).await
    }

    async fn process_row<R: RngCore>(
        &self,
        solution: &Solution,
        parsed: &ParsedQuery,
        rewritten: &RewrittenQuery,
        anonymizer: &mut Anonymizer<R>,
        rng: &mut StdRng,
    ) -> Result<Row> {
        let revealed = reveal_solution(solution, parsed, rewritten, anonymizer);

        let mut credentials = Vec::with_capacity(revealed.graphs.len());
        for graph in &revealed.graphs {
            credentials.push(
                assemble_credential(self.store.as_ref(), self.engine.as_ref(), graph, anonymizer)
                    .await?,
            );
        }

        let vp = derive_presentation(
            self.deriver.as_ref(),
            self.serializer.as_ref(),
            &credentials,
            &self.config.contexts,
            rng,
        )
        .await?;

        let mut bindings: Row = revealed
            .bindings
            .into_iter()
            .filter(|(name, _)| *name != self.config.vp_key)
            .collect();
        bindings.push((self.config.vp_key.clone(), presentation_literal(&vp)?));
        Ok(bindings)
    }
}
