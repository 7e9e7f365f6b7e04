//! Enrichment pipeline: stubs in, display-ready entries out.
//!
//! Stubs are processed in consecutive batches of `batch_size`. Inside a batch
//! every stub is resolved concurrently and the results are collected by
//! position, so the output always has one entry per input stub, in input
//! order. Batches run strictly one after another.

use futures::future::join_all;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::PokeApi;
use crate::error::{EnrichError, FetchError};
use crate::fetch::FetchState;
use crate::models::{
    ApiLink, EnrichedEntry, EntryCounts, PokemonRecord, PokemonRef, PokemonStub,
};

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Which of a Pokémon's types contribute to its weaknesses and strengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationMode {
    /// Union over every type the Pokémon has.
    #[default]
    AllTypes,
    /// Only the first (slot 1) type.
    FirstType,
}

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub batch_size: usize,
    pub request_timeout: Duration,
    pub relation_mode: RelationMode,
    /// Fetch the species record for the description and evolution family.
    pub fetch_descriptions: bool,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            relation_mode: RelationMode::AllTypes,
            fetch_descriptions: true,
        }
    }
}

/// Entries in input order plus their outcome tally.
#[derive(Debug, Clone, Default)]
pub struct EnrichReport {
    pub entries: Vec<EnrichedEntry>,
    pub counts: EntryCounts,
}

/// Cancellation flag shared between a job and whoever started it.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // sender gone without cancelling
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Enricher<A: PokeApi + ?Sized> {
    api: Arc<A>,
    options: EnrichOptions,
    progress: Option<Arc<Mutex<FetchState>>>,
}

impl<A: PokeApi + ?Sized> Enricher<A> {
    pub fn new(api: Arc<A>, options: EnrichOptions) -> Result<Self, EnrichError> {
        if options.batch_size == 0 {
            return Err(EnrichError::InvalidBatchSize);
        }
        Ok(Self {
            api,
            options,
            progress: None,
        })
    }

    /// Report progress into a shared [`FetchState`] after every batch.
    pub fn with_progress(mut self, progress: Arc<Mutex<FetchState>>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn options(&self) -> &EnrichOptions {
        &self.options
    }

    pub async fn enrich(
        &self,
        stubs: &[PokemonStub],
        cancel: &CancelToken,
    ) -> Result<EnrichReport, EnrichError> {
        let total = stubs.len();
        // a cancelled job must not touch progress a newer job may own
        if cancel.is_cancelled() {
            return Err(self.cancelled(0, total));
        }
        self.update_progress(|st| {
            st.in_progress = true;
            st.fetched = 0;
            st.total = total;
        });
        info!(
            total,
            batch_size = self.options.batch_size,
            mode = ?self.options.relation_mode,
            "enriching pokemon"
        );

        let mut entries = Vec::with_capacity(total);
        for (n, batch) in stubs.chunks(self.options.batch_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(self.cancelled(entries.len(), total));
            }
            let work = join_all(batch.iter().map(|stub| self.enrich_one(stub)));
            let results = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(entries.len(), total)),
                results = work => results,
            };
            entries.extend(results);
            debug!(batch = n, done = entries.len(), total, "batch complete");
            let done = entries.len();
            self.update_progress(|st| st.fetched = done);
        }

        let counts = EntryCounts::tally(&entries);
        self.update_progress(|st| st.in_progress = false);
        info!(
            complete = counts.complete,
            partial = counts.partial,
            failed = counts.failed,
            "enrichment finished"
        );
        Ok(EnrichReport { entries, counts })
    }

    /// Enrich a single Pokémon named directly rather than through a listing.
    pub async fn enrich_ref(&self, which: &PokemonRef) -> EnrichedEntry {
        let stub = PokemonStub::new(which.to_string(), String::new());
        self.enrich_one(&stub).await
    }

    async fn enrich_one(&self, stub: &PokemonStub) -> EnrichedEntry {
        let which = match stub.name.parse::<PokemonRef>() {
            Ok(which) => which,
            Err(e) => return failed(stub, &e),
        };
        let detail = match self.timed(self.api.pokemon(&which)).await {
            Ok(detail) => detail,
            Err(e) => return failed(stub, &e),
        };

        let mut record = PokemonRecord::from_detail(stub, &detail);
        let wanted: Vec<String> = match self.options.relation_mode {
            RelationMode::AllTypes => record.types.clone(),
            RelationMode::FirstType => record.types.iter().take(1).cloned().collect(),
        };
        let species_name = detail
            .species
            .as_ref()
            .map(|s| s.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| record.name.clone());

        let relations = join_all(
            wanted
                .iter()
                .map(|kind| self.timed(self.api.type_relation(kind))),
        );
        let species = async {
            if !self.options.fetch_descriptions {
                return (None, Vec::new());
            }
            let species = match self.timed(self.api.species(&species_name)).await {
                Ok(species) => species,
                Err(e) => {
                    debug!(pokemon = %species_name, error = %e, "no species record");
                    return (None, Vec::new());
                }
            };
            let evolutions = match species.evolution_chain.as_ref().and_then(ApiLink::id) {
                Some(id) => match self.timed(self.api.evolution_chain(id)).await {
                    Ok(chain) => chain.species_names(),
                    Err(e) => {
                        debug!(pokemon = %species_name, chain = id, error = %e, "no evolution chain");
                        Vec::new()
                    }
                },
                None => Vec::new(),
            };
            (species.english_description(), evolutions)
        };
        let (relations, (description, evolutions)) = futures::join!(relations, species);

        let mut weaknesses = IndexSet::new();
        let mut strengths = IndexSet::new();
        let mut missing = Vec::new();
        for (kind, relation) in wanted.iter().zip(relations) {
            match relation {
                Ok(relation) => {
                    let rel = relation.damage_relations;
                    weaknesses.extend(rel.double_damage_from.into_iter().map(|r| r.name));
                    strengths.extend(rel.double_damage_to.into_iter().map(|r| r.name));
                }
                Err(e) => {
                    warn!(pokemon = %record.name, kind = %kind, error = %e, "type relation unavailable");
                    missing.push(kind.clone());
                }
            }
        }
        record.weaknesses = weaknesses.into_iter().collect();
        record.strengths = strengths.into_iter().collect();
        if let Some(description) = description {
            record.description = description;
        }
        record.evolutions = evolutions;

        if missing.is_empty() {
            EnrichedEntry::Complete(record)
        } else {
            EnrichedEntry::Partial {
                record,
                missing_relations: missing,
            }
        }
    }

    async fn timed<T, F>(&self, fut: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        match tokio::time::timeout(self.options.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                after: self.options.request_timeout,
            }),
        }
    }

    fn update_progress(&self, f: impl FnOnce(&mut FetchState)) {
        if let Some(progress) = &self.progress {
            if let Ok(mut st) = progress.lock() {
                f(&mut st);
            }
        }
    }

    fn cancelled(&self, done: usize, total: usize) -> EnrichError {
        info!(done, total, "enrichment cancelled");
        EnrichError::Cancelled
    }
}

fn failed(stub: &PokemonStub, err: &FetchError) -> EnrichedEntry {
    warn!(pokemon = %stub.name, error = %err, "detail fetch failed");
    EnrichedEntry::Failed {
        stub: stub.clone(),
        reason: err.to_string(),
        retryable: err.is_transient(),
    }
}
