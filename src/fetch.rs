use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::api::PokeApi;
use crate::enrich::{CancelToken, EnrichOptions, EnrichReport, Enricher};
use crate::error::{CacheError, EnrichError};
use crate::models::EnrichedEntry;
use crate::sprites::{download_sprites, SpriteSummary};

/// Progress of a background refresh, polled by the UI.
#[derive(Debug, Default, Clone)]
pub struct FetchState {
    pub in_progress: bool,
    pub fetched: usize,
    pub total: usize,
}

impl FetchState {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.fetched as f64 / self.total as f64).clamp(0.0, 1.0)
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshOptions {
    pub limit: usize,
    pub offset: usize,
    pub enrich: EnrichOptions,
    pub data_dir: PathBuf,
    pub fetch_sprites: bool,
}

impl RefreshOptions {
    pub fn cache_path(&self) -> PathBuf {
        cache_path(&self.data_dir)
    }

    pub fn sprite_dir(&self) -> PathBuf {
        sprite_dir(&self.data_dir)
    }
}

pub fn cache_path(data_dir: &Path) -> PathBuf {
    data_dir.join("pokemon.json")
}

pub fn sprite_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("sprites")
}

/// Read a previously saved entry list. A missing file is an empty list.
pub fn load_cache(path: &Path) -> Result<Vec<EnrichedEntry>, CacheError> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&data).map_err(|source| CacheError::Malformed {
        path: path.display().to_string(),
        source,
    })
}

/// Replace the saved entry list wholesale.
pub fn save_cache(path: &Path, entries: &[EnrichedEntry]) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(entries).map_err(|source| CacheError::Malformed {
        path: path.display().to_string(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Outcome of one refresh.
#[derive(Debug, Clone, Default)]
pub struct RefreshOutcome {
    pub report: EnrichReport,
    pub sprites: SpriteSummary,
    /// Total number of Pokémon the API advertises.
    pub available: u32,
}

/// List → enrich → cache → sprites.
///
/// Cache and sprite failures are logged and do not fail the refresh; the
/// fresh entries are returned either way. A cancelled refresh returns
/// [`EnrichError::Cancelled`] and leaves `progress` as it found it at the
/// moment of cancellation, so a newer refresh can own the same state.
pub async fn refresh<A: PokeApi + ?Sized>(
    api: Arc<A>,
    options: &RefreshOptions,
    progress: Option<Arc<Mutex<FetchState>>>,
    cancel: &CancelToken,
) -> Result<RefreshOutcome, EnrichError> {
    info!(limit = options.limit, offset = options.offset, "refreshing pokedex");
    if cancel.is_cancelled() {
        return Err(EnrichError::Cancelled);
    }
    set_progress(&progress, |st| {
        *st = FetchState {
            in_progress: true,
            fetched: 0,
            total: options.limit,
        }
    });

    let listed = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!("refresh cancelled while listing");
            return Err(EnrichError::Cancelled);
        }
        listed = api.list(options.limit, options.offset) => listed,
    };
    let page = match listed {
        Ok(page) => page,
        Err(e) => {
            set_progress(&progress, |st| st.in_progress = false);
            return Err(e.into());
        }
    };

    let mut enricher = Enricher::new(api.clone(), options.enrich.clone())?;
    if let Some(p) = progress {
        enricher = enricher.with_progress(p);
    }
    let report = enricher.enrich(&page.results, cancel).await?;

    let cache = options.cache_path();
    match save_cache(&cache, &report.entries) {
        Ok(()) => info!(path = %cache.display(), entries = report.entries.len(), "cache written"),
        Err(e) => warn!(path = %cache.display(), error = %e, "could not write cache"),
    }

    let sprites = if options.fetch_sprites {
        let records: Vec<_> = report.entries.iter().filter_map(EnrichedEntry::record).collect();
        let summary = download_sprites(
            api.as_ref(),
            &records,
            &options.sprite_dir(),
            options.enrich.batch_size,
            cancel,
        )
        .await;
        info!(
            downloaded = summary.downloaded,
            skipped = summary.skipped,
            failed = summary.failed,
            "sprites synced"
        );
        summary
    } else {
        SpriteSummary::default()
    };

    Ok(RefreshOutcome {
        report,
        sprites,
        available: page.count,
    })
}

type Finished = Arc<Mutex<Option<Result<RefreshOutcome, EnrichError>>>>;

/// A refresh running in the background with its own progress state.
///
/// Each job owns a fresh [`FetchState`], so a cancelled job that is still
/// winding down can never overwrite the gauge of the job that replaced it.
pub struct RefreshJob {
    cancel: CancelToken,
    progress: Arc<Mutex<FetchState>>,
    finished: Finished,
}

impl RefreshJob {
    /// Start [`refresh`] on the current tokio runtime.
    pub fn spawn<A: PokeApi + ?Sized + 'static>(api: Arc<A>, options: RefreshOptions) -> Self {
        let cancel = CancelToken::new();
        let progress = Arc::new(Mutex::new(FetchState {
            in_progress: true,
            fetched: 0,
            total: options.limit,
        }));
        let finished: Finished = Arc::new(Mutex::new(None));

        let token = cancel.clone();
        let state = progress.clone();
        let slot = finished.clone();
        tokio::spawn(async move {
            let result = refresh(api, &options, Some(state.clone()), &token).await;
            set_progress(&Some(state), |st| st.in_progress = false);
            if let Ok(mut slot) = slot.lock() {
                *slot = Some(result);
            }
        });

        Self {
            cancel,
            progress,
            finished,
        }
    }

    pub fn progress(&self) -> Arc<Mutex<FetchState>> {
        self.progress.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The job's result, once, after it has finished.
    pub fn try_take(&self) -> Option<Result<RefreshOutcome, EnrichError>> {
        self.finished.lock().ok().and_then(|mut slot| slot.take())
    }
}

fn set_progress(progress: &Option<Arc<Mutex<FetchState>>>, f: impl FnOnce(&mut FetchState)) {
    if let Some(p) = progress {
        if let Ok(mut st) = p.lock() {
            f(&mut st);
        }
    }
}
