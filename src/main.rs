use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event as CEvent};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use pokedex_tui::api::{page_offset, HttpPokeApi};
use pokedex_tui::config::Config;
use pokedex_tui::enrich::{CancelToken, Enricher, RelationMode};
use pokedex_tui::error::EnrichError;
use pokedex_tui::favorites::{self, FavoritesStore, FileFavorites, MemoryFavorites};
use pokedex_tui::fetch::{self, RefreshJob};
use pokedex_tui::models::{EnrichedEntry, PokemonRef};
use pokedex_tui::ui::{draw_ui, App, KeyAction};
use pokedex_tui::utils::{describe_record, format_name};
use pokedex_tui::logging;

#[derive(Parser, Debug)]
#[command(name = "pokedex", version, about = "Terminal Pokédex backed by PokeAPI")]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Where the entry cache, sprites, favorites and log live
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    batch_size: Option<usize>,

    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Only look up damage relations for a Pokémon's first type
    #[arg(long, global = true)]
    first_type_only: bool,

    #[arg(long, global = true)]
    no_sprites: bool,

    /// Keep favorites in memory only for this session
    #[arg(long, global = true)]
    no_persist: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive viewer (default)
    Tui,
    /// Fetch, enrich and cache Pokémon, then exit
    Fetch {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, conflicts_with = "page")]
        offset: Option<usize>,
        /// 1-based page of `limit` entries
        #[arg(long)]
        page: Option<usize>,
    },
    /// Print one Pokémon
    Show {
        /// Name or Pokédex number
        which: String,
        /// Skip the cache and ask the API
        #[arg(long)]
        online: bool,
    },
    /// Manage favorites
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },
}

#[derive(Subcommand, Debug)]
enum FavoritesAction {
    List,
    Add { id: u32 },
    Remove { id: u32 },
    Toggle { id: u32 },
}

impl Cli {
    fn resolve_config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        config.apply_env(|k| std::env::var(k).ok())?;
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(n) = self.batch_size {
            config.batch_size = n;
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout_secs = secs;
        }
        if self.first_type_only {
            config.relation_mode = RelationMode::FirstType;
        }
        if self.no_sprites {
            config.fetch_sprites = false;
        }
        if let Some(Command::Fetch { limit, offset, page }) = &self.command {
            if let Some(limit) = limit {
                config.limit = *limit;
            }
            if let Some(offset) = offset {
                config.offset = *offset;
            }
            if let Some(page) = page {
                if *page == 0 {
                    bail!("--page is 1-based");
                }
                config.offset = page_offset(*page, config.limit);
            }
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();
    let config = cli.resolve_config()?;

    match cli.command.take().unwrap_or(Command::Tui) {
        Command::Tui => {
            if let Err(e) = logging::init_file(&config.data_dir) {
                eprintln!("logging disabled: {}", e);
            }
            run_tui(config, cli.no_persist).await
        }
        Command::Fetch { .. } => {
            logging::init_stderr();
            run_fetch(config).await
        }
        Command::Show { which, online } => {
            logging::init_stderr();
            run_show(config, &which, online).await
        }
        Command::Favorites { action } => {
            logging::init_stderr();
            run_favorites(config, action)
        }
    }
}

fn api_for(config: &Config) -> anyhow::Result<Arc<HttpPokeApi>> {
    let api = HttpPokeApi::new(&config.api_base_url, config.request_timeout())
        .context("building HTTP client")?;
    Ok(Arc::new(api))
}

async fn run_fetch(config: Config) -> anyhow::Result<()> {
    let api = api_for(&config)?;
    let options = config.refresh_options();
    eprintln!(
        "Fetching {} Pokémon from offset {} (batch size {})...",
        options.limit, options.offset, options.enrich.batch_size
    );

    let cancel = CancelToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let outcome = fetch::refresh(api, &options, None, &cancel).await?;
    let c = outcome.report.counts;
    eprintln!(
        "Fetch complete: {} complete, {} partial, {} failed ({} available) saved to {}",
        c.complete,
        c.partial,
        c.failed,
        outcome.available,
        options.cache_path().display()
    );
    if options.fetch_sprites {
        eprintln!(
            "Sprites: {} downloaded, {} already present, {} failed",
            outcome.sprites.downloaded, outcome.sprites.skipped, outcome.sprites.failed
        );
    }
    for entry in &outcome.report.entries {
        if let EnrichedEntry::Failed { stub, reason, .. } = entry {
            eprintln!("  x {}: {}", stub.name, reason);
        }
    }
    Ok(())
}

async fn run_show(config: Config, which: &str, online: bool) -> anyhow::Result<()> {
    let which: PokemonRef = which.parse()?;

    let cached = if online {
        None
    } else {
        let entries = fetch::load_cache(&fetch::cache_path(&config.data_dir))?;
        entries.into_iter().find(|e| match &which {
            PokemonRef::Id(id) => e.id() == Some(*id),
            PokemonRef::Name(name) => e.name() == name.as_str(),
        })
    };

    let entry = match cached {
        Some(entry) if !entry.is_failed() => entry,
        _ => {
            let api = api_for(&config)?;
            let enricher = Enricher::new(api, config.enrich_options())?;
            enricher.enrich_ref(&which).await
        }
    };

    match entry {
        EnrichedEntry::Complete(record) => println!("{}", describe_record(&record)),
        EnrichedEntry::Partial {
            record,
            missing_relations,
        } => {
            println!("{}", describe_record(&record));
            println!(
                "(incomplete: no relation data for {})",
                missing_relations.join(", ")
            );
        }
        EnrichedEntry::Failed { stub, reason, .. } => {
            bail!("{}: {}", format_name(&stub.name), reason)
        }
    }
    Ok(())
}

fn run_favorites(config: Config, action: FavoritesAction) -> anyhow::Result<()> {
    let store = FileFavorites::open(&config.data_dir)?;
    let set = match action {
        FavoritesAction::List => store.get()?,
        FavoritesAction::Add { id } => store.set(id, true)?,
        FavoritesAction::Remove { id } => store.set(id, false)?,
        FavoritesAction::Toggle { id } => {
            let now = store.toggle(id)?;
            println!("#{} is {}a favorite", id, if now { "now " } else { "no longer " });
            store.get()?
        }
    };

    let names = fetch::load_cache(&fetch::cache_path(&config.data_dir)).unwrap_or_default();
    for id in set {
        match names.iter().find(|e| e.id() == Some(id)) {
            Some(e) => println!("{:>4} {}", id, format_name(e.name())),
            None => println!("{:>4}", id),
        }
    }
    Ok(())
}

async fn run_tui(config: Config, no_persist: bool) -> anyhow::Result<()> {
    let api = api_for(&config)?;
    let options = config.refresh_options();
    let (store, favorites_error): (Arc<dyn FavoritesStore>, _) = if no_persist {
        (Arc::new(MemoryFavorites::default()), None)
    } else {
        favorites::open_or_memory(&config.data_dir)
    };

    let entries = fetch::load_cache(&options.cache_path()).unwrap_or_else(|e| {
        warn!(error = %e, "ignoring unreadable cache");
        vec![]
    });

    let mut app = App::new(entries, store, options.sprite_dir(), config.page_size);
    app.show_sprites = config.fetch_sprites;
    if let Some(e) = favorites_error {
        app.status = Some(format!("favorites not saved this session: {}", e));
    }
    app.preload_sprites();

    // Refresh in the background when the cache holds fewer entries than asked for.
    let mut job = None;
    if app.entries.len() < options.limit {
        info!(cached = app.entries.len(), limit = options.limit, "cache short, refreshing");
        let started = RefreshJob::spawn(api.clone(), options.clone());
        app.fetch_state = Some(started.progress());
        job = Some(started);
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut app, &mut job, || {
        RefreshJob::spawn(api.clone(), options.clone())
    });

    if let Some(job) = job {
        job.cancel();
    }
    disable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(LeaveAlternateScreen)?;
    result
}

fn event_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    job: &mut Option<RefreshJob>,
    start_refresh: impl Fn() -> RefreshJob,
) -> anyhow::Result<()> {
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();

    loop {
        draw_ui(terminal, app)?;

        let finished = job.as_ref().and_then(RefreshJob::try_take);
        if let Some(result) = finished {
            *job = None;
            match result {
                Ok(outcome) => {
                    let c = outcome.report.counts;
                    app.status = Some(format!(
                        "refreshed {} entries ({} partial, {} failed)",
                        c.total(),
                        c.partial,
                        c.failed
                    ));
                    app.set_entries(outcome.report.entries);
                }
                Err(EnrichError::Cancelled) => {}
                Err(e) => {
                    warn!(error = %e, "refresh failed");
                    app.status = Some(format!("refresh failed: {}", e));
                }
            }
        }
        app.sync_favorites();

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));
        if event::poll(timeout)? {
            if let CEvent::Key(key) = event::read()? {
                match app.on_key(key.code) {
                    KeyAction::Quit => break,
                    KeyAction::Refresh => {
                        // the old job keeps its own progress; only the new one is shown
                        if let Some(old) = job.take() {
                            old.cancel();
                        }
                        let started = start_refresh();
                        app.fetch_state = Some(started.progress());
                        app.status = Some("refreshing...".to_string());
                        *job = Some(started);
                    }
                    KeyAction::None => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }
    Ok(())
}
