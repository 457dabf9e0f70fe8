use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::assemble::Assembler;
use crate::config::{self, Config};
use crate::feed::FeedState;
use crate::loader::Loader;
use crate::manifest::{Manifest, ManifestProvider};
use crate::media::{self, MediaKind, Resolver};
use crate::model::FeedItem;
use crate::refresh::RefreshController;
use crate::scan;
use crate::source;
use crate::view::{self, Expanded, Page};

const RENDER_WIDTH: usize = 80;

#[derive(Debug, Parser)]
#[command(name = "prism-feed", version, about = "Assemble a social feed from static JSON fixtures.")]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true, env = "PRISM_FEED_CONFIG")]
    pub config: Option<PathBuf>,

    /// Site root: an http(s) URL or a local directory
    #[arg(long, global = true)]
    pub source: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan the fixture tree and write the file manifest
    Generate(GenerateArgs),
    /// Assemble the feed once and print it
    Feed(FeedArgs),
    /// Re-assemble whenever the manifest changes
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Content directory to scan (defaults to <source>/<content root>)
    pub root: Option<PathBuf>,

    /// Output file (defaults to <source>/<manifest path>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct FeedArgs {
    /// Only show posts matching this text
    #[arg(short, long)]
    pub search: Option<String>,

    #[arg(short, long, default_value_t = 1)]
    pub page: usize,

    /// Show every comment thread expanded
    #[arg(short, long)]
    pub expand: bool,

    /// Print the page as JSON
    #[arg(long)]
    pub json: bool,

    /// Fix the random source for reproducible ordering
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run(cli: Cli) -> Result<()> {
    let mut cfg = config::load(config::LoadOptions {
        config_file: cli.config.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    if let Some(base) = cli.source {
        cfg.source.base = base;
    }

    match cli.command {
        Command::Generate(args) => generate(&cfg, args),
        Command::Feed(args) => show_feed(&cfg, args),
        Command::Watch(args) => watch(&cfg, args),
    }
}

fn generate(cfg: &Config, args: GenerateArgs) -> Result<()> {
    let base = Path::new(&cfg.source.base);
    let root = args
        .root
        .unwrap_or_else(|| base.join(&cfg.source.content_root));
    let output = args
        .output
        .unwrap_or_else(|| base.join(&cfg.source.manifest_path));

    let manifest = scan::generate(&root).context("generate manifest")?;
    scan::write(&manifest, &output).context("write manifest")?;

    println!("Generated manifest with:");
    println!("   - {} posts", manifest.posts.len());
    println!("   - {} profiles", manifest.profiles.len());
    println!("   - {} unique replies", manifest.replies.unique.len());
    println!("   - {} generic replies", manifest.replies.generic.len());
    println!("Manifest saved to {}", output.display());
    Ok(())
}

fn show_feed(cfg: &Config, args: FeedArgs) -> Result<()> {
    let loader = build_loader(cfg)?;
    let provider = ManifestProvider::new(loader.clone(), cfg.source.manifest_path.clone());
    let manifest = provider.load(false).unwrap_or_default();

    let items = assemble(cfg, loader.clone(), &manifest, args.seed);
    let matches = view::search(&items, args.search.as_deref().unwrap_or_default());
    let page = Page::new(cfg.feed.page_size);
    let number = args.page.clamp(1, page.count(matches.len()));
    let shown = page.slice(&matches, number);

    let mut stdout = io::stdout().lock();
    if args.json {
        let json = serde_json::to_string_pretty(shown).context("serialize feed")?;
        writeln!(stdout, "{json}")?;
        return Ok(());
    }

    let mut expanded = Expanded::default();
    if args.expand {
        expanded.expand_all(shown.iter().copied());
    }
    let images = resolve_images(cfg, &loader, shown);
    write!(
        stdout,
        "{}",
        view::render(shown, &images, &expanded, RENDER_WIDTH, Utc::now())
    )?;
    writeln!(
        stdout,
        "Page {number}/{} · {} of {} posts",
        page.count(matches.len()),
        matches.len(),
        items.len()
    )?;
    Ok(())
}

fn watch(cfg: &Config, args: WatchArgs) -> Result<()> {
    let loader = build_loader(cfg)?;
    let provider = ManifestProvider::new(loader.clone(), cfg.source.manifest_path.clone());
    let state = Arc::new(FeedState::new());

    let runs: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));

    let callback_cfg = cfg.clone();
    let callback_state = state.clone();
    let callback_runs = runs.clone();
    let controller = RefreshController::new(provider, cfg.refresh.interval, move |manifest| {
        let generation = callback_state.begin();
        let cfg = callback_cfg.clone();
        let loader = loader.clone();
        let state = callback_state.clone();
        let seed = args.seed.map(|seed| seed.wrapping_add(generation.value()));
        let run = thread::spawn(move || {
            let items = assemble(&cfg, loader, &manifest, seed);
            let count = items.len();
            if state.commit(generation, items) {
                println!(
                    "[{}] feed refreshed: {count} posts (manifest {})",
                    generation.value(),
                    manifest.last_updated
                );
            }
        });
        let mut runs = callback_runs.lock();
        runs.retain(|run| !run.is_finished());
        runs.push(run);
    })
    .with_error_hook(|path| warn!(path, "watch: manifest check failed"));

    controller.start();
    info!(source = %cfg.source.base, "watch: press enter to stop");

    let mut line = String::new();
    if let Err(err) = io::stdin().lock().read_line(&mut line) {
        warn!("watch: stdin closed: {err}");
    }
    controller.stop();

    let pending: Vec<JoinHandle<()>> = runs.lock().drain(..).collect();
    for run in pending {
        if run.join().is_err() {
            warn!("watch: assembly run panicked");
        }
    }

    let (generation, items) = state.snapshot();
    match generation {
        Some(generation) => println!(
            "Last committed generation {}: {} posts",
            generation.value(),
            items.len()
        ),
        None => println!("{}", view::NO_RESULTS),
    }
    Ok(())
}

/// First image candidate the source can serve, per item.
fn resolve_images(cfg: &Config, loader: &Loader, items: &[&FeedItem]) -> HashMap<usize, String> {
    let resolver = Resolver::new(cfg.media.assets_root.clone());
    items
        .iter()
        .filter_map(|item| {
            let filename = item.image.as_deref()?;
            let sources = resolver.sources(filename, MediaKind::Image);
            let found = media::select_source(sources, |source| {
                loader.source().fetch(&source.url).is_ok()
            });
            if found.is_none() {
                debug!(post = %item.name, image = filename, "no image candidate resolved");
            }
            found.map(|source| (item.id, source.url))
        })
        .collect()
}

fn build_loader(cfg: &Config) -> Result<Loader> {
    let source = source::from_base(
        &cfg.source.base,
        &cfg.source.user_agent,
        cfg.source.timeout,
    )
    .context("build content source")?;
    info!(source = %source.describe(), "content source ready");
    Ok(Loader::new(Arc::from(source), cfg.loader_config()))
}

fn assemble(cfg: &Config, loader: Loader, manifest: &Manifest, seed: Option<u64>) -> Vec<FeedItem> {
    let options = cfg.assemble_options();
    match seed {
        Some(seed) => Assembler::seeded(loader, seed, options).assemble(manifest),
        None => Assembler::from_entropy(loader, options).assemble(manifest),
    }
}
