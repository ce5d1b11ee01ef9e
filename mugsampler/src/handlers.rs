use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use mugsampler_core::report::generate_run_report;
use mugsampler_core::{
    CollectResult, CycleController, CycleLimits, EventCallback, JsonStateFiles, PhotoCollector, ProgressState,
    ProgressStore, RandomSampler, RunOutcome, SampleEvent, SampledPhotoSet, SamplingConfig,
    SiteLayout, SqliteState, StateBackend, TreeWalker,
};
use mugsampler_scanner::{BlobStore, DirectoryBlobStore, GcsBlobStore, HttpFetcher, PageFetcher};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

pub const SQLITE_FILE: &str = "mugsampler.db";
pub const GCS_TOKEN_ENV: &str = "GCS_ACCESS_TOKEN";

pub fn print_banner() {
    println!(
        "{}",
        r#"
  _ __ ___  _   _  __ _ ___  __ _ _ __ ___  _ __ | | ___ _ __
 | '_ ` _ \| | | |/ _` / __|/ _` | '_ ` _ \| '_ \| |/ _ \ '__|
 | | | | | | |_| | (_| \__ \ (_| | | | | | | |_) | |  __/ |
 |_| |_| |_|\__,_|\__, |___/\__,_|_| |_| |_| .__/|_|\___|_|
                  |___/                    |_|
"#
        .bright_blue()
        .bold()
    );
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> io::Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

fn count(args: &ArgMatches, id: &str) -> usize {
    args.get_one::<u64>(id).copied().unwrap_or_default() as usize
}

/// Zero means no limit.
fn optional_count(args: &ArgMatches, id: &str) -> Option<usize> {
    args.get_one::<u64>(id)
        .copied()
        .filter(|n| *n > 0)
        .map(|n| n as usize)
}

pub fn sampling_config_from_args(args: &ArgMatches) -> SamplingConfig {
    SamplingConfig::default()
        .with_max_states(count(args, "max-states"))
        .with_max_counties(count(args, "max-counties"))
        .with_max_az_filters(count(args, "max-az-filters"))
        .with_max_photos_per_page(count(args, "max-photos"))
        .with_min_photos_per_cycle(count(args, "min-photos"))
}

pub fn cycle_limits_from_args(args: &ArgMatches) -> CycleLimits {
    CycleLimits {
        max_cycles: optional_count(args, "max-cycles"),
        max_idle_cycles: optional_count(args, "max-idle-cycles"),
        max_duration: args
            .get_one::<u64>("max-minutes")
            .map(|minutes| Duration::from_secs(minutes.saturating_mul(60))),
    }
}

/// Photos to take from a single page; unbounded unless `--max-photos` is given.
pub fn collect_limit_from_args(args: &ArgMatches) -> usize {
    args.get_one::<u64>("max-photos")
        .map(|n| *n as usize)
        .unwrap_or(usize::MAX)
}

pub fn resolve_state_dir(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

fn state_dir_from_args(args: &ArgMatches) -> PathBuf {
    let raw = args
        .get_one::<String>("state-dir")
        .map(String::as_str)
        .unwrap_or(".");
    resolve_state_dir(raw)
}

fn backend_kind(args: &ArgMatches) -> &str {
    args.get_one::<String>("backend")
        .map(String::as_str)
        .unwrap_or("json")
}

/// Open the state backend in `state_dir`, creating the directory if needed.
pub fn open_backend(kind: &str, state_dir: &Path) -> Result<Arc<dyn StateBackend>> {
    fs::create_dir_all(state_dir).with_context(|| {
        format!("Failed to create state directory {}", state_dir.display())
    })?;

    match kind {
        "json" => Ok(Arc::new(JsonStateFiles::in_dir(state_dir))),
        "sqlite" => {
            let path = state_dir.join(SQLITE_FILE);
            let state = SqliteState::new(&path)
                .with_context(|| format!("Failed to open database {}", path.display()))?;
            Ok(Arc::new(state))
        }
        other => bail!("Unknown state backend '{}'", other),
    }
}

pub fn build_blob_store(args: &ArgMatches) -> Result<Arc<dyn BlobStore>> {
    if let Some(bucket) = args.get_one::<String>("gcs-bucket") {
        let token = std::env::var(GCS_TOKEN_ENV).ok().filter(|t| !t.is_empty());
        if token.is_none() {
            println!(
                "{} {} is not set, uploading without credentials",
                "⚠".yellow().bold(),
                GCS_TOKEN_ENV
            );
        }
        let store = GcsBlobStore::new(bucket.as_str(), token)
            .with_context(|| format!("Failed to configure bucket '{}'", bucket))?;
        return Ok(Arc::new(store));
    }

    let raw = args
        .get_one::<String>("bucket-dir")
        .map(String::as_str)
        .unwrap_or("photos");
    let dir = resolve_state_dir(raw);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create photo directory {}", dir.display()))?;
    Ok(Arc::new(DirectoryBlobStore::new(dir)))
}

fn image_layout_from_args(args: &ArgMatches, layout: SiteLayout) -> Result<SiteLayout> {
    match args.get_one::<String>("image-pattern") {
        Some(pattern) => layout
            .with_image_pattern(pattern)
            .with_context(|| format!("Invalid image pattern '{}'", pattern)),
        None => Ok(layout),
    }
}

fn sampler_from_args(args: &ArgMatches) -> RandomSampler {
    match args.get_one::<u64>("seed") {
        Some(seed) => RandomSampler::seeded(*seed),
        None => RandomSampler::new(),
    }
}

pub fn format_status(progress: &ProgressState, photos: usize) -> String {
    let mut status = String::new();
    status.push_str(&format!("  States sampled: {}\n", progress.sampled_states.len()));
    status.push_str(&format!(
        "  Counties sampled: {}\n",
        progress.sampled_counties.len()
    ));
    status.push_str(&format!("  A-Z filters sampled: {}\n", progress.sampled_az.len()));
    status.push_str(&format!("  Photos sampled: {}\n", photos));
    status
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn spinner_callback(spinner: ProgressBar) -> EventCallback {
    Arc::new(move |event: SampleEvent| match event {
        SampleEvent::CycleStarted { cycle } => {
            spinner.set_message(format!("cycle {}: fetching root listing", cycle));
        }
        SampleEvent::Visiting { level, url } => {
            spinner.set_message(format!("{} {}", level, url));
        }
        SampleEvent::PhotoUploaded { key, .. } => {
            spinner.inc(1);
            spinner.set_message(format!("uploaded {}", key));
        }
        SampleEvent::CycleFinished {
            cycle,
            collected,
            target,
        } => {
            let mark = if collected >= target {
                "✓".green().bold()
            } else {
                "→".yellow().bold()
            };
            spinner.println(format!(
                "{} Cycle {}: {} of {} photos",
                mark, cycle, collected, target
            ));
        }
    })
}

pub async fn handle_run(args: &ArgMatches) -> Result<RunOutcome> {
    let verbose = args.get_flag("verbose");
    init_tracing(verbose);

    let cfg = sampling_config_from_args(args);
    let limits = cycle_limits_from_args(args);
    let state_dir = state_dir_from_args(args);
    let backend = open_backend(backend_kind(args), &state_dir)?;
    let store = build_blob_store(args)?;

    let root_url = args
        .get_one::<Url>("root-url")
        .map(Url::as_str)
        .unwrap_or(mugsampler_core::config::DEFAULT_ROOT_URL);
    let layout = image_layout_from_args(args, SiteLayout::default().with_root_url(root_url))?;

    let timeout = args.get_one::<u64>("timeout").copied().unwrap_or(30);
    let delay = args.get_one::<u64>("delay-ms").copied().unwrap_or(0);
    let fetcher: Arc<dyn PageFetcher> =
        Arc::new(HttpFetcher::with_timeout(timeout).with_delay(Duration::from_millis(delay)));

    let mut sampler = sampler_from_args(args);

    let progress = ProgressStore::load(backend.clone()).context("Failed to load sampling progress")?;
    let photos = SampledPhotoSet::load(backend).context("Failed to load sampled photos")?;
    info!(
        state_dir = %state_dir.display(),
        counties = progress.state().sampled_counties.len(),
        photos = photos.len(),
        "Loaded sampling state"
    );

    println!("{} Sampling from {}", "→".blue(), root_url.bright_white());
    println!(
        "{} States {} · counties {} · A-Z filters {} · photos per page {}",
        "→".blue(),
        cfg.max_states,
        cfg.max_counties,
        cfg.max_az_filters,
        cfg.max_photos_per_page
    );
    println!(
        "{} Target: {} new photos in one cycle",
        "→".blue(),
        cfg.min_photos_per_cycle.to_string().cyan()
    );
    println!(
        "{} Already sampled: {} photos",
        "→".blue(),
        photos.len().to_string().cyan()
    );
    println!();

    let collector = PhotoCollector::new(
        fetcher.clone(),
        store,
        photos,
        sampler.fork(),
        layout.image_pattern().clone(),
    );
    let walker = TreeWalker::new(fetcher, progress, collector, sampler, layout)
        .with_state_dedup(args.get_flag("dedup-states"));
    let mut controller = CycleController::new(walker, limits);

    let spinner = if verbose {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} [{pos} uploaded] {msg}")
                .unwrap(),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        controller = controller.with_event_callback(spinner_callback(pb.clone()));
        Some(pb)
    };

    let result = controller.run_until_satisfied(&cfg).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let summary = result.context("Sampling aborted, progress could not be saved")?;

    println!();
    print!("{}", generate_run_report(&summary));

    match summary.outcome {
        RunOutcome::Satisfied => println!("{} Sampling complete!", "✓".green().bold()),
        RunOutcome::Exhausted(reason) => println!(
            "{} Stopped early: {}",
            "⚠".yellow().bold(),
            reason.as_str()
        ),
    }
    Ok(summary.outcome)
}

/// Collect from one already-known page into the photo ledger. Unlike a
/// sampling run, a page that cannot be loaded is an error.
pub async fn collect_single_page(
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn BlobStore>,
    backend: Arc<dyn StateBackend>,
    page_url: &str,
    limit: usize,
    layout: &SiteLayout,
    sampler: RandomSampler,
) -> Result<CollectResult> {
    let photos = SampledPhotoSet::load(backend).context("Failed to load sampled photos")?;
    let page = fetcher
        .navigate(page_url)
        .await
        .with_context(|| format!("Failed to load {}", page_url))?;

    let mut collector = PhotoCollector::new(
        fetcher,
        store,
        photos,
        sampler,
        layout.image_pattern().clone(),
    );
    collector
        .collect_page(&page, limit)
        .await
        .context("Collection aborted, sampled photos could not be saved")
}

pub async fn handle_collect(args: &ArgMatches) -> Result<CollectResult> {
    init_tracing(args.get_flag("verbose"));

    let page_url = args
        .get_one::<Url>("url")
        .context("A page URL is required")?;
    let state_dir = state_dir_from_args(args);
    let backend = open_backend(backend_kind(args), &state_dir)?;
    let store = build_blob_store(args)?;
    let layout = image_layout_from_args(args, SiteLayout::default())?;
    let timeout = args.get_one::<u64>("timeout").copied().unwrap_or(30);
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::with_timeout(timeout));

    println!(
        "{} Collecting photos from {}",
        "→".blue(),
        page_url.as_str().bright_white()
    );

    let result = collect_single_page(
        fetcher,
        store,
        backend,
        page_url.as_str(),
        collect_limit_from_args(args),
        &layout,
        sampler_from_args(args),
    )
    .await?;

    println!(
        "{} Uploaded {} new photos ({} already stored, {} failed)",
        "✓".green().bold(),
        result.newly_uploaded.to_string().cyan(),
        result.already_stored,
        result.failed
    );
    Ok(result)
}

pub fn handle_status(args: &ArgMatches) -> Result<()> {
    let state_dir = state_dir_from_args(args);
    let backend = open_backend(backend_kind(args), &state_dir)?;
    let progress = ProgressStore::load(backend.clone()).context("Failed to load sampling progress")?;
    let photos = SampledPhotoSet::load(backend).context("Failed to load sampled photos")?;

    print_divider();
    println!("{}", "  SAMPLING STATUS".bright_white().bold());
    print_divider();
    println!(
        "{} State: {}",
        "→".blue(),
        state_dir.display().to_string().bright_white()
    );
    println!();
    print!("{}", format_status(progress.state(), photos.len()));
    println!();
    Ok(())
}

pub fn handle_reset(args: &ArgMatches) -> Result<()> {
    let state_dir = state_dir_from_args(args);
    let force = args.get_flag("force");

    if !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!(
            "All sampling progress in {} will be forgotten.",
            state_dir.display().to_string().bright_white()
        );
        println!("Photos already uploaded stay in their bucket.");
        println!();

        let response = print_prompt("Do you want to continue? [y/N]:")?;
        println!();
        if response != "y" && response != "yes" {
            println!("{} Reset cancelled.", "✗".red().bold());
            return Ok(());
        }
    }

    let backend = open_backend(backend_kind(args), &state_dir)?;
    backend.reset().context("Failed to reset sampling state")?;
    println!("{} Sampling state cleared", "✓".green().bold());
    Ok(())
}
