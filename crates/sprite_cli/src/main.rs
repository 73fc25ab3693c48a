//! spritegen - command-line entry point
//!
//! Handles:
//! - Configuration loading
//! - Application-level logging initialization
//! - Engine loading with an interactive retry prompt
//! - Sprite sheet generation and saving

use std::path::PathBuf;

use anyhow::{anyhow, Context as _};
use clap::{ArgAction, Parser, Subcommand};

use sprite_core::config::{default_config_path, ConfigManager, ConfigSection, Settings};
use sprite_core::loader::{EngineLoader, FfmpegInitializer, HttpFetcher, LoadReport, ResourceKind};
use sprite_core::logging::{init_tracing, init_tracing_with_file};
use sprite_core::{FfmpegEngine, SpriteJobParams, SpritePipeline, SpriteResult, SpriteService, StateReflector};

mod render;

use render::TerminalRenderer;

type Loader = EngineLoader<HttpFetcher, FfmpegInitializer>;

#[derive(Parser, Debug)]
#[command(name = "spritegen", version, about = "Generate WebP sprite sheets from videos")]
struct Cli {
    /// Config file (defaults to the per-user settings.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a sprite sheet from a video.
    Generate(GenerateArgs),
    /// Download and verify the engine, then print the per-source report.
    FetchEngine,
    /// List configured distribution sources and whether each is usable here.
    Sources,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Input video file.
    video: PathBuf,

    /// Grid columns (1-100).
    #[arg(long)]
    columns: Option<u32>,

    /// Grid rows (1-100).
    #[arg(long)]
    rows: Option<u32>,

    /// Output path (defaults to <output_folder>/<video>_sprite.webp).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Store --columns/--rows as the new defaults.
    #[arg(long, default_value_t = false)]
    save_defaults: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logs directory path)
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config_manager = ConfigManager::new(&config_path);
    config_manager
        .load_or_create()
        .with_context(|| format!("load config '{}'", config_path.display()))?;
    config_manager
        .ensure_dirs_exist()
        .context("create configured directories")?;

    let level = config_manager
        .settings()
        .logging
        .level
        .more_verbose(cli.verbose);
    let _log_guard = if config_manager.settings().logging.file_logging {
        let logs_dir = config_manager.logs_folder();
        Some(
            init_tracing_with_file(level, &logs_dir)
                .with_context(|| format!("open log directory '{}'", logs_dir.display()))?,
        )
    } else {
        init_tracing(level);
        None
    };

    tracing::info!("spritegen starting");
    tracing::info!("Config: {}", config_path.display());
    tracing::info!("Core version: {}", sprite_core::version());

    match cli.cmd {
        Command::Generate(args) => cmd_generate(&mut config_manager, args).await,
        Command::FetchEngine => cmd_fetch_engine(config_manager.settings()).await,
        Command::Sources => cmd_sources(config_manager.settings()),
    }
}

fn build_loader(settings: &Settings) -> anyhow::Result<Loader> {
    let fetcher = HttpFetcher::new().context("create HTTP client")?;
    Ok(EngineLoader::new(
        settings.loader_config(),
        fetcher,
        FfmpegInitializer,
    ))
}

fn build_service(settings: &Settings, renderer: &TerminalRenderer) -> SpriteService<FfmpegEngine> {
    let mut reflector = StateReflector::new();
    renderer.attach(&mut reflector);
    SpriteService::new(
        SpritePipeline::new(settings.sprite_options()),
        reflector,
        settings.logging.progress_step,
    )
}

/// Load the engine, offering a retry after each failure.
///
/// Returns the report of the successful attempt.
async fn load_engine(
    service: &SpriteService<FfmpegEngine>,
    loader: &Loader,
    renderer: &TerminalRenderer,
) -> anyhow::Result<LoadReport> {
    let mut outcome = service.load(loader).await;
    loop {
        let err = match outcome.result {
            Ok(()) => return Ok(outcome.report),
            Err(e) => e,
        };

        renderer.println(format!("Engine load failed:\n{}", outcome.report));
        if !renderer.prompt_retry().context("read retry answer")? {
            return Err(anyhow!(err.user_message()));
        }
        outcome = service.retry_load(loader).await;
    }
}

async fn cmd_generate(config_manager: &mut ConfigManager, args: GenerateArgs) -> anyhow::Result<()> {
    let settings = config_manager.settings().clone();
    let columns = args.columns.unwrap_or(settings.sprite.columns);
    let rows = args.rows.unwrap_or(settings.sprite.rows);
    let params = SpriteJobParams::new(columns, rows).map_err(|e| anyhow!(e.user_message()))?;

    if args.save_defaults {
        config_manager.settings_mut().sprite.columns = columns;
        config_manager.settings_mut().sprite.rows = rows;
        config_manager
            .update_section(ConfigSection::Sprite)
            .context("save sprite defaults")?;
        tracing::info!("Saved {}x{} as the default grid", columns, rows);
    }

    let renderer = TerminalRenderer::new();
    let service = build_service(&settings, &renderer);

    // Reject non-video input before touching the network
    let asset = service
        .select(&args.video)
        .map_err(|e| anyhow!(e.user_message()))?;
    let output = args.output.unwrap_or_else(|| {
        PathBuf::from(&settings.paths.output_folder).join(SpriteResult::file_name_for(&asset.name))
    });

    let loader = build_loader(&settings)?;
    load_engine(&service, &loader, &renderer).await?;

    let sprite = service
        .generate(asset, params)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;
    renderer.finish();

    sprite
        .save(&output)
        .with_context(|| format!("write sprite sheet '{}'", output.display()))?;

    eprintln!(
        "wrote {} ({}x{}, {} bytes, every {} frame(s))",
        output.display(),
        sprite.params.columns(),
        sprite.params.rows(),
        sprite.bytes.len(),
        sprite.frame_step
    );
    Ok(())
}

async fn cmd_fetch_engine(settings: &Settings) -> anyhow::Result<()> {
    let renderer = TerminalRenderer::new();
    let service = build_service(settings, &renderer);
    let loader = build_loader(settings)?;

    let report = load_engine(&service, &loader, &renderer).await?;
    renderer.finish();

    eprint!("{}", report);
    if let Some(description) = service.engine_description() {
        eprintln!("{}", description);
    }
    eprintln!("engine stored in {}", settings.paths.engine_folder);
    Ok(())
}

fn cmd_sources(settings: &Settings) -> anyhow::Result<()> {
    let loader = build_loader(settings)?;
    let caps = loader.capabilities();

    println!(
        "platform: {}  worker threads: {}",
        caps.platform.unwrap_or("unsupported"),
        if caps.worker_threads { "yes" } else { "no" }
    );
    for (index, source) in settings.engine.sources.iter().enumerate() {
        let status = match loader.skip_reason(source) {
            Some(reason) => format!("skipped: {}", reason),
            None => "eligible".to_string(),
        };
        println!("{}. {} [{}] ({})", index + 1, source.name, source.threading, status);
        if let Some(platform) = caps.platform {
            for kind in ResourceKind::ALL {
                println!("     {:<10} {}", kind.name(), source.resource_url(kind, platform));
            }
        }
    }
    Ok(())
}
