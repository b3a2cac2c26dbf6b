use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use shelf_wall::config::Configuration;
use shelf_wall::events::{LibraryUpdate, LoadEvent};
use shelf_wall::tasks::{feed::ShelfClient, library, viewer};
use shelf_wall::wall::{CoverWall, NodeVisual, Viewport};

#[derive(Debug, Parser)]
#[command(
    name = "shelf-wall",
    version,
    about = "endless scrolling wall of Goodreads book covers"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Goodreads user id; overrides shelf.user-id
    #[arg(long = "user-id", value_name = "ID")]
    user_id: Option<String>,
    /// Shelf slug; overrides shelf.shelf
    #[arg(long = "shelf", value_name = "SLUG")]
    shelf: Option<String>,
    /// Fetch the shelf and print the first wall's columns without opening a window
    #[arg(long = "dry-run")]
    dry_run: bool,
    /// Logical viewport used by --dry-run
    #[arg(long = "viewport", value_name = "WxH", default_value = "1920x1080")]
    viewport: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // init tracing (RUST_LOG controls level, default = info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let Args {
        config,
        user_id,
        shelf,
        dry_run,
        viewport,
    } = Args::parse();

    let mut cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?;
    if let Some(user_id) = user_id {
        cfg.shelf.user_id = Some(user_id);
    }
    if let Some(shelf) = shelf {
        cfg.shelf.shelf = shelf;
    }
    let cfg = cfg.validated().context("invalid configuration values")?;
    tracing::info!(
        "Loaded configuration from {}:\n{:#?}",
        config.display(),
        cfg
    );

    if dry_run {
        let viewport = parse_viewport(&viewport)?;
        return run_dry_run(&cfg, viewport).await;
    }

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let (updates_tx, updates_rx) = mpsc::channel::<LibraryUpdate>(64); // Library -> Viewer

    let mut tasks = JoinSet::new();

    // ShelfLibrary
    tasks.spawn({
        let cfg = cfg.clone();
        let cancel = cancel.clone();
        async move {
            library::run(cfg, updates_tx, cancel)
                .await
                .context("library task failed")
        }
    });

    // Run the windowed viewer on the main thread (blocking) after spawning other tasks
    if let Err(e) = viewer::run_windowed(updates_rx, cancel.clone(), cfg.clone())
        .context("viewer failed")
    {
        tracing::error!("{e:?}");
    }
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}

fn parse_viewport(raw: &str) -> Result<Viewport> {
    let (width, height) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("--viewport must look like 1920x1080, got {raw:?}"))?;
    let width: f32 = width.trim().parse().context("invalid viewport width")?;
    let height: f32 = height.trim().parse().context("invalid viewport height")?;
    let viewport = Viewport::new(width, height);
    if viewport.is_empty() {
        return Err(anyhow!("--viewport must be positive in both dimensions"));
    }
    Ok(viewport)
}

async fn run_dry_run(cfg: &Configuration, viewport: Viewport) -> Result<()> {
    let client = ShelfClient::new(&cfg.shelf, cfg.loader.request_timeout)?;
    let (progress_tx, mut progress_rx) = mpsc::channel::<LoadEvent>(64);
    let reporter = tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            tracing::debug!("{}", event.status_line());
        }
    });

    let cancel = CancellationToken::new();
    let loaded = library::load_shelf(
        &client,
        library::cover_settings(cfg),
        &progress_tx,
        &cancel,
    )
    .await;
    drop(progress_tx);
    let _ = reporter.await;
    let shelf = loaded.map_err(|err| anyhow!(err.user_message()))?;

    let mut wall = CoverWall::from_config(cfg);
    let build = wall.render_wall(&shelf.books, &shelf.assets, viewport);

    println!(
        "# wall dry run\n# books: {}\n# covers: {}\n# viewport: {}x{}\n# resume cursor: {}\n",
        shelf.books.len(),
        shelf.assets.iter().flatten().count(),
        viewport.width,
        viewport.height,
        build.resume_cursor,
    );
    if build.is_empty() {
        println!("(no books found)");
        return Ok(());
    }

    for (index, column) in build.columns.iter().enumerate() {
        println!(
            "column {:>2} ({:.0}px):",
            index + 1,
            column.accumulated_height()
        );
        for node in column.nodes() {
            match &node.visual {
                NodeVisual::Divider { year } => {
                    println!("  {:>6.0}  [{year}]", node.y);
                }
                NodeVisual::Cover(visual) => {
                    println!("  {:>6.0}  {}", node.y, visual.key.title);
                }
            }
        }
    }

    Ok(())
}
