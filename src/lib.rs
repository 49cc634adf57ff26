// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod hierarchy;
pub mod logging;
pub mod snapshot;
pub mod types;
pub mod watch;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{BuildRootSource, ConfigBuildRoots, VfsService};
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::path_utils::format_path_list;
use crate::watch::spawn_event_consumer;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the watch service with the `notify` backend
/// - the event consumer task
/// - one build invocation from the configured builds
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config_path();
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let source = ConfigBuildRoots::new(cfg.build.clone(), Arc::clone(&fs));
    let service = VfsService::with_notify(cfg.watch_settings(), Arc::clone(&fs));

    if args.dry_run {
        print_dry_run(&cfg, &service, &source)?;
        return Ok(());
    }

    let consumer = spawn_event_consumer(service.pump());

    let report = service.start_build(&source)?;
    for warning in report.warnings() {
        eprintln!("{warning}");
    }

    if args.once {
        println!("{}", report.watched_line());
        service.shutdown();
        consumer.await?;
        return Ok(());
    }

    info!("watching; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    info!("shutdown requested");
    service.shutdown();
    consumer.await?;
    Ok(())
}

/// Print what would be watched, without registering anything.
fn print_dry_run(
    cfg: &ConfigFile,
    service: &VfsService,
    source: &dyn BuildRootSource,
) -> Result<()> {
    let roots = source.discover()?;
    let plan = service.plan(&roots)?;

    println!("vfswatch dry-run");
    println!("  watch.strategy = {:?}", service.strategy());
    match cfg.watch.max_hierarchies {
        Some(limit) => println!("  watch.max_hierarchies = {limit}"),
        None => println!("  watch.max_hierarchies = unbounded"),
    }
    println!(
        "  cache.global_locations = {}",
        format_path_list(service.cache_locations().locations())
    );
    println!();

    println!("builds ({}):", roots.len());
    for root in &roots {
        println!("  - {} ({:?})", root.build(), root.kind());
        println!("      root: {}", root.root_dir().display());
        if let Some(parent) = root.parent() {
            println!("      parent: {parent}");
        }
    }
    println!();

    println!("hierarchies ({}):", plan.candidates.len());
    for hierarchy in &plan.decision.kept {
        let builds: Vec<&str> = hierarchy.builds().iter().map(|b| b.as_str()).collect();
        println!("  - {} {:?}", hierarchy.root().display(), builds);
    }
    for hierarchy in &plan.decision.evicted {
        println!("  - {} (over budget, not watched)", hierarchy.root().display());
    }

    debug!("dry-run complete (no native watches registered)");
    Ok(())
}
