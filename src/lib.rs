// src/lib.rs

pub mod cli;
pub mod config;
pub mod context;
pub mod discovery;
pub mod dispatch;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod poll;
pub mod report;
pub mod rerun;
pub mod results;
pub mod slicer;
pub mod tags;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_or_default};
use crate::config::model::ConfigFile;
use crate::context::{RunContext, RunSettings};
use crate::discovery::discover_units;
use crate::dispatch::{AwaitedDispatcher, PassRunner, TestUnit};
use crate::exec::local::run_local_suite;
use crate::exec::{CommandTemplate, DirSignalStore, ProcessLauncher, ProcessTaskRuntime};
use crate::fs::{FileSystem, RealFileSystem};
use crate::poll::{CompletionPoller, TokioClock};
use crate::report::print_verdict;
use crate::rerun::{RerunController, RunVerdict};
use crate::results::{DirResultStore, ResultReconciler};
use crate::slicer::slice_units;
use crate::tags::filter_units;
use crate::types::ExecuteOn;

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading and CLI overrides
/// - the run context
/// - unit discovery
/// - the backend selected by `execute_on`
/// - reconciliation and the final report
pub async fn run(args: CliArgs) -> Result<i32> {
    let explicit_config = args.config.is_some();
    let config_path = args
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let cfg = load_or_default(&config_path, explicit_config)?;

    let execute_on = args.execute_on.unwrap_or(cfg.run.execute_on);
    let settings = resolve_settings(&cfg, &args);
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    if let Some(run_id) = args.show_results.clone() {
        let ctx = RunContext::for_existing_run(&cfg, run_id, execute_on, settings);
        let controller = controller(NoDispatch, &cfg, &ctx, Arc::clone(&fs));
        let verdict = controller.reconcile_only(ctx.settings.rerun).await;
        print_verdict(&verdict, &ctx.run_id, cfg.store.reporter_base_url());
        return Ok(verdict.exit_code);
    }

    let ctx = RunContext::from_config(&cfg, execute_on, settings);
    let spec_path = PathBuf::from(args.spec.as_deref().unwrap_or(&cfg.run.spec_path));
    let slice = args.slice_scenarios || cfg.run.slice_scenarios;

    if args.dry_run {
        print_dry_run(&cfg, &ctx, &spec_path, slice, fs.as_ref())?;
        return Ok(0);
    }

    info!(run_id = %ctx.run_id, execute_on = %ctx.execute_on, "starting run");
    let template = CommandTemplate::new(cfg.backend.command.clone());

    let verdict = match execute_on {
        ExecuteOn::Local => run_local(&cfg, &ctx, &template, &spec_path, fs).await?,
        ExecuteOn::Function => {
            let units = dispatch_units(&cfg, &spec_path, slice, fs.as_ref())?;
            let signals = DirSignalStore::new(&cfg.store.root);
            let launcher = ProcessLauncher::new(
                template,
                ctx.run_path.clone(),
                signals.clone(),
                Arc::clone(&fs),
            );
            let poller = CompletionPoller::new(launcher, signals, TokioClock);
            controller(poller, &cfg, &ctx, fs).run(units, &ctx).await?
        }
        ExecuteOn::Container => {
            let units = dispatch_units(&cfg, &spec_path, slice, fs.as_ref())?;
            let runtime = Arc::new(ProcessTaskRuntime::new(template));
            let wait_max = Duration::from_secs(cfg.backend.wait_max_secs);
            let dispatcher = AwaitedDispatcher::new(runtime, TokioClock, wait_max);
            controller(dispatcher, &cfg, &ctx, fs).run(units, &ctx).await?
        }
    };

    print_verdict(&verdict, &ctx.run_id, cfg.store.reporter_base_url());
    Ok(verdict.exit_code)
}

/// Config values with CLI overrides applied.
pub fn resolve_settings(cfg: &ConfigFile, args: &CliArgs) -> RunSettings {
    let mut settings = RunSettings::from_section(&cfg.run);
    if let Some(filter) = args.filter_by_tag.as_ref().filter(|f| !f.trim().is_empty()) {
        settings.tag_filter = Some(filter.clone());
    }
    if let Some(threads) = args.threads {
        settings.concurrency_limit = threads;
    }
    if let Some(secs) = args.job_timeout.filter(|secs| *secs > 0) {
        settings.per_job_timeout = Duration::from_secs(secs);
    }
    if args.rerun {
        settings.rerun = true;
    }
    settings
}

/// Discovered units, split per scenario when `slice` is set.
pub fn dispatch_units(
    cfg: &ConfigFile,
    spec_path: &Path,
    slice: bool,
    fs: &dyn FileSystem,
) -> Result<Vec<TestUnit>> {
    let units = discover_units(fs, spec_path, &cfg.run.spec_pattern)?;
    if !slice {
        return Ok(units);
    }
    Ok(slice_units(fs, units, spec_path, Path::new(&cfg.run.slice_dir))?)
}

fn controller<P: PassRunner>(
    runner: P,
    cfg: &ConfigFile,
    ctx: &RunContext,
    fs: Arc<dyn FileSystem>,
) -> RerunController<P, DirResultStore> {
    let store = DirResultStore::for_run(Arc::clone(&fs), &cfg.store.root, &ctx.run_path);
    let reconciler = ResultReconciler::new(store, cfg.store.result_prefix.clone());
    RerunController::new(runner, reconciler, fs)
}

/// The whole suite as one subprocess, then a single-pass reconciliation.
async fn run_local(
    cfg: &ConfigFile,
    ctx: &RunContext,
    template: &CommandTemplate,
    spec_path: &Path,
    fs: Arc<dyn FileSystem>,
) -> Result<RunVerdict> {
    let suite = TestUnit::new(spec_path.to_string_lossy());
    let exit_code = run_local_suite(&template.render(&suite), &ctx.env).await?;

    let mut verdict = controller(NoDispatch, cfg, ctx, fs).reconcile_only(false).await;
    if exit_code != 0 {
        verdict.exit_code = 1;
    }
    Ok(verdict)
}

/// Runner for modes that only reconcile existing results.
struct NoDispatch;

impl PassRunner for NoDispatch {
    fn run_pass<'a>(
        &'a self,
        _units: Vec<TestUnit>,
        _ctx: &'a RunContext,
    ) -> exec::BoxFuture<'a, errors::Result<dispatch::PassReport>> {
        Box::pin(async { Ok(dispatch::PassReport::default()) })
    }
}

/// Dry-run output: resolved settings and the units that would be dispatched.
fn print_dry_run(
    cfg: &ConfigFile,
    ctx: &RunContext,
    spec_path: &Path,
    slice: bool,
    fs: &dyn FileSystem,
) -> Result<()> {
    println!("testdispatch dry-run");
    println!("  execute_on = {}", ctx.execute_on);
    println!("  run_path = {}", ctx.run_path);
    println!("  tag_filter = {:?}", ctx.settings.tag_filter);
    println!("  concurrency_limit = {}", ctx.settings.concurrency_limit);
    println!("  per_job_timeout = {:?}", ctx.settings.per_job_timeout);
    println!("  overall_timeout = {:?}", ctx.settings.overall_timeout);
    println!("  rerun = {}", ctx.settings.rerun);
    println!("  slice_scenarios = {slice}");
    println!("  command = {}", cfg.backend.command);
    println!();

    let units = dispatch_units(cfg, spec_path, slice, fs)?;
    let eligible = filter_units(fs, units, ctx.settings.tag_filter.as_deref());
    println!("eligible units ({}):", eligible.len());
    for unit in &eligible {
        println!("  - {}", unit.path);
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
