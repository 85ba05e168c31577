//! Simulated workload that drives a progress tree.

use super::Host;
use super::common::{ColorMode, LogLevel, init_logging};
use super::config::Config;
use crate::Result;
use crate::progress::{ConsoleRenderer, ProgressBar, Renderer};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use core::time::Duration;
use futures_util::future::join_all;
use ohno::IntoAppError;
use owo_colors::OwoColorize;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;

const LOG_TARGET: &str = "      demo";

/// Stalls are provoked by pausing for this many idle periods.
const STALL_PAUSE_FACTOR: u32 = 2;

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Number of ticks the root bar expects
    #[arg(long, value_name = "COUNT", default_value_t = 20)]
    pub ticks: u32,

    /// Number of child bars to run concurrently before the root starts ticking
    #[arg(long, value_name = "COUNT", default_value_t = 3)]
    pub children: u32,

    /// Number of ticks each child bar expects
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    pub child_ticks: u32,

    /// Delay between two units of work, e.g. `50ms` (overrides the configuration file)
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub tick_interval: Option<Duration>,

    /// How long a bar may go without a tick before it is reported as stalled (overrides the configuration file)
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub idle_timeout: Option<Duration>,

    /// Pause the root bar after this many ticks, long enough to be reported as stalled
    #[arg(long, value_name = "COUNT")]
    pub stall_after: Option<u32>,

    /// Hide bars once they finish
    #[arg(long)]
    pub collapse: bool,

    /// Path to configuration file (default is `progress.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    pub log_level: LogLevel,

    /// Exit with status code 1 if any bar stalled
    #[arg(long)]
    pub error_if_stalled: bool,
}

fn parse_duration(text: &str) -> core::result::Result<Duration, String> {
    humantime::parse_duration(text).map_err(|e| format!("invalid duration '{text}': {e}"))
}

/// A stall reported by the progress tree.
#[derive(Debug, Clone, PartialEq)]
struct Stall {
    percentage: f64,
    message: String,
}

/// Run the simulated workload described by `args`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the workload cannot be completed
pub async fn run_demo<H: Host>(host: &mut H, args: &DemoArgs) -> Result<()> {
    init_logging(args.log_level);

    let mut config = Config::load(Utf8Path::new("."), args.config.as_deref())?;
    if let Some(idle_timeout) = args.idle_timeout {
        config.idle_timeout = idle_timeout;
    }
    if let Some(tick_interval) = args.tick_interval {
        config.tick_interval = tick_interval;
    }
    if args.collapse {
        config.collapse_when_finished = true;
    }
    config.validate()?;

    let use_colors = args.color.use_colors();
    let renderer = Arc::new(ConsoleRenderer::new(use_colors));
    let (stall_tx, mut stall_rx) = mpsc::unbounded_channel();

    let root = ProgressBar::builder(i64::from(args.ticks), "Working")
        .options(config.to_options())
        .renderer(Arc::clone(&renderer) as Arc<dyn Renderer>)
        .on_stalled(move |percentage: f64, message: &str| {
            let _ = stall_tx.send(Stall {
                percentage,
                message: message.to_string(),
            });
        })
        .build();

    log::info!(
        target: LOG_TARGET,
        "Running {} root ticks and {} children of {} ticks every {}ms",
        args.ticks,
        args.children,
        args.child_ticks,
        config.tick_interval.as_millis()
    );

    let mut workload = tokio::spawn(drive_tree(root.clone(), Plan::new(args, &config)));
    let mut stalls = 0_usize;

    loop {
        tokio::select! {
            Some(stall) = stall_rx.recv() => {
                stalls += 1;
                renderer.suspend(|| report_stall(&mut *host, &stall, use_colors));
            }
            joined = &mut workload => {
                joined.into_app_err("running the simulated workload")?;
                break;
            }
        }
    }

    root.dispose();
    while let Ok(stall) = stall_rx.try_recv() {
        stalls += 1;
        report_stall(host, &stall, use_colors);
    }

    let _ = writeln!(
        host.output(),
        "Finished {} ticks and {} children in {}ms, {stalls} stall(s) reported",
        root.current_tick(),
        root.children().len(),
        root.elapsed().num_milliseconds()
    );

    if args.error_if_stalled && stalls > 0 {
        host.exit(1);
    }

    Ok(())
}

fn report_stall<H: Host>(host: &mut H, stall: &Stall, use_colors: bool) {
    let percentage = format!("{:.1}%", stall.percentage);
    if use_colors {
        let _ = writeln!(host.error(), "{} at {}: {}", "Stalled".red().bold(), percentage.yellow(), stall.message);
    } else {
        let _ = writeln!(host.error(), "Stalled at {percentage}: {}", stall.message);
    }
}

#[derive(Debug, Clone, Copy)]
struct Plan {
    ticks: u32,
    children: u32,
    child_ticks: u32,
    tick_interval: Duration,
    stall_after: Option<u32>,
    stall_pause: Duration,
}

impl Plan {
    fn new(args: &DemoArgs, config: &Config) -> Self {
        Self {
            ticks: args.ticks,
            children: args.children,
            child_ticks: args.child_ticks,
            tick_interval: config.tick_interval,
            stall_after: args.stall_after,
            stall_pause: config.idle_timeout.saturating_mul(STALL_PAUSE_FACTOR),
        }
    }
}

async fn drive_tree(root: ProgressBar, plan: Plan) {
    let children: Vec<ProgressBar> = (1..=plan.children)
        .map(|index| root.spawn(i64::from(plan.child_ticks), format!("Child {index}"), None))
        .collect();

    let _ = join_all(
        children
            .into_iter()
            .map(|child| drive_bar(child, plan.child_ticks, plan.tick_interval, None, Duration::ZERO)),
    )
    .await;

    drive_bar(root, plan.ticks, plan.tick_interval, plan.stall_after, plan.stall_pause).await;
}

async fn drive_bar(bar: ProgressBar, ticks: u32, interval: Duration, stall_after: Option<u32>, pause: Duration) {
    let name = bar.message();
    for step in 1..=ticks {
        if stall_after == Some(step - 1) {
            log::debug!(target: LOG_TARGET, "Pausing '{name}' for {}ms", pause.as_millis());
            tokio::time::sleep(pause).await;
        }

        tokio::time::sleep(interval).await;
        bar.tick(Some(&format!("{name}: step {step}/{ticks}")));
    }
}
