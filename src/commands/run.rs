//! Command dispatch logic for progress-tree

use super::{DemoArgs, run_demo};
use crate::{Host, Result};
use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "progress-tree", version, author, long_about = None)]
#[command(about = "Drive a tree of console progress bars and report stalls")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(flatten)]
    demo: DemoArgs,
}

/// Parse command-line arguments and run the simulated workload
///
/// # Arguments
///
/// * `args` - An iterator of command-line arguments (typically from `std::env::args()`)
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the workload fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    let cli = Cli::parse_from(args);
    run_demo(host, &cli.demo).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::TestHost;
    use clap::CommandFactory;

    const FAST: [&str; 5] = ["progress-tree", "--tick-interval", "1ms", "--color", "never"];

    fn args(extra: &[&str]) -> Vec<String> {
        FAST.iter().chain(extra).map(ToString::to_string).collect()
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["progress-tree"]);
        assert_eq!(cli.demo.ticks, 20);
        assert_eq!(cli.demo.children, 3);
        assert_eq!(cli.demo.child_ticks, 10);
        assert_eq!(cli.demo.tick_interval, None);
        assert_eq!(cli.demo.stall_after, None);
        assert!(!cli.demo.error_if_stalled);
    }

    #[test]
    fn test_durations_are_human_readable() {
        let cli = Cli::parse_from(["progress-tree", "--idle-timeout", "1s 500ms", "--tick-interval", "20ms"]);
        assert_eq!(cli.demo.idle_timeout, Some(core::time::Duration::from_millis(1500)));
        assert_eq!(cli.demo.tick_interval, Some(core::time::Duration::from_millis(20)));

        assert!(Cli::try_parse_from(["progress-tree", "--idle-timeout", "soon"]).is_err());
    }

    #[tokio::test]
    async fn test_run_completes_without_stalls() {
        let mut host = TestHost::new();
        run(&mut host, args(&["--ticks", "3", "--children", "2", "--child-ticks", "2", "--idle-timeout", "5s"]))
            .await
            .unwrap();

        let output = host.output_text();
        assert!(output.contains("Finished 3 ticks and 2 children"), "{output}");
        assert!(output.contains("0 stall(s) reported"), "{output}");
        assert!(host.error_text().is_empty());
        assert_eq!(host.exit_code, None);
    }

    #[tokio::test]
    async fn test_run_reports_provoked_stall() {
        let mut host = TestHost::new();
        run(
            &mut host,
            args(&[
                "--ticks",
                "2",
                "--children",
                "0",
                "--idle-timeout",
                "40ms",
                "--stall-after",
                "1",
                "--error-if-stalled",
            ]),
        )
        .await
        .unwrap();

        let errors = host.error_text();
        assert_eq!(errors.matches("Stalled at 50.0%").count(), 1, "{errors}");
        assert!(errors.contains("Working: step 1/2"), "{errors}");
        assert!(host.output_text().contains("1 stall(s) reported"));
        assert_eq!(host.exit_code, Some(1));
    }

    #[tokio::test]
    async fn test_run_rejects_zero_idle_timeout() {
        let mut host = TestHost::new();
        let result = run(&mut host, args(&["--ticks", "1", "--children", "0", "--idle-timeout", "0s"])).await;
        assert!(result.is_err());
        assert!(host.output_text().is_empty());
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_run_reads_explicit_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("demo.toml");
        std::fs::write(&path, "idle_timeout = \"5s\"\ntick_interval = \"1ms\"\ncollapse_when_finished = true\n").unwrap();

        let mut host = TestHost::new();
        let path = path.to_str().unwrap();
        run(
            &mut host,
            ["progress-tree", "--config", path, "--ticks", "2", "--children", "1", "--child-ticks", "1", "--color", "never"],
        )
        .await
        .unwrap();

        assert!(host.output_text().contains("Finished 2 ticks and 1 children"));
    }

    #[tokio::test]
    async fn test_run_fails_on_missing_config() {
        let mut host = TestHost::new();
        let result = run(&mut host, args(&["--config", "definitely/not/here.toml"])).await;
        assert!(result.is_err());
    }
}
