use anyhow::Context;
use clap::Parser;
use log::error;
use sitesnap::input::{self, ExpandOptions};
use sitesnap::{CaptureConfig, CaptureScheduler, Error, Target, Viewport};
use std::path::PathBuf;

const EXIT_OK: i32 = 0;
const EXIT_FATAL: i32 = 1;
const EXIT_PARTIAL: i32 = 2;

/// Screenshot many web endpoints, ignoring certificate errors.
#[derive(Parser, Debug)]
#[command(name = "sitesnap", version)]
struct Cli {
    /// Targets to capture (URLs or hosts)
    targets: Vec<String>,

    /// File with one host or URL per line
    #[arg(short = 'f', long)]
    file: Option<PathBuf>,

    /// Try both http:// and https:// for every host
    #[arg(long)]
    schemes: bool,

    /// File with extra ports to try for every host, one per line
    #[arg(long)]
    ports_file: Option<PathBuf>,

    /// Maximum number of concurrent captures
    #[arg(short = 't', long, default_value_t = 10, allow_negative_numbers = true)]
    threads: i64,

    /// Fetch timeout in seconds
    #[arg(long, default_value_t = 15)]
    timeout: u64,

    /// Render timeout in seconds (0 waits forever)
    #[arg(long, default_value_t = 60)]
    render_timeout: u64,

    #[arg(long, default_value_t = 1024)]
    width: u32,

    #[arg(long, default_value_t = 768)]
    height: u32,

    /// Directory for captured images
    #[arg(short = 'o', long, default_value = ".")]
    output: PathBuf,

    /// Directory for temporary fetched documents (defaults to the output directory)
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Write a JSON report of all outcomes to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn concurrency_from_arg(threads: i64) -> sitesnap::Result<usize> {
    usize::try_from(threads)
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| Error::ConfigError(format!("--threads must be positive, got {}", threads)))
}

fn collect_targets(cli: &Cli) -> anyhow::Result<Vec<Target>> {
    let ports = match &cli.ports_file {
        Some(path) => input::read_port_list(path).context("reading port list")?,
        None => Vec::new(),
    };
    let opts = ExpandOptions {
        prepend_schemes: cli.schemes,
        ports,
    };

    let mut targets = input::parse_target_list(&cli.targets.join("\n"), &opts);
    if let Some(path) = &cli.file {
        let listed = input::read_target_file(path, &opts)
            .with_context(|| format!("reading target file {}", path.display()))?;
        targets.extend(listed);
    }
    Ok(input::dedup(targets))
}

fn build_config(cli: &Cli) -> sitesnap::Result<CaptureConfig> {
    let config = CaptureConfig {
        max_concurrency: concurrency_from_arg(cli.threads)?,
        timeout_ms: cli.timeout.saturating_mul(1000),
        render_timeout_ms: cli.render_timeout.saturating_mul(1000),
        viewport: Viewport {
            width: cli.width,
            height: cli.height,
        },
        output_dir: cli.output.clone(),
        work_dir: cli.work_dir.clone(),
        ..Default::default()
    };
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> i32 {
    let config = match build_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            eprintln!("sitesnap: {}", e);
            return EXIT_FATAL;
        }
    };

    let targets = match collect_targets(&cli) {
        Ok(t) => t,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("sitesnap: {:#}", e);
            return EXIT_FATAL;
        }
    };

    let backend = sitesnap::default_backend_factory(&config);
    let mut scheduler = CaptureScheduler::new(config, backend);
    scheduler.on_result(|result| println!("{}", result));

    let report = match scheduler.run(targets).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("sitesnap: {}", e);
            return EXIT_FATAL;
        }
    };

    if let Some(path) = &cli.report {
        let written = report
            .to_json()
            .map_err(anyhow::Error::from)
            .and_then(|json| std::fs::write(path, json).map_err(anyhow::Error::from));
        if let Err(e) = written {
            error!("Failed to write report {}: {}", path.display(), e);
        }
    }

    println!(
        "{} captured, {} skipped, {} failed",
        report.succeeded(),
        report.skipped(),
        report.failed()
    );

    if report.has_failures() {
        EXIT_PARTIAL
    } else {
        EXIT_OK
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_target(false)
        .init();

    let code = run(cli).await;
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threads_must_be_positive() {
        assert_eq!(concurrency_from_arg(3).unwrap(), 3);
        assert!(concurrency_from_arg(0).unwrap_err().is_fatal());
        assert!(concurrency_from_arg(-4).unwrap_err().is_fatal());
    }

    #[test]
    fn negative_threads_parse_and_fail_config() {
        let cli = Cli::try_parse_from(["sitesnap", "-t", "-1", "http://a"]).unwrap();
        assert_eq!(cli.threads, -1);
        assert!(matches!(build_config(&cli), Err(Error::ConfigError(_))));
    }

    #[test]
    fn positional_and_file_targets_are_merged() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hosts.txt");
        std::fs::write(&file, "http://b\nhttp://a\n").unwrap();
        let cli = Cli::try_parse_from([
            "sitesnap",
            "http://a",
            "-f",
            file.to_str().unwrap(),
        ])
        .unwrap();
        let targets = collect_targets(&cli).unwrap();
        let urls: Vec<_> = targets.iter().map(|t| t.as_str()).collect();
        assert_eq!(urls, vec!["http://a", "http://b"]);
    }

    #[test]
    fn missing_target_file_is_an_error() {
        let cli = Cli::try_parse_from(["sitesnap", "-f", "/nonexistent/hosts.txt"]).unwrap();
        assert!(collect_targets(&cli).is_err());
    }

    #[test]
    fn oversized_viewport_is_rejected() {
        let cli = Cli::try_parse_from(["sitesnap", "--width", "60000", "--height", "60000", "http://a"]).unwrap();
        assert!(matches!(build_config(&cli), Err(Error::ConfigError(_))));
    }

    #[test]
    fn defaults_match_library() {
        let cli = Cli::try_parse_from(["sitesnap", "http://a"]).unwrap();
        let config = build_config(&cli).unwrap();
        assert_eq!(config.viewport, Viewport::default());
        assert_eq!(config.timeout_ms, 15000);
        assert_eq!(config.max_concurrency, 10);
    }
}
