use std::path::{Path, PathBuf};

use clap::Parser;

use capsync::error::AppResult;
use capsync::logger;
use capsync::sim::scenario::{self, SHOWCASE, Scenario};

/// Default scenario filename checked when no path is given.
const DEFAULT_SCENARIO_FILE: &str = "capsync.toml";

#[derive(Debug, Parser)]
#[command(
    name = "capsync",
    version,
    about = "Replay a caption sync scenario against a simulated page"
)]
struct DemoArgs {
    /// Scenario file (TOML). Falls back to capsync.toml, then to the
    /// built-in showcase.
    #[arg(short, long, env = "CAPSYNC_SCENARIO")]
    scenario: Option<PathBuf>,

    /// Print the final caption report as JSON.
    #[arg(long)]
    json: bool,

    /// Debug logging (CAPSYNC_LOG / RUST_LOG take precedence).
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> AppResult<()> {
    let args = DemoArgs::parse();
    logger::init_logging(args.verbose);

    let scenario = load_scenario(args.scenario.as_deref())?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(scenario::run(scenario))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        tracing::info!(
            steps = report.steps_applied,
            captions = ?report.captions,
            "scenario finished"
        );
    }
    Ok(())
}

fn load_scenario(path: Option<&Path>) -> AppResult<Scenario> {
    if let Some(path) = path {
        return Scenario::from_toml(&std::fs::read_to_string(path)?);
    }
    let fallback = Path::new(DEFAULT_SCENARIO_FILE);
    if fallback.exists() {
        return Scenario::from_toml(&std::fs::read_to_string(fallback)?);
    }
    Scenario::from_toml(SHOWCASE)
}
