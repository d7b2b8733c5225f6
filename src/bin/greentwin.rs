//! Loop runner: execute N ticks of the greenhouse twin.
//!
//! ```text
//! greentwin --reset                         # write the template state and exit
//! greentwin --steps 5                       # run five ticks against local rules
//! greentwin --steps 20 --sleep 1 --overlay live_overlay.json
//! greentwin --steps 3 --remote --image demo/frame.png
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use greentwin::{
    store, FileOverrideLayer, ImageRef, MemoryOverrideLayer, OverrideLayer, RemoteAgent,
    TwinConfig, TwinEngine, TwinResult,
};

#[derive(Debug, Parser)]
#[command(name = "greentwin", about = "Run the greenhouse digital-twin loop")]
struct Args {
    /// Number of ticks to run.
    #[arg(long, default_value_t = 5)]
    steps: u32,

    /// Seconds to sleep between ticks.
    #[arg(long, default_value_t = 0.0)]
    sleep: f64,

    /// Path to the persisted state file.
    #[arg(long, default_value = "twin_state.json")]
    state: PathBuf,

    /// Path to the append-only history log.
    #[arg(long, default_value = "history.jsonl")]
    history: PathBuf,

    /// Path to the override-layer file; omitted means no overlay file
    /// is written (the projection still runs in memory).
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Optional TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// RNG seed for the drift simulation.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Restore the template state and exit.
    #[arg(long)]
    reset: bool,

    /// Template state file used by --reset (built-in template if omitted).
    #[arg(long)]
    template: Option<PathBuf>,

    /// Consult the remote reasoning endpoint each tick.
    #[arg(long)]
    remote: bool,

    /// Camera frame shipped with remote reasoning requests.
    #[arg(long)]
    image: Option<PathBuf>,
}

fn run(args: &Args) -> TwinResult<()> {
    let mut config = match &args.config {
        Some(path) => TwinConfig::load(path)?,
        None => TwinConfig::default(),
    };
    config.remote.apply_env_overrides();

    if args.reset {
        store::reset(&args.state, args.template.as_deref())?;
        tracing::info!(state = %args.state.display(), "state reset to template");
        return Ok(());
    }

    let overlay: Box<dyn OverrideLayer> = match &args.overlay {
        Some(path) => Box::new(FileOverrideLayer::new(path)),
        None => Box::new(MemoryOverrideLayer::default()),
    };

    let mut engine = TwinEngine::open(config, &args.state, &args.history, overlay, args.seed)?;

    if args.remote {
        match RemoteAgent::new(engine.config().remote.clone()) {
            Ok(agent) => {
                engine.set_remote_agent(agent);
                match &args.image {
                    Some(path) => engine.set_camera_frame(ImageRef::new(path)),
                    None => tracing::warn!(
                        "no --image given; remote calls will fall back to local rules"
                    ),
                }
            }
            Err(err) => {
                tracing::warn!(reason = %err, "remote agent unavailable, running local rules only");
            }
        }
    }

    for step in 1..=args.steps {
        let report = engine.tick()?;
        tracing::info!(
            step,
            steps = args.steps,
            alerts = report.alerts.len(),
            fallback_used = report.fallback_used,
            explanation = %report.explanation,
            "step complete"
        );
        if step < args.steps && args.sleep > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(args.sleep));
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    // A missing state file is the most common first-run mistake; give a
    // pointed hint instead of a bare I/O error.
    if !args.reset && !args.state.exists() {
        tracing::error!(
            state = %args.state.display(),
            "state file not found; run with --reset to create it"
        );
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "run failed");
            ExitCode::FAILURE
        }
    }
}
