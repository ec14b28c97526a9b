use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use notecheck::{
    init, load_model, sharpness, utils, verifier, Config, DistanceThresholds, VerificationReport,
};

#[derive(Parser, Debug)]
#[command(
    name = "notecheck",
    version,
    about = "Authenticity heuristics for currency note images"
)]
struct Cli {
    /// Print the report as JSON instead of text
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare a candidate against a trusted anchor with the embedding model
    Embedding(EmbeddingArgs),
    /// Compare a candidate's focus against a trusted reference crop
    Sharpness(SharpnessArgs),
    /// Serve both checks over HTTP
    #[cfg(feature = "api")]
    Serve(ServeArgs),
    /// Show build information
    Version,
}

#[derive(Args, Debug)]
struct EmbeddingArgs {
    /// Serialized embedding model
    #[arg(long)]
    model: Option<PathBuf>,

    /// Trusted genuine image
    #[arg(long)]
    anchor: Option<PathBuf>,

    /// Image under test
    #[arg(long)]
    candidate: Option<PathBuf>,

    /// Distance below which the candidate matches
    #[arg(long)]
    threshold: Option<f32>,

    /// Report distances in [0.75, 1.0) as uncertain
    #[arg(long, default_value_t = false, conflicts_with = "threshold")]
    three_band: bool,
}

#[derive(Args, Debug)]
struct SharpnessArgs {
    /// Trusted high quality crop
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Captured frame under test
    #[arg(long)]
    candidate: Option<PathBuf>,

    /// Minimum ratio to pass
    #[arg(long)]
    pass_ratio: Option<f64>,

    /// Ratios below this fail
    #[arg(long)]
    fail_ratio: Option<f64>,
}

#[cfg(feature = "api")]
#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,

    /// Start without an embedding model
    #[arg(long, default_value_t = false)]
    no_model: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init() {
        eprintln!("warning: {}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn load_config() -> anyhow::Result<Config> {
    Config::from_env().context("invalid configuration")
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Embedding(args) => {
            let mut config = load_config()?;
            let section = &mut config.embedding;
            if let Some(model) = args.model {
                section.model_path = model;
            }
            if let Some(anchor) = args.anchor {
                section.anchor_path = anchor;
            }
            if let Some(candidate) = args.candidate {
                section.candidate_path = candidate;
            }
            if let Some(threshold) = args.threshold {
                section.thresholds = DistanceThresholds::two_band(threshold);
            }
            if args.three_band {
                section.thresholds = DistanceThresholds::three_band();
            }
            config.validate()?;

            let model = load_model(&config.embedding.model_path)?;
            let report = verifier::verify_files(
                &*model,
                &config.embedding.anchor_path,
                &config.embedding.candidate_path,
                &config.embedding,
            )?;
            print_report(&report, cli.json)
        }
        Command::Sharpness(args) => {
            let mut config = load_config()?;
            let section = &mut config.sharpness;
            if let Some(reference) = args.reference {
                section.reference_path = reference;
            }
            if let Some(candidate) = args.candidate {
                section.candidate_path = candidate;
            }
            if let Some(ratio) = args.pass_ratio {
                section.thresholds.pass_ratio = ratio;
            }
            if let Some(ratio) = args.fail_ratio {
                section.thresholds.fail_ratio = ratio;
            }
            config.validate()?;

            let report = sharpness::compare_files(
                &config.sharpness.reference_path,
                &config.sharpness.candidate_path,
                &config.sharpness,
            )?;
            print_report(&report, cli.json)
        }
        #[cfg(feature = "api")]
        Command::Serve(args) => {
            let mut config = load_config()?;
            if let Some(bind) = args.bind {
                config.server.bind_addr = bind;
            }
            serve(config, !args.no_model)
        }
        Command::Version => {
            println!("{}", utils::build_summary());
            Ok(())
        }
    }
}

fn print_report<T>(report: &VerificationReport<T>, json: bool) -> anyhow::Result<()>
where
    T: Serialize,
    VerificationReport<T>: std::fmt::Display,
{
    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

#[cfg(feature = "api")]
fn serve(config: Config, with_model: bool) -> anyhow::Result<()> {
    use notecheck::{create_router, AppState};

    let embedder = if with_model {
        Some(load_model(&config.embedding.model_path)?)
    } else {
        log::warn!("Starting without an embedding model; /api/verify/embedding will return 503");
        None
    };

    let addr = config.server.bind_addr;
    let app = create_router(&config.server).with_state(AppState::with_config(config, embedder));

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        log::info!("Server listening on {}", addr);

        axum::serve(listener, app).await?;
        Ok::<(), anyhow::Error>(())
    })
}
