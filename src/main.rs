use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use cold_risk::config::{Config, ObservabilityConfig};
use cold_risk::{AppState, RiskFactors, build_router, provision, retrain};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cold-risk", version, about = "Cold risk prediction service")]
struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(short, long, env = "COLD_RISK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Provision the model and serve the HTTP API (default)
    Serve,
    /// Train a fresh model and overwrite the saved one
    Train,
    /// Classify a single set of risk factors
    Predict(PredictArgs),
}

#[derive(Args)]
struct PredictArgs {
    #[arg(long, allow_hyphen_values = true)]
    age: i64,
    #[arg(long)]
    gender: String,
    #[arg(long)]
    genotype: String,
    #[arg(long)]
    blood_group: String,
    #[arg(long, allow_hyphen_values = true)]
    temperature: f64,
    #[arg(long, allow_hyphen_values = true)]
    humidity: f64,
    #[arg(long, allow_hyphen_values = true)]
    air_quality: i64,
}

fn init_tracing(cfg: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cfg.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&config.observability);

    let params = config.training.params();
    let model_path = config.model.path.as_path();
    let data_path = config.training.data_path.as_deref();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            tracing::info!("Starting cold-risk v{}", env!("CARGO_PKG_VERSION"));
            let model = provision(model_path, data_path, &params)
                .with_context(|| format!("failed to provision model at {}", model_path.display()))?;

            let app = build_router(AppState::new(Arc::new(model)));
            let addr = config.server.addr();
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;

            tracing::info!("🚀 HTTP server listening on http://{}", addr);
            tracing::info!("   Predict: POST http://{}/predict", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("Shutdown signal received");
                })
                .await?;
        }
        Command::Train => {
            let model = retrain(model_path, data_path, &params)?;
            println!("Trained model with features: {:?}", model.feature_names());
        }
        Command::Predict(args) => {
            let model = provision(model_path, data_path, &params)?;
            let factors = RiskFactors::new(
                args.age,
                &args.gender,
                &args.genotype,
                &args.blood_group,
                args.temperature,
                args.humidity,
                args.air_quality,
            );
            let result = model.predict(&factors);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
