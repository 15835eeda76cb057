use anyhow::Result;
use clap::{Parser, Subcommand};
use lattica_io::{RandomSampler, Sampler, SubprocessConfig, SubprocessSampler};
use lattica_lib::orchestrator::{difflogic_params_from, DiffLogicCa};
use lattica_lib::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Skip the external sampler and use uniform random search only
    #[arg(long)]
    fallback_only: bool,

    #[command(subcommand)]
    command: CommandKind,
}

#[derive(Subcommand, Debug)]
enum CommandKind {
    /// Search rule-parameter space for edge-of-chaos dynamics
    Optimize,
    /// Step the lattice under the best (or default) parameters
    Run {
        /// Number of ticks to simulate
        #[arg(short, long, default_value_t = 1000)]
        ticks: u64,
        /// Print voxel delta batches as JSON lines
        #[arg(long)]
        emit: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "lattica=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = AppConfig::load(&args.config);

    match args.command {
        CommandKind::Optimize => {
            let sampler = build_sampler(&config, args.fallback_only);
            let ca = DiffLogicCa::new(config)?;
            let state = ca.optimize(sampler).await?;
            match (&state.best_params, state.best_fitness) {
                (Some(params), Some(fitness)) => {
                    println!("best fitness: {fitness:.4}");
                    println!("best params:  {}", serde_json::to_string_pretty(params)?);
                }
                _ => println!("no trial completed"),
            }
        }
        CommandKind::Run { ticks, emit } => {
            let sampler = build_sampler(&config, args.fallback_only);
            let mut ca = DiffLogicCa::new(config)?;

            // A short search picks the ruleset before the long run.
            let state = ca.optimize(sampler).await?;
            let params = state
                .best_params
                .as_ref()
                .map(difflogic_params_from)
                .unwrap_or_default();

            let mut events = ca.subscribe_voxel_events();
            let printer = emit.then(|| {
                tokio::spawn(async move {
                    while let Ok(batch) = events.recv().await {
                        if let Ok(line) = serde_json::to_string(&batch) {
                            println!("{line}");
                        }
                    }
                })
            });

            let metrics = ca.run(params, ticks, emit).await?;
            ca.shutdown();
            if let Some(handle) = printer {
                handle.abort();
            }
            println!(
                "tick {}: plv={:.3} entropy={:.3} lambda_hat={:.3} lyapunov={:.3}",
                metrics.tick, metrics.plv, metrics.entropy, metrics.lambda_hat, metrics.lyapunov
            );
        }
    }
    Ok(())
}

fn build_sampler(config: &AppConfig, fallback_only: bool) -> Box<dyn Sampler> {
    if fallback_only {
        return Box::new(RandomSampler::new(
            lattica_data::SearchSpace::difflogic_defaults(),
            config.optimize.seed.unwrap_or(0),
        ));
    }
    Box::new(SubprocessSampler::new(SubprocessConfig {
        command: config.sampler.command.clone(),
        script: config.sampler.script.clone(),
        timeout: config.sampler.timeout(),
    }))
}
