use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fitness_eval::config::{config_path, load_config};

#[derive(Parser)]
#[command(
    name = "fitness-eval",
    about = "Scenario corpus and schedule tooling for fitness evaluation"
)]
struct Cli {
    /// Path to config TOML file (falls back to FITNESS_EVAL_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the filtered corpus in evaluation order
    Corpus,
    /// Validate the window of every generation of a run
    Plan {
        #[arg(long)]
        generations: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("fitness_eval=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let path = config_path(cli.config)?;
    let settings = load_config(&path)?
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    settings.log_summary();

    let corpus = settings.load_corpus()?;

    match cli.command {
        Command::Corpus => {
            for (index, scenario) in corpus.scenarios().iter().enumerate() {
                println!(
                    "{index:>5}  {}  (dynamism {}, urgency {}, scale {})",
                    scenario, scenario.dynamism, scenario.urgency, scenario.scale
                );
            }
            info!(scenarios = corpus.len(), "Corpus listed");
        }
        Command::Plan { generations } => {
            let windows =
                scenario_corpus::plan_schedule(generations, &settings.schedule, corpus.len())
                    .context("Corpus too small for the configured schedule")?;
            for (generation, window) in windows.iter().enumerate() {
                let scenarios = corpus.window(window)?;
                info!(
                    generation,
                    from = window.from,
                    to = window.to,
                    composite_size = window.composite_size,
                    first = %scenarios.first().map(|s| s.file_name()).unwrap_or_default(),
                    "Generation window"
                );
            }
            info!(generations, corpus = corpus.len(), "Schedule fits the corpus");
        }
    }

    Ok(())
}
