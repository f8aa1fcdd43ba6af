use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use augur_agents::SynthesisInput;
use augur_models::agent_output::RawAgentOutput;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "augur", about = "Validate agent outputs and synthesize market predictions")]
struct Cli {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Read input JSON from a file instead of stdin
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    /// Pretty-print the output JSON
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate one RawAgentOutput and print the ValidatedAgentOutput
    Validate,
    /// Vote per-agent timeframe signals into a SynthesizedPrediction
    Synthesize,
}

fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = augur::load_config(cli.config.as_deref())?;

    let input = if let Some(path) = &cli.input {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input: {}", path.display()))?
    } else {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        buf
    };

    let result = match cli.command {
        Command::Validate => {
            let raw: RawAgentOutput =
                serde_json::from_str(&input).context("Failed to parse RawAgentOutput JSON")?;
            tracing::info!(agent = %raw.agent, symbol = %raw.symbol, "Validating output");
            serde_json::to_value(augur::validate(&config, &raw))?
        }
        Command::Synthesize => {
            let synthesis_input: SynthesisInput =
                serde_json::from_str(&input).context("Failed to parse SynthesisInput JSON")?;
            tracing::info!(agents = synthesis_input.agents.len(), "Synthesizing prediction");
            serde_json::to_value(augur::synthesize(&config, &synthesis_input))?
        }
    };

    // Output as JSON to stdout
    let output = if cli.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{output}");

    Ok(())
}
