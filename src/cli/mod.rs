use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;
pub mod output;

pub use commands::run;
pub use output::OutputMode;

#[derive(Parser)]
#[command(name = "propcal")]
#[command(version)]
#[command(about = "Prop confidence aggregation and agent weight calibration", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory (default.toml, <PROPCAL_ENV>.toml)
    #[arg(short, long, default_value = "config", env = "PROPCAL_CONFIG_DIR")]
    pub config: PathBuf,

    /// History root, overrides history.dir
    #[arg(long, env = "PROPCAL_HISTORY_DIR")]
    pub history: Option<PathBuf>,

    /// Weight store directory, overrides store.dir
    #[arg(long, env = "PROPCAL_STORE_DIR")]
    pub store: Option<PathBuf>,

    /// Emit JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score every recorded prop in a period with the current weights
    Analyze {
        /// Period id (a directory under the history root)
        #[arg(short, long)]
        period: String,
        /// Only show picks at or above this confidence
        #[arg(long)]
        min_confidence: Option<f64>,
    },
    /// Grade a period's picks against actual stats
    Grade {
        #[arg(short, long)]
        period: String,
        #[arg(long)]
        min_confidence: Option<f64>,
        /// Also print the confidence calibration curve
        #[arg(long)]
        curve: bool,
    },
    /// Recompute agent performance and propose weight changes
    Calibrate {
        /// Periods to evaluate (comma-separated, default: all)
        #[arg(short, long, value_delimiter = ',')]
        periods: Vec<String>,
        /// Write the proposed weights to the store
        #[arg(long)]
        apply: bool,
    },
    /// Random search over weight configurations on a historical window
    Optimize {
        #[arg(short, long, value_delimiter = ',')]
        periods: Vec<String>,
        /// Candidates including the baseline
        #[arg(short = 'n', long)]
        samples: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        min_confidence: Option<f64>,
        /// Rows to print
        #[arg(long, default_value = "10")]
        top: usize,
        /// Write the best configuration to the store
        #[arg(long)]
        promote: bool,
        /// Write the best configuration as a [default_weights] TOML file
        #[arg(long)]
        export_toml: Option<PathBuf>,
    },
    /// Inspect or reset stored weights
    #[command(subcommand)]
    Weights(WeightsCommands),
}

#[derive(Subcommand)]
pub enum WeightsCommands {
    /// Current weight per agent
    Show,
    /// Adjustment audit log
    History {
        /// Only this agent
        #[arg(short, long)]
        agent: Option<String>,
        /// Most recent N records
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Restore configured default weights
    Reset {
        /// Period tag for the audit records
        #[arg(long, default_value = "manual")]
        period: String,
    },
}

impl Commands {
    /// Read-only commands log quietly
    pub fn is_quiet(&self) -> bool {
        matches!(self, Commands::Weights(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn optimize_parses_period_list() {
        let cli = Cli::try_parse_from([
            "propcal", "optimize", "--periods", "W1,W2", "-n", "50", "--seed", "7", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Optimize { periods, samples, seed, .. } => {
                assert_eq!(periods, vec!["W1", "W2"]);
                assert_eq!(samples, Some(50));
                assert_eq!(seed, Some(7));
            }
            _ => panic!("expected optimize"),
        }
    }

    #[test]
    fn weights_subcommands_parse() {
        let cli = Cli::try_parse_from(["propcal", "weights", "history", "-a", "DVOA"]).unwrap();
        assert!(cli.command.is_quiet());
        assert!(matches!(
            cli.command,
            Commands::Weights(WeightsCommands::History { agent: Some(a), .. }) if a == "DVOA"
        ));
    }
}
