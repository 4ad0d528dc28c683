use clap::{Parser, Subcommand};
use uba_gateway::commands::{self, Command};
use uba_gateway::config::{load_config, Overrides};
use uba_gateway::output::OutputFormat;

#[derive(Parser)]
#[command(name = "uba-gateway", version, about = "Profile gateway for the UBA baseline engine")]
struct Cli {
    /// Postgres connection string (overrides config and DB_* variables)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Baseline engine base URL (overrides BASELINE_ENGINE_URL)
    #[arg(long, global = true)]
    engine_url: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Start the HTTP server (default)
    Serve {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Directory holding the dashboard build
        #[arg(long)]
        static_dir: Option<String>,
    },

    /// Test the database connection
    Ping,

    /// Create the local fallback tables
    InitDb,

    /// Query the baseline engine health endpoint
    EngineHealth,

    /// List the metric vocabulary
    Metrics,
}

impl Cli {
    fn into_parts(self) -> (Command, Overrides, OutputFormat) {
        let mut overrides = Overrides {
            db: self.db,
            engine_url: self.engine_url,
            ..Default::default()
        };
        let command = match self.command.unwrap_or(CliCommand::Serve {
            port: None,
            static_dir: None,
        }) {
            CliCommand::Serve { port, static_dir } => {
                overrides.port = port;
                overrides.static_dir = static_dir;
                Command::Serve
            }
            CliCommand::Ping => Command::Ping,
            CliCommand::InitDb => Command::InitDb,
            CliCommand::EngineHealth => Command::EngineHealth,
            CliCommand::Metrics => Command::Metrics,
        };
        (command, overrides, self.format)
    }
}

fn main() {
    let cli = Cli::parse();
    let (command, overrides, format) = cli.into_parts();

    let result = load_config(&overrides)
        .map_err(|e| e.to_string())
        .and_then(|config| commands::run(command, config, &format));

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
