pub mod engine_health;
pub mod init_db;
pub mod metrics;
pub mod ping;

use crate::config::Config;
use crate::output::OutputFormat;
use crate::serve;

pub enum Command {
    Serve,
    Ping,
    InitDb,
    EngineHealth,
    Metrics,
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Runtime::new().map_err(|e| format!("Failed to create runtime: {e}"))
}

pub fn run(command: Command, config: Config, format: &OutputFormat) -> Result<(), String> {
    match command {
        Command::Serve => runtime()?.block_on(serve::run(config)),
        Command::Ping => ping::run(&config.database),
        Command::InitDb => runtime()?.block_on(init_db::run(&config.database)),
        Command::EngineHealth => runtime()?.block_on(engine_health::run(&config.engine, format)),
        Command::Metrics => {
            metrics::run(format);
            Ok(())
        }
    }
}
