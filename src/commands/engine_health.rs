use crate::config::EngineConfig;
use crate::engine::BaselineEngineClient;
use crate::output::{print_json, OutputFormat};

pub async fn run(engine: &EngineConfig, format: &OutputFormat) -> Result<(), String> {
    let client =
        BaselineEngineClient::new(&engine.url, engine.timeout).map_err(|e| e.to_string())?;
    let health = client
        .health()
        .await
        .map_err(|e| format!("Baseline engine at {} is unreachable: {e}", engine.url))?;
    print_json(&health, format);
    Ok(())
}
