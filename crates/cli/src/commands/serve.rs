//! `codevox serve`: start the HTTP gateway.

use codevox_config::AppConfig;

pub async fn run(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load()?;
    if let Some(port) = port {
        config.gateway.port = port;
    }

    println!(
        "Starting gateway on {}:{} (ask: /api/ask, rpc: /rpc)",
        config.gateway.host, config.gateway.port
    );

    codevox_gateway::start(config).await
}
