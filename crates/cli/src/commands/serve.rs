//! `clipflow serve`: start the HTTP API server.

use clipflow_config::AppConfig;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("📋 clipflow gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "   Dispatch:  timeout {}ms, {} concurrent, mismatch={}",
        config.orchestrator.dispatch_timeout_ms,
        config.orchestrator.max_concurrent_dispatches,
        config.orchestrator.on_category_mismatch
    );

    clipflow_gateway::start(config).await
}
