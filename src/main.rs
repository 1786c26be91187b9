use std::sync::{Arc, Mutex};

use popmqtt::broker::Broker;
use popmqtt::config::{Settings, load_config};
use popmqtt::transport::server::start_mqtt_server;
use popmqtt::utils::logging;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(&config.log.level);

    if let Err(e) = run_server(config).await {
        error!("Server failed: {}", e);
        std::process::exit(1);
    }
}

async fn run_server(config: Settings) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let broker = Arc::new(Mutex::new(Broker::with_settings(&config.broker)));

    info!("Starting on mqtt://{}", addr);
    tokio::select! {
        result = start_mqtt_server(&addr, broker, config.broker.clone()) => {
            result?;
            error!("MQTT server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }
    Ok(())
}
