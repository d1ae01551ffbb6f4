// alert_bridge/src/main.rs
//
// Webhook receiver that turns alerts into dYdX v4 orders.
// Run:
//   export DYDX_V4_MNEMONIC='mirror actor ... wait'
//   RUST_LOG=info cargo run -p alert_bridge

use alert_bridge::settings::CONFIG_PATH_ENV;
use alert_bridge::webhook::WebhookServer;
use alert_bridge::{AlertAdapter, Credentials, DydxExchange, Settings};
use anyhow::{Context, Result};
use std::path::PathBuf;

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref()).context("load settings")?;
    log::info!(
        "starting on {} ({}), indexer {}",
        settings.network.as_str(),
        settings.network.chain_id(),
        settings.indexer_http()
    );

    let credentials = Credentials::from_env();
    let exchange = DydxExchange::new(settings.clone(), credentials);
    let adapter = AlertAdapter::new(exchange, settings.trading.clone());

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("init runtime")?;

    WebhookServer::new(adapter, settings.webhook).run(&rt)
}
