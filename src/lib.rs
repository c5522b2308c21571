pub mod config;
pub mod dispatcher;
pub mod logging;
pub mod model;
pub mod model_gateway;
pub mod providers;
pub mod records;
pub mod web;

use anyhow::{Context, Result};
use reqwest::Client;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use config::Config;
use dispatcher::Dispatcher;
use model_gateway::HostCompletionGateway;
use records::Directory;
use web::AppState;

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init();

    let cfg = Config::from_env();
    info!(
        provider = %cfg.model_provider,
        model = %cfg.model,
        mode = cfg.dispatch_mode.as_str(),
        api_key_set = cfg.api_key.is_some(),
        "loaded runtime configuration"
    );

    let client = Client::builder()
        .timeout(Duration::from_secs(cfg.model_timeout_secs))
        .build()
        .context("Failed to initialize HTTP client")?;

    let directory = match &cfg.records_path {
        Some(path) => Directory::load(path)?,
        None => Directory::seeded().context("Built-in records are inconsistent")?,
    };
    let gateway = Arc::new(HostCompletionGateway::new(client, cfg.clone()));
    let dispatcher = Arc::new(Dispatcher::new(&cfg, directory, gateway));

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        let state = AppState::new(dispatcher, &cfg.ui_title)?;
        web::serve(&cfg.bind_addr, state).await
    } else {
        let reply = dispatcher
            .dispatch(&args.join(" "), &cfg.default_username)
            .await?;
        println!("{}", reply.text.trim());
        Ok(())
    }
}
