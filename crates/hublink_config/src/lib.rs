use config::{Config, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use std::env;

pub mod models;
pub use models::*;

static DOTENV_LOADED: OnceCell<()> = OnceCell::new();

/// Loads `.env` once per process so repeated config loads stay cheap.
pub fn ensure_dotenv_loaded() {
    DOTENV_LOADED.get_or_init(|| {
        // Missing .env files are fine; env vars may come from the shell.
        let _ = dotenv::dotenv();
    });
}

/// Loads the application configuration.
///
/// Sources, later ones overriding earlier ones:
/// 1. `config/default` (any format the config crate understands)
/// 2. `config/{RUN_ENV}` when `RUN_ENV` is set (defaults to `debug`)
/// 3. Environment variables prefixed `HUBLINK`, nested with `__`
///    (e.g. `HUBLINK__HUB__CONNECTION_STRING`)
pub fn load_config() -> Result<AppConfig, ConfigError> {
    ensure_dotenv_loaded();

    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "debug".to_string());
    let prefix = env::var("PREFIX").unwrap_or_else(|_| "HUBLINK".to_string());

    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{}", run_env)).required(false))
        .add_source(Environment::with_prefix(&prefix).separator("__"));

    let config: AppConfig = builder.build()?.try_deserialize()?;
    tracing::debug!(hub = %config.hub.hub_name, "configuration loaded");
    Ok(config)
}
