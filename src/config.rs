use serde::{Deserialize, Serialize};

/// Process-wide kill switches, snapshotted per validation call rather than
/// read mid-validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteFlags {
    pub launching_disabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub site: SiteFlags,
}

impl AppConfig {
    /// Load configuration from defaults, an optional `config` file, and
    /// `EXPERIMENTER_`-prefixed environment variables.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("EXPERIMENTER")
                    .separator("_")
                    .prefix_separator("_"),
            )
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        Ok(app_config)
    }
}

/// Initialize logging with INFO level unless overridden by RUST_LOG.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .try_init();
}
