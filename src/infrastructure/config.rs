use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct ConsoleConfig {
    /// Base URL of the monitoring console, e.g. `http://host/pandora_console`
    #[serde(default)]
    pub base_url: String,
    pub console_id: u64,
    /// Milliseconds between refreshes, 0 disables them
    #[serde(default)]
    pub update_interval_ms: u64,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

impl ConsoleConfig {
    pub fn update_interval(&self) -> Option<Duration> {
        (self.update_interval_ms > 0).then(|| Duration::from_millis(self.update_interval_ms))
    }
}

pub fn load_console_config() -> anyhow::Result<ConsoleConfig> {
    let builder = config::Config::builder()
        .add_source(File::with_name("config/console").required(false))
        .add_source(Environment::with_prefix("VISUAL_CONSOLE").try_parsing(true));

    from_builder(builder)
}

fn from_builder(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<ConsoleConfig> {
    let settings = builder.build()?;

    Ok(settings.try_deserialize()?)
}
