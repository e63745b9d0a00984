use serde::Deserialize;
use std::time::Duration;

/// How the binary surfaces latency snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Log,
    Json,
}

impl ReportFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "log" => Some(Self::Log),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Endpoints for the two legs
    pub client_url: String,
    pub server_url: String,

    // Schedule
    pub ping_interval_ms: u64,
    pub report_interval_ms: u64,

    pub report_format: ReportFormat,
    pub drain_timeout_secs: u64,
    pub debug: bool,
}

impl Config {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_url: "ws://127.0.0.1:9001".to_string(),
            server_url: "ws://127.0.0.1:9002".to_string(),
            ping_interval_ms: 8_000,
            report_interval_ms: 10_000,
            report_format: ReportFormat::Log,
            drain_timeout_secs: 5,
            debug: false,
        }
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Build a [`Config`] from an arbitrary variable lookup.
///
/// Missing or unparseable values fall back to the defaults.
pub fn load_config_from<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let client_url = lookup("LATENCY_CLIENT_URL").unwrap_or(defaults.client_url);
    let server_url = lookup("LATENCY_SERVER_URL").unwrap_or(defaults.server_url);

    let ping_interval_ms = lookup("LATENCY_PING_INTERVAL_MS")
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.ping_interval_ms);

    let report_interval_ms = lookup("LATENCY_REPORT_INTERVAL_MS")
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.report_interval_ms);

    let report_format = lookup("LATENCY_REPORT_FORMAT")
        .and_then(|v| ReportFormat::parse(&v))
        .unwrap_or(defaults.report_format);

    let drain_timeout_secs = lookup("LATENCY_DRAIN_TIMEOUT_SECS")
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.drain_timeout_secs);

    let debug = lookup("DEBUG").is_some();

    Ok(Config {
        client_url,
        server_url,
        ping_interval_ms,
        report_interval_ms,
        report_format,
        drain_timeout_secs,
        debug,
    })
}
