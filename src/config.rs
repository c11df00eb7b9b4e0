//! Command-line and environment configuration.

use std::path::{Path, PathBuf};

use clap::builder::RangedU64ValueParser;
use clap::{Parser, ValueEnum};
use mnemo_hub::HubConfig;
use mnemo_server::ServerConfig;
use mnemo_telemetry::{LogFormat, TelemetryConfig};
use secrecy::SecretString;

/// Read before flags are parsed so `MNEMO_*` values can live in a file.
pub const ENV_FILE: &str = ".env";

/// Load `path` into the process environment. Variables already set win.
pub fn load_env_file(path: &Path) -> Result<PathBuf, dotenv::Error> {
    dotenv::from_path(path).map(|()| path.to_path_buf())
}

/// Logging profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogProfile {
    /// Console output, debug level.
    Dev,
    /// JSON lines, info level.
    Prod,
}

impl From<LogProfile> for LogFormat {
    fn from(profile: LogProfile) -> Self {
        match profile {
            LogProfile::Dev => Self::Dev,
            LogProfile::Prod => Self::Prod,
        }
    }
}

/// Real-time classroom hub.
#[derive(Parser, Debug)]
#[command(name = "mnemo", version, about = "Real-time classroom hub")]
pub struct Config {
    /// Environment name.
    #[arg(long, env = "MNEMO_ENV_NAME", default_value = "dev")]
    pub env_name: String,

    /// Service name.
    #[arg(long, env = "MNEMO_SERVICE_NAME", default_value = "mnemo")]
    pub service_name: String,

    /// Address serving the hub, health and version endpoints.
    #[arg(long, env = "MNEMO_LISTEN_ADDRESS", default_value = "0.0.0.0:8080")]
    pub listen_address: String,

    /// Logging profile.
    #[arg(long, env = "MNEMO_LOG_CONFIG", value_enum, default_value_t = LogProfile::Dev)]
    pub log_config: LogProfile,

    /// Shared secret granting the professor role (sent as `x-api-key`).
    #[arg(long, env = "MNEMO_PROFESSOR_API_KEY", hide_env_values = true)]
    pub professor_api_key: Option<String>,

    /// Idle time before a silent connection is dropped, in milliseconds.
    #[arg(
        long,
        env = "MNEMO_PONG_WAIT_MS",
        default_value_t = 10_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub pong_wait_ms: u64,

    /// Largest inbound frame, in bytes.
    #[arg(
        long,
        env = "MNEMO_MAX_FRAME_SIZE",
        default_value_t = 512,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub max_frame_size: usize,

    /// Delivery attempts per recipient before a message is dropped.
    #[arg(
        long,
        env = "MNEMO_DELIVERY_ATTEMPTS",
        default_value_t = 5,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub delivery_attempts: u32,

    /// Pause between delivery attempts, in milliseconds.
    #[arg(long, env = "MNEMO_DELIVERY_RETRY_DELAY_MS", default_value_t = 1_000)]
    pub delivery_retry_delay_ms: u64,

    /// Graceful shutdown budget, in milliseconds.
    #[arg(long, env = "MNEMO_SHUTDOWN_TIMEOUT_MS", default_value_t = 4_000)]
    pub shutdown_timeout_ms: u64,
}

impl Config {
    /// Telemetry settings.
    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            format: self.log_config.into(),
            env_name: self.env_name.clone(),
            service_name: self.service_name.clone(),
        }
    }

    /// Server settings.
    pub fn server(&self) -> ServerConfig {
        ServerConfig {
            listen_address: self.listen_address.clone(),
            hub: HubConfig {
                pong_wait_ms: self.pong_wait_ms,
                max_frame_size: self.max_frame_size,
                delivery_attempts: self.delivery_attempts,
                delivery_retry_delay_ms: self.delivery_retry_delay_ms,
            },
            professor_api_key: self
                .professor_api_key
                .clone()
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            version: env!("CARGO_PKG_VERSION").into(),
            shutdown_timeout_ms: self.shutdown_timeout_ms,
        }
    }

    /// Key/value view for the startup config tree. Secrets are redacted.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let key = match self.professor_api_key.as_deref() {
            Some(k) if !k.is_empty() => "[redacted]",
            _ => "[unset]",
        };
        vec![
            ("env_name", self.env_name.clone()),
            ("service_name", self.service_name.clone()),
            ("listen_address", self.listen_address.clone()),
            ("log_config", format!("{:?}", self.log_config).to_lowercase()),
            ("professor_api_key", key.to_owned()),
            ("pong_wait_ms", self.pong_wait_ms.to_string()),
            ("max_frame_size", self.max_frame_size.to_string()),
            ("delivery_attempts", self.delivery_attempts.to_string()),
            ("delivery_retry_delay_ms", self.delivery_retry_delay_ms.to_string()),
            ("shutdown_timeout_ms", self.shutdown_timeout_ms.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("mnemo").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let cfg = parse(&[]);
        assert_eq!(cfg.listen_address, "0.0.0.0:8080");
        assert_eq!(cfg.log_config, LogProfile::Dev);
        assert_eq!(cfg.server().hub, HubConfig::default());
    }

    #[test]
    fn professor_key_becomes_secret() {
        let cfg = parse(&["--professor-api-key", "s3cret"]);
        let server = cfg.server();
        assert_eq!(
            server.professor_api_key.unwrap().expose_secret(),
            "s3cret"
        );
    }

    #[test]
    fn empty_professor_key_is_unset() {
        let cfg = parse(&["--professor-api-key", ""]);
        assert!(cfg.server().professor_api_key.is_none());
    }

    #[test]
    fn fields_redact_key() {
        let cfg = parse(&["--professor-api-key", "s3cret"]);
        let fields = cfg.fields();
        assert!(fields.iter().all(|(_, v)| v != "s3cret"));
        assert!(fields.contains(&("professor_api_key", "[redacted]".to_owned())));
    }

    #[test]
    fn prod_profile() {
        let cfg = parse(&["--log-config", "prod"]);
        assert_eq!(cfg.telemetry().format, LogFormat::Prod);
    }

    #[test]
    fn zero_attempts_rejected() {
        let result =
            Config::try_parse_from(["mnemo", "--delivery-attempts", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn hub_overrides() {
        let cfg = parse(&["--pong-wait-ms", "2000", "--max-frame-size", "1024"]);
        let hub = cfg.server().hub;
        assert_eq!(hub.pong_wait_ms, 2000);
        assert_eq!(hub.max_frame_size, 1024);
    }

    #[test]
    fn env_file_supplies_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "MNEMO_SERVICE_NAME=mnemo-from-file").unwrap();

        let loaded = load_env_file(file.path()).unwrap();
        assert_eq!(loaded, file.path());
        assert_eq!(parse(&[]).service_name, "mnemo-from-file");
        // flags still override the file
        assert_eq!(parse(&["--service-name", "cli"]).service_name, "cli");
    }

    #[test]
    fn missing_env_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_env_file(&dir.path().join(ENV_FILE)).is_err());
    }
}
