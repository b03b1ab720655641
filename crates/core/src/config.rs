use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub classifier: ClassifierConfig,
    pub worker: WorkerConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    pub provider: ClassifierProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub count: u32,
    pub poll_interval_ms: u64,
    pub job_max_attempts: u32,
    pub job_lease_secs: u64,
    pub history_limit: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierProvider {
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub classifier_provider: Option<ClassifierProvider>,
    pub classifier_model: Option<String>,
    pub classifier_api_key: Option<String>,
    pub classifier_base_url: Option<String>,
    pub worker_count: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://pedibot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            classifier: ClassifierConfig {
                provider: ClassifierProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 20,
                max_retries: 2,
            },
            worker: WorkerConfig {
                count: 2,
                poll_interval_ms: 500,
                job_max_attempts: 3,
                job_lease_secs: 120,
                history_limit: 10,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for ClassifierProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported classifier provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    /// Defaults, then the optional `pedibot.toml` patch, then `PEDIBOT_*`
    /// environment variables, then programmatic overrides; validated last.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pedibot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(classifier) = patch.classifier {
            if let Some(provider) = classifier.provider {
                self.classifier.provider = provider;
            }
            if let Some(api_key_value) = classifier.api_key {
                self.classifier.api_key = Some(api_key_value.into());
            }
            if let Some(base_url) = classifier.base_url {
                self.classifier.base_url = Some(base_url);
            }
            if let Some(model) = classifier.model {
                self.classifier.model = model;
            }
            if let Some(timeout_secs) = classifier.timeout_secs {
                self.classifier.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = classifier.max_retries {
                self.classifier.max_retries = max_retries;
            }
        }

        if let Some(worker) = patch.worker {
            if let Some(count) = worker.count {
                self.worker.count = count;
            }
            if let Some(poll_interval_ms) = worker.poll_interval_ms {
                self.worker.poll_interval_ms = poll_interval_ms;
            }
            if let Some(job_max_attempts) = worker.job_max_attempts {
                self.worker.job_max_attempts = job_max_attempts;
            }
            if let Some(job_lease_secs) = worker.job_lease_secs {
                self.worker.job_lease_secs = job_lease_secs;
            }
            if let Some(history_limit) = worker.history_limit {
                self.worker.history_limit = history_limit;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PEDIBOT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("PEDIBOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("PEDIBOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("PEDIBOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("PEDIBOT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PEDIBOT_CLASSIFIER_PROVIDER") {
            self.classifier.provider = value.parse()?;
        }
        if let Some(value) = read_env("PEDIBOT_CLASSIFIER_API_KEY") {
            self.classifier.api_key = Some(value.into());
        }
        if let Some(value) = read_env("PEDIBOT_CLASSIFIER_BASE_URL") {
            self.classifier.base_url = Some(value);
        }
        if let Some(value) = read_env("PEDIBOT_CLASSIFIER_MODEL") {
            self.classifier.model = value;
        }
        if let Some(value) = read_env("PEDIBOT_CLASSIFIER_TIMEOUT_SECS") {
            self.classifier.timeout_secs = parse_u64("PEDIBOT_CLASSIFIER_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PEDIBOT_CLASSIFIER_MAX_RETRIES") {
            self.classifier.max_retries = parse_u32("PEDIBOT_CLASSIFIER_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("PEDIBOT_WORKER_COUNT") {
            self.worker.count = parse_u32("PEDIBOT_WORKER_COUNT", &value)?;
        }
        if let Some(value) = read_env("PEDIBOT_WORKER_POLL_INTERVAL_MS") {
            self.worker.poll_interval_ms = parse_u64("PEDIBOT_WORKER_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = read_env("PEDIBOT_WORKER_JOB_MAX_ATTEMPTS") {
            self.worker.job_max_attempts = parse_u32("PEDIBOT_WORKER_JOB_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("PEDIBOT_WORKER_JOB_LEASE_SECS") {
            self.worker.job_lease_secs = parse_u64("PEDIBOT_WORKER_JOB_LEASE_SECS", &value)?;
        }
        if let Some(value) = read_env("PEDIBOT_WORKER_HISTORY_LIMIT") {
            self.worker.history_limit = parse_u32("PEDIBOT_WORKER_HISTORY_LIMIT", &value)?;
        }

        if let Some(value) = read_env("PEDIBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PEDIBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("PEDIBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("PEDIBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PEDIBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("PEDIBOT_LOGGING_LEVEL").or_else(|| read_env("PEDIBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PEDIBOT_LOGGING_FORMAT").or_else(|| read_env("PEDIBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(provider) = overrides.classifier_provider {
            self.classifier.provider = provider;
        }
        if let Some(model) = overrides.classifier_model {
            self.classifier.model = model;
        }
        if let Some(api_key) = overrides.classifier_api_key {
            self.classifier.api_key = Some(api_key.into());
        }
        if let Some(base_url) = overrides.classifier_base_url {
            self.classifier.base_url = Some(base_url);
        }
        if let Some(count) = overrides.worker_count {
            self.worker.count = count;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_classifier(&self.classifier)?;
        validate_worker(&self.worker)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pedibot.toml"), PathBuf::from("config/pedibot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_classifier(classifier: &ClassifierConfig) -> Result<(), ConfigError> {
    if classifier.timeout_secs == 0 || classifier.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "classifier.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if classifier.model.trim().is_empty() {
        return Err(ConfigError::Validation("classifier.model must not be empty".to_string()));
    }

    match classifier.provider {
        ClassifierProvider::OpenAi | ClassifierProvider::Anthropic => {
            let missing = classifier
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "classifier.api_key is required for openai/anthropic providers".to_string(),
                ));
            }
        }
        ClassifierProvider::Ollama => {
            let missing =
                classifier.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "classifier.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_worker(worker: &WorkerConfig) -> Result<(), ConfigError> {
    if worker.count == 0 || worker.count > 32 {
        return Err(ConfigError::Validation("worker.count must be in range 1..=32".to_string()));
    }

    if worker.poll_interval_ms < 50 || worker.poll_interval_ms > 60_000 {
        return Err(ConfigError::Validation(
            "worker.poll_interval_ms must be in range 50..=60000".to_string(),
        ));
    }

    if worker.job_max_attempts == 0 || worker.job_max_attempts > 10 {
        return Err(ConfigError::Validation(
            "worker.job_max_attempts must be in range 1..=10".to_string(),
        ));
    }

    if worker.job_lease_secs < 10 || worker.job_lease_secs > 3_600 {
        return Err(ConfigError::Validation(
            "worker.job_lease_secs must be in range 10..=3600".to_string(),
        ));
    }

    if worker.history_limit == 0 || worker.history_limit > 100 {
        return Err(ConfigError::Validation(
            "worker.history_limit must be in range 1..=100".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    classifier: Option<ClassifierPatch>,
    worker: Option<WorkerPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierPatch {
    provider: Option<ClassifierProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkerPatch {
    count: Option<u32>,
    poll_interval_ms: Option<u64>,
    job_max_attempts: Option<u32>,
    job_lease_secs: Option<u64>,
    history_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
