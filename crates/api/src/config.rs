use std::fmt;
use std::str::FromStr;

/// How the server is deployed. Cloud deployments enforce email verification
/// codes at signup; self-hosted ones do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    Cloud,
    SelfHost,
}

impl DeployMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeployMode::Cloud => "cloud",
            DeployMode::SelfHost => "self-host",
        }
    }

    /// Whether signup must present an emailed verification code.
    pub fn enforces_verification_code(self) -> bool {
        self == DeployMode::Cloud
    }
}

impl FromStr for DeployMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cloud" => Ok(DeployMode::Cloud),
            "self-host" => Ok(DeployMode::SelfHost),
            other => Err(format!("unknown deploy mode '{other}'")),
        }
    }
}

impl fmt::Display for DeployMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for in-flight work after a termination signal (default: `5`).
    pub shutdown_timeout_secs: u64,
    pub deploy_mode: DeployMode,
    pub log_format: LogFormat,
    /// Postgres connection URL, from `DATABASE_URL` or the `PG_*` variables.
    pub database_url: String,
    /// Base URL of the trust service that validates tokens and permissions.
    pub trust_service_url: String,
    /// Shared secret used to sign requests to the trust service.
    pub trust_request_secret: String,
    /// Endpoint of the component generator behind the echo signal. Echo is
    /// disabled when unset.
    pub echo_endpoint: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `8000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:3000`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `5`                        |
    /// | `DEPLOY_MODE`           | `self-host`                |
    /// | `LOG_FORMAT`            | `pretty` (`json` for JSON) |
    /// | `DATABASE_URL`          | built from `PG_*`          |
    /// | `PG_HOST`               | `localhost`                |
    /// | `PG_PORT`               | `5432`                     |
    /// | `PG_USER`               | `canopy`                   |
    /// | `PG_PASSWORD`           | empty                      |
    /// | `PG_DATABASE`           | `canopy`                   |
    /// | `TRUST_SERVICE_URL`     | `http://localhost:8001`    |
    /// | `TRUST_REQUEST_SECRET`  | empty                      |
    /// | `ECHO_ENDPOINT`         | unset                      |
    pub fn from_env() -> Self {
        let host = env_or("HOST", "0.0.0.0");

        let port: u16 = env_or("PORT", "8000")
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = env_or("CORS_ORIGINS", "http://localhost:3000")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", "30")
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = env_or("SHUTDOWN_TIMEOUT_SECS", "5")
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let deploy_mode: DeployMode = env_or("DEPLOY_MODE", "self-host")
            .parse()
            .unwrap_or_else(|e| panic!("DEPLOY_MODE: {e}"));

        let log_format = if env_or("LOG_FORMAT", "pretty").eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        };

        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            postgres_url(
                &env_or("PG_HOST", "localhost"),
                &env_or("PG_PORT", "5432"),
                &env_or("PG_USER", "canopy"),
                &env_or("PG_PASSWORD", ""),
                &env_or("PG_DATABASE", "canopy"),
            )
        });

        let echo_endpoint = std::env::var("ECHO_ENDPOINT")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            deploy_mode,
            log_format,
            database_url,
            trust_service_url: env_or("TRUST_SERVICE_URL", "http://localhost:8001"),
            trust_request_secret: env_or("TRUST_REQUEST_SECRET", ""),
            echo_endpoint,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

/// Assemble a Postgres URL from its parts.
pub fn postgres_url(host: &str, port: &str, user: &str, password: &str, database: &str) -> String {
    if password.is_empty() {
        format!("postgres://{user}@{host}:{port}/{database}")
    } else {
        format!("postgres://{user}:{password}@{host}:{port}/{database}")
    }
}
