//! Application configuration loaded from environment variables.
//!
//! Configuration is read and validated once at startup. The database URL and
//! both JWT secrets are required; everything else has a default.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::Invalid {
                key: "APP_ENV",
                reason: format!("unknown environment '{}'", other),
            }),
        }
    }
}

/// Token signing settings.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Access token signing secret
    pub secret: Vec<u8>,
    /// Access token lifetime
    pub access_ttl: chrono::Duration,
    /// Refresh token signing secret (must differ from `secret`)
    pub refresh_secret: Vec<u8>,
    /// Refresh token lifetime
    pub refresh_ttl: chrono::Duration,
}

/// Per-client request limit.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub pretty: bool,
}

/// SMTP settings. Present only when credentials are configured.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS (usually port 465). Otherwise STARTTLS is used.
    pub secure: bool,
    pub user: String,
    pub password: String,
    pub from_name: String,
    pub from_email: String,
}

/// Firebase service account used for FCM push.
#[derive(Debug, Clone)]
pub enum FirebaseCredentials {
    Inline {
        client_email: String,
        private_key: String,
    },
    ServiceAccountFile(PathBuf),
}

#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub project_id: Option<String>,
    pub credentials: FirebaseCredentials,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    /// Store location: `memory://` or `firestore://<project-id>`
    pub database_url: String,
    pub jwt: JwtConfig,
    /// bcrypt work factor
    pub bcrypt_cost: u32,
    pub cors_origins: Vec<String>,
    pub cors_credentials: bool,
    pub rate_limit: RateLimitConfig,
    pub log: LogConfig,
    pub smtp: Option<SmtpConfig>,
    pub firebase: Option<FirebaseConfig>,
    /// Create the demo admin/user/moderator accounts at startup
    pub seed_demo_users: bool,
}

pub const DEFAULT_BCRYPT_COST: u32 = 10;
const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

impl Config {
    /// Build a configuration from the required values, with defaults for the rest.
    pub fn new(
        database_url: impl Into<String>,
        jwt_secret: impl Into<Vec<u8>>,
        refresh_secret: impl Into<Vec<u8>>,
    ) -> Result<Self, ConfigError> {
        let database_url = database_url.into();
        let secret = jwt_secret.into();
        let refresh_secret = refresh_secret.into();

        if database_url.trim().is_empty() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        if secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        if refresh_secret.is_empty() {
            return Err(ConfigError::Missing("REFRESH_TOKEN_SECRET"));
        }
        if secret == refresh_secret {
            return Err(ConfigError::Invalid {
                key: "REFRESH_TOKEN_SECRET",
                reason: "must differ from JWT_SECRET".to_string(),
            });
        }

        Ok(Self::with_defaults(database_url, secret, refresh_secret))
    }

    fn with_defaults(database_url: String, secret: Vec<u8>, refresh_secret: Vec<u8>) -> Self {
        Self {
            environment: Environment::Development,
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url,
            jwt: JwtConfig {
                secret,
                access_ttl: chrono::Duration::minutes(15),
                refresh_secret,
                refresh_ttl: chrono::Duration::days(7),
            },
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            cors_origins: vec!["http://localhost:3000".to_string()],
            cors_credentials: false,
            rate_limit: RateLimitConfig {
                max_requests: 100,
                window: Duration::from_secs(15 * 60),
            },
            log: LogConfig {
                level: "info".to_string(),
                pretty: false,
            },
            smtp: None,
            firebase: None,
            seed_demo_users: false,
        }
    }

    /// Default config for testing only.
    ///
    /// Uses the in-memory store and the minimum bcrypt cost.
    pub fn test_default() -> Self {
        let mut config = Self::with_defaults(
            "memory://".to_string(),
            b"test_access_secret_32_bytes_min!".to_vec(),
            b"test_refresh_secret_32_bytes_min".to_vec(),
        );
        config.environment = Environment::Test;
        config.bcrypt_cost = MIN_BCRYPT_COST;
        config.rate_limit.max_requests = 10_000;
        config
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let mut config = Self::new(
            required("DATABASE_URL")?,
            required("JWT_SECRET")?.into_bytes(),
            required("REFRESH_TOKEN_SECRET")?.into_bytes(),
        )?;

        if let Some(raw) = optional("APP_ENV").or_else(|| optional("NODE_ENV")) {
            config.environment = Environment::parse(&raw)?;
        }
        if let Some(host) = optional("HOST") {
            config.host = host;
        }
        if let Some(port) = optional("PORT") {
            config.port = parse_number("PORT", &port)?;
        }

        if let Some(raw) = optional("JWT_EXPIRES_IN") {
            config.jwt.access_ttl = parse_ttl("JWT_EXPIRES_IN", &raw)?;
        }
        if let Some(raw) = optional("REFRESH_TOKEN_EXPIRES_IN") {
            config.jwt.refresh_ttl = parse_ttl("REFRESH_TOKEN_EXPIRES_IN", &raw)?;
        }

        if let Some(raw) = optional("BCRYPT_ROUNDS") {
            let cost: u32 = parse_number("BCRYPT_ROUNDS", &raw)?;
            if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
                return Err(ConfigError::Invalid {
                    key: "BCRYPT_ROUNDS",
                    reason: format!("must be between {MIN_BCRYPT_COST} and {MAX_BCRYPT_COST}"),
                });
            }
            config.bcrypt_cost = cost;
        }

        if let Some(raw) = optional("CORS_ORIGIN") {
            config.cors_origins = raw
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }
        config.cors_credentials = flag("CORS_CREDENTIALS");

        if let Some(raw) = optional("RATE_LIMIT_MAX") {
            config.rate_limit.max_requests = parse_number("RATE_LIMIT_MAX", &raw)?;
        }
        if let Some(raw) = optional("RATE_LIMIT_TIME_WINDOW") {
            config.rate_limit.window = parse_ttl("RATE_LIMIT_TIME_WINDOW", &raw)?
                .to_std()
                .map_err(|_| ConfigError::Invalid {
                    key: "RATE_LIMIT_TIME_WINDOW",
                    reason: "must be positive".to_string(),
                })?;
        }

        if let Some(level) = optional("LOG_LEVEL") {
            config.log.level = level;
        }
        config.log.pretty = flag("LOG_PRETTY");

        config.smtp = smtp_from_env()?;
        config.firebase = firebase_from_env();
        config.seed_demo_users = flag("SEED_DEMO_USERS");

        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

fn smtp_from_env() -> Result<Option<SmtpConfig>, ConfigError> {
    let (Some(user), Some(password)) = (optional("SMTP_USER"), optional("SMTP_PASSWORD")) else {
        return Ok(None);
    };

    let port = match optional("SMTP_PORT") {
        Some(raw) => parse_number("SMTP_PORT", &raw)?,
        None => 587,
    };

    Ok(Some(SmtpConfig {
        host: optional("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
        port,
        secure: flag("SMTP_SECURE"),
        user,
        password,
        from_name: optional("SMTP_FROM_NAME").unwrap_or_else(|| "User Auth API".to_string()),
        from_email: optional("SMTP_FROM_EMAIL")
            .unwrap_or_else(|| "noreply@example.com".to_string()),
    }))
}

fn firebase_from_env() -> Option<FirebaseConfig> {
    let project_id = optional("FIREBASE_PROJECT_ID");

    if let Some(path) = optional("FIREBASE_SERVICE_ACCOUNT_PATH") {
        return Some(FirebaseConfig {
            project_id,
            credentials: FirebaseCredentials::ServiceAccountFile(PathBuf::from(path)),
        });
    }

    match (optional("FIREBASE_CLIENT_EMAIL"), optional("FIREBASE_PRIVATE_KEY")) {
        (Some(client_email), Some(private_key)) => Some(FirebaseConfig {
            project_id,
            credentials: FirebaseCredentials::Inline {
                client_email,
                // Keys pasted into env files usually carry literal "\n" sequences
                private_key: private_key.replace("\\n", "\n"),
            },
        }),
        _ => None,
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn flag(key: &str) -> bool {
    optional(key)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid {
        key,
        reason: format!("'{}' is not a valid number", raw),
    })
}

/// Longest accepted token lifetime or rate limit window.
const MAX_TTL_DAYS: i64 = 3650;

fn parse_ttl(key: &'static str, raw: &str) -> Result<chrono::Duration, ConfigError> {
    match parse_duration(raw) {
        Some(ttl) if ttl > chrono::Duration::days(MAX_TTL_DAYS) => Err(ConfigError::Invalid {
            key,
            reason: format!("'{}' exceeds the maximum of {} days", raw, MAX_TTL_DAYS),
        }),
        Some(ttl) if ttl > chrono::Duration::zero() => Ok(ttl),
        _ => Err(ConfigError::Invalid {
            key,
            reason: format!("'{}' is not a valid duration (e.g. 30s, 15m, 2h, 7d)", raw),
        }),
    }
}

/// Parse a compact duration such as `30s`, `15m`, `2h`, `7d`, `15 minutes`,
/// or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Option<chrono::Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let value: i64 = digits.parse().ok()?;

    // Out-of-range values are rejected rather than overflowing
    match unit.trim().to_ascii_lowercase().as_str() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => chrono::Duration::try_seconds(value),
        "m" | "min" | "mins" | "minute" | "minutes" => chrono::Duration::try_minutes(value),
        "h" | "hr" | "hrs" | "hour" | "hours" => chrono::Duration::try_hours(value),
        "d" | "day" | "days" => chrono::Duration::try_days(value),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
