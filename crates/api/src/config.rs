use crate::auth::cookies::CookiePolicy;
use crate::auth::csrf::CsrfConfig;
use crate::auth::jwt::JwtConfig;

/// Development fallback for every secret. Refused in production.
const DEV_SECRET: &str = "secret";

const DEFAULT_ACCESS_TOKEN_EXPIRE_SECONDS: i64 = 10;
const DEFAULT_REFRESH_TOKEN_EXPIRE_SECONDS: i64 = 1440;
const DEFAULT_CSRF_TOKEN_MAX_AGE_SECONDS: i64 = 3600;

/// Invalid or missing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{0} must be set when PROD is enabled")]
    MissingSecret(&'static str),

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Postgres connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Production mode: `Secure` cookies and no default secrets.
    pub production: bool,
    /// Token signing secret and lifetimes.
    pub jwt: JwtConfig,
    /// CSRF signing secret and maximum token age.
    pub csrf: CsrfConfig,
    /// Key for refresh-token fingerprints.
    pub refresh_fingerprint_secret: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                 |
    /// |--------------------------------|-------------------------|
    /// | `HOST`                         | `0.0.0.0`               |
    /// | `PORT`                         | `3000`                  |
    /// | `CORS_ORIGINS`                 | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`         | `30`                    |
    /// | `DATABASE_URL`                 | unset (in-memory store) |
    /// | `PROD`                         | unset                   |
    /// | `JWT_SECRET`                   | `secret` (dev only)     |
    /// | `CSRF_SECRET`                  | `secret` (dev only)     |
    /// | `REFRESH_FINGERPRINT_SECRET`   | `secret` (dev only)     |
    /// | `ACCESS_TOKEN_EXPIRE_SECONDS`  | `10`                    |
    /// | `REFRESH_TOKEN_EXPIRE_SECONDS` | `1440`                  |
    /// | `CSRF_TOKEN_MAX_AGE_SECONDS`   | `3600`                  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ServerConfig::from_env`] but reading from an arbitrary source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let production = var("PROD").is_some();
        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&var, "PORT", "u16", 3000u16)?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = parse_or(&var, "REQUEST_TIMEOUT_SECS", "u64", 30u64)?;

        let secret = |name: &'static str| -> Result<String, ConfigError> {
            match var(name) {
                Some(value) => Ok(value),
                None if production => Err(ConfigError::MissingSecret(name)),
                None => {
                    tracing::warn!(var = name, "Using insecure development secret");
                    Ok(DEV_SECRET.to_string())
                }
            }
        };

        let jwt = JwtConfig {
            secret: secret("JWT_SECRET")?,
            access_token_expiry_secs: positive(
                &var,
                "ACCESS_TOKEN_EXPIRE_SECONDS",
                DEFAULT_ACCESS_TOKEN_EXPIRE_SECONDS,
            )?,
            refresh_token_expiry_secs: positive(
                &var,
                "REFRESH_TOKEN_EXPIRE_SECONDS",
                DEFAULT_REFRESH_TOKEN_EXPIRE_SECONDS,
            )?,
        };
        let csrf = CsrfConfig {
            secret: secret("CSRF_SECRET")?,
            max_age_secs: positive(
                &var,
                "CSRF_TOKEN_MAX_AGE_SECONDS",
                DEFAULT_CSRF_TOKEN_MAX_AGE_SECONDS,
            )?,
        };
        let refresh_fingerprint_secret = secret("REFRESH_FINGERPRINT_SECRET")?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_url: var("DATABASE_URL"),
            production,
            jwt,
            csrf,
            refresh_fingerprint_secret,
        })
    }

    /// Cookie attributes derived from this configuration.
    pub fn cookie_policy(&self) -> CookiePolicy {
        CookiePolicy {
            secure: self.production,
            token_max_age_secs: self.jwt.refresh_token_expiry_secs,
            csrf_max_age_secs: self.csrf.max_age_secs,
        }
    }
}

fn parse_or<T, V>(
    var: &V,
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    V: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value,
        }),
    }
}

fn positive<V>(var: &V, name: &'static str, default: i64) -> Result<i64, ConfigError>
where
    V: Fn(&str) -> Option<String>,
{
    let value = parse_or(var, name, "integer", default)?;
    if value <= 0 {
        return Err(ConfigError::NotPositive(name));
    }
    Ok(value)
}
