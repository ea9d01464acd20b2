use anyhow::{anyhow, Context, Result};
use std::env;
use std::time::Duration;

use crate::sessions::SessionConfig;
use crate::tokens::TokenConfig;

/// Upper bound for any configured token or session lifetime (30 days).
pub const MAX_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;

const DEFAULT_KEY_PREFIX: &str = "recipes_api";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieSameSite {
    Lax,
    Strict,
    None,
}

impl CookieSameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            CookieSameSite::Lax => "Lax",
            CookieSameSite::Strict => "Strict",
            CookieSameSite::None => "None",
        }
    }
}

/// Which credential guards the mutating recipe routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    Jwt,
    Session,
    External,
}

impl AuthStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStrategy::Jwt => "jwt",
            AuthStrategy::Session => "session",
            AuthStrategy::External => "external",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExternalAuthConfig {
    pub domain: String,
    pub api_identifier: String,
    pub fetch_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_url: String,
    pub redis_url: String,
    pub redis_key_prefix: String,
    pub tokens: TokenConfig,
    pub strategy: AuthStrategy,
    pub external: Option<ExternalAuthConfig>,
    pub sessions: SessionConfig,
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::load(|key| env::var(key).ok())
    }

    pub fn load<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .and_then(|value| normalize_optional(&value))
                .ok_or_else(|| anyhow!("{key} must be set"))
        };

        let database_url = required("DATABASE_URL")?;
        let redis_url = required("REDIS_URL")?;
        let secret = required("JWT_SECRET")?;

        let tokens = TokenConfig {
            secret,
            ttl_seconds: parse_or(&lookup, "JWT_TTL_SECONDS", 600)?,
            refresh_ttl_seconds: parse_or(&lookup, "JWT_REFRESH_TTL_SECONDS", 300)?,
            refresh_window_seconds: parse_or(&lookup, "JWT_REFRESH_WINDOW_SECONDS", 30)?,
        };
        validate_tokens(&tokens)?;

        let strategy = lookup("AUTH_STRATEGY")
            .and_then(|value| normalize_optional(&value))
            .map(|value| parse_strategy(&value))
            .transpose()
            .context("Failed to parse AUTH_STRATEGY")?
            .unwrap_or(AuthStrategy::Jwt);

        let external = match strategy {
            AuthStrategy::External => Some(ExternalAuthConfig {
                domain: required("AUTH0_DOMAIN")?,
                api_identifier: required("AUTH0_API_IDENTIFIER")?,
                fetch_timeout: Duration::from_secs(parse_or(&lookup, "JWKS_TIMEOUT_SECONDS", 5)?),
            }),
            _ => None,
        };

        let same_site = lookup("SESSION_COOKIE_SAMESITE")
            .map(|value| parse_same_site(&value))
            .transpose()
            .context("Failed to parse SESSION_COOKIE_SAMESITE")?
            .unwrap_or(CookieSameSite::Lax);
        let sessions = SessionConfig {
            cookie_name: lookup("SESSION_COOKIE_NAME")
                .and_then(|value| normalize_optional(&value))
                .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
            ttl_seconds: parse_or(&lookup, "SESSION_TTL_SECONDS", 3600)?,
            secure: lookup("SESSION_COOKIE_SECURE")
                .map(|value| parse_bool(&value))
                .unwrap_or(false),
            same_site,
        };
        check_ttl("SESSION_TTL_SECONDS", sessions.ttl_seconds)?;

        let redis_key_prefix = redis_key_prefix(lookup("REDIS_KEY_PREFIX"));

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "PORT", 8080)?;

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|value| parse_list(&value))
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(default_origins);

        Ok(ServiceConfig {
            database_url,
            redis_url,
            redis_key_prefix,
            tokens,
            strategy,
            external,
            sessions,
            host,
            port,
            cors_allowed_origins,
        })
    }
}

/// Cache and session key namespace; blank or unset falls back to `recipes_api`.
pub fn redis_key_prefix(raw: Option<String>) -> String {
    raw.and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string())
}

fn check_ttl(key: &str, seconds: u64) -> Result<()> {
    if seconds == 0 || seconds > MAX_TTL_SECONDS {
        return Err(anyhow!(
            "{key} must be between 1 and {MAX_TTL_SECONDS} seconds, got {seconds}"
        ));
    }
    Ok(())
}

fn validate_tokens(tokens: &TokenConfig) -> Result<()> {
    let positive = |key: &str, value: i64| -> Result<()> {
        let seconds = u64::try_from(value)
            .map_err(|_| anyhow!("{key} must be positive, got {value}"))?;
        check_ttl(key, seconds)
    };
    positive("JWT_TTL_SECONDS", tokens.ttl_seconds)?;
    positive("JWT_REFRESH_TTL_SECONDS", tokens.refresh_ttl_seconds)?;

    let window = tokens.refresh_window_seconds;
    if !(0..tokens.ttl_seconds).contains(&window) {
        return Err(anyhow!(
            "JWT_REFRESH_WINDOW_SECONDS must be in 0..{}, got {window}",
            tokens.ttl_seconds
        ));
    }
    Ok(())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).and_then(|value| normalize_optional(&value)) {
        Some(value) => value
            .parse::<T>()
            .map_err(|err| anyhow!("Invalid {key} '{value}': {err}")),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';' || c == ' ')
        .filter_map(normalize_optional)
        .collect()
}

fn default_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_strategy(value: &str) -> Result<AuthStrategy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "jwt" => Ok(AuthStrategy::Jwt),
        "session" => Ok(AuthStrategy::Session),
        "external" | "auth0" => Ok(AuthStrategy::External),
        other => Err(anyhow!(
            "Unsupported auth strategy '{other}'. Use jwt, session, or external."
        )),
    }
}

fn parse_same_site(value: &str) -> Result<CookieSameSite> {
    match value.trim().to_ascii_lowercase().as_str() {
        "lax" => Ok(CookieSameSite::Lax),
        "strict" => Ok(CookieSameSite::Strict),
        "none" => Ok(CookieSameSite::None),
        other => Err(anyhow!(
            "Unsupported cookie same-site policy '{other}'. Use Lax, Strict, or None."
        )),
    }
}
