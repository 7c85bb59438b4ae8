//! Runtime configuration read from the environment.
//!
//! Every setting has a default so the service starts against a local Postgres
//! with nothing set. The binary loads a `.env` file before calling
//! [`Config::from_env`].

use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::error::ChatbotError;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

static IDENTIFIER: OnceLock<Regex> = OnceLock::new();

fn identifier_pattern() -> &'static Regex {
    IDENTIFIER.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

/// Postgres connection parameters.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl_mode: String,
    pub max_connections: u32,
    pub timeout: Duration,
}

impl DatabaseConfig {
    /// Builds sqlx connect options from these parameters.
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Config` if the TLS mode is not a known Postgres `sslmode`.
    pub fn connect_options(&self) -> Result<PgConnectOptions, ChatbotError> {
        let ssl_mode = PgSslMode::from_str(&self.ssl_mode)
            .map_err(|e| ChatbotError::config(format!("Invalid DB_SSLMODE '{}': {e}", self.ssl_mode)))?;

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
            .ssl_mode(ssl_mode))
    }
}

/// Language model settings.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model: String,
    pub key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub llm: ModelConfig,
    pub products_table: String,
    pub requests_table: String,
    pub sql_read_only: bool,
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Config` if a variable is present but malformed.
    pub fn from_env() -> Result<Self, ChatbotError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Config` if a variable is present but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ChatbotError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database = DatabaseConfig {
            host: get("DB_HOST", "localhost"),
            port: parse_var(&lookup, "DB_PORT", 5432)?,
            user: get("DB_USER", "postgres"),
            password: get("DB_PASSWORD", ""),
            name: get("DB_NAME", "postgres"),
            ssl_mode: get("DB_SSLMODE", "prefer"),
            max_connections: parse_var(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            timeout: Duration::from_secs(parse_var(&lookup, "DB_TIMEOUT_SECS", 30)?),
        };
        // Fail early on a bad sslmode rather than at first connect.
        database.connect_options()?;

        let llm = ModelConfig {
            model: get("DEFAULT_MODEL", DEFAULT_MODEL),
            key: lookup("DEFAULT_KEY").or_else(|| lookup("OPENAI_API_KEY")),
            timeout: Duration::from_secs(parse_var(&lookup, "LLM_TIMEOUT_SECS", 60)?),
        };

        let products_table = table_name(get("PRODUCTS_TABLE", "products"))?;
        let requests_table = table_name(get("REQUESTS_TABLE", "requests"))?;

        Ok(Self {
            database,
            llm,
            products_table,
            requests_table,
            sql_read_only: parse_bool(&lookup, "SQL_READ_ONLY", true)?,
            host: get("HOST", "0.0.0.0"),
            port: parse_var(&lookup, "PORT", 5000)?,
        })
    }
}

fn parse_var<F, T>(
    lookup: &F,
    key: &str,
    default: T,
) -> Result<T, ChatbotError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ChatbotError::config(format!("Invalid {key} '{raw}': {e}"))),
        None => Ok(default),
    }
}

fn parse_bool<F>(
    lookup: &F,
    key: &str,
    default: bool,
) -> Result<bool, ChatbotError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ChatbotError::config(format!("Invalid {key} '{raw}': expected a boolean"))),
    }
}

// Table names are spliced into SQL text, so only plain identifiers pass.
fn table_name(name: String) -> Result<String, ChatbotError> {
    if identifier_pattern().is_match(&name) {
        Ok(name)
    } else {
        Err(ChatbotError::config(format!("Invalid table name '{name}'")))
    }
}
