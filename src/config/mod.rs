// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Environment configuration for the worker process.
//!
//! The worker reads plain environment variables (a `.env` file is honored
//! in development). Postgres and Redis are the only external services; RPC
//! endpoints are configured per contract in the database, not here.
//!
//! | Variable | Effect |
//! |---|---|
//! | `DB_HOST` / `DB_PORT` / `DB_USER` / `DB_PASSWORD` / `DB_NAME` | Postgres connection |
//! | `DB_STATEMENT_TIMEOUT` | Statement timeout in ms, default 120000 |
//! | `REDIS_HOST` / `REDIS_PORT` / `REDIS_PASSWORD` | Redis for queue + rate limiter |

pub mod constants;

use std::env;

use crate::errors::ConfigError;

/// Postgres connection settings.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    /// Statement timeout in milliseconds.
    pub statement_timeout_ms: u64,
}

/// Redis connection settings, shared by the queue and the rate limiter.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl RedisConfig {
    /// Connection URL in the form `redis://[:password@]host:port`.
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{}@{}:{}", password, self.host, self.port),
            None => format!("redis://{}:{}", self.host, self.port),
        }
    }
}

/// Full worker configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db: DbConfig,
    pub redis: RedisConfig,
}

impl AppConfig {
    /// Read configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or a
    /// numeric variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            db: DbConfig {
                host: require("DB_HOST")?,
                port: parse_var("DB_PORT", 5432)?,
                user: require("DB_USER")?,
                password: require("DB_PASSWORD")?,
                name: require("DB_NAME")?,
                statement_timeout_ms: parse_var(
                    "DB_STATEMENT_TIMEOUT",
                    constants::DB_DEFAULT_STATEMENT_TIMEOUT_MS,
                )?,
            },
            redis: RedisConfig {
                host: require("REDIS_HOST")?,
                port: parse_var("REDIS_PORT", 6379)?,
                password: optional("REDIS_PASSWORD"),
            },
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::missing(name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(name, e.to_string())),
        Err(_) => Ok(default),
    }
}
