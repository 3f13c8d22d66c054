// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`Config`] loaded from them
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory of the grant database | `./data` |
//! | `GRANT_CACHE_CAPACITY` | Entries in the single-key LRU cache | `1024` |
//! | `OBJECT_BUCKET` | Bucket holding team objects | Required |
//! | `OBJECT_REGION` | Bucket region | Required |
//! | `OBJECT_ACCESS_KEY` | Access key id | AWS provider chain |
//! | `OBJECT_ACCESS_SECRET` | Secret access key | AWS provider chain |
//! | `OBJECT_SESSION_TOKEN` | Session token of temporary credentials | Unset |
//! | `OBJECT_ENDPOINT` | S3-compatible endpoint (path-style addressing) | Unset |
//! | `GRANT_DEFAULT_TTL_SECS` | Default read grant TTL | `604800` |
//! | `GRANT_REVALIDATION_TTL_SECS` | Batch revalidation and backfill TTL | `3600` |
//! | `GRANT_WRITE_TTL_SECS` | Upload grant TTL | `3600` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::grants::GrantPolicy;
use crate::signer::{S3SignerConfig, MAX_PRESIGN_EXPIRY};
use crate::storage::grant_db::DEFAULT_CACHE_CAPACITY;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the grant database directory.
///
/// The redb file `grants.redb` is created inside it on first start.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const CACHE_CAPACITY_ENV: &str = "GRANT_CACHE_CAPACITY";

pub const OBJECT_BUCKET_ENV: &str = "OBJECT_BUCKET";
pub const OBJECT_REGION_ENV: &str = "OBJECT_REGION";
pub const OBJECT_ACCESS_KEY_ENV: &str = "OBJECT_ACCESS_KEY";
pub const OBJECT_ACCESS_SECRET_ENV: &str = "OBJECT_ACCESS_SECRET";
pub const OBJECT_SESSION_TOKEN_ENV: &str = "OBJECT_SESSION_TOKEN";
pub const OBJECT_ENDPOINT_ENV: &str = "OBJECT_ENDPOINT";

pub const DEFAULT_TTL_ENV: &str = "GRANT_DEFAULT_TTL_SECS";
pub const REVALIDATION_TTL_ENV: &str = "GRANT_REVALIDATION_TTL_SECS";
pub const WRITE_TTL_ENV: &str = "GRANT_WRITE_TTL_SECS";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Database file name inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "grants.redb";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub cache_capacity: usize,
    pub object_store: S3SignerConfig,
    pub policy: GrantPolicy,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value
    /// if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));

        let endpoint = optional(OBJECT_ENDPOINT_ENV)
            .map(|raw| {
                Url::parse(&raw).map_err(|e| ConfigError::Invalid {
                    name: OBJECT_ENDPOINT_ENV,
                    value: raw.clone(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        // Static keys come as a pair; without them the AWS provider chain applies.
        let access_key = optional(OBJECT_ACCESS_KEY_ENV);
        let secret_key = optional(OBJECT_ACCESS_SECRET_ENV);
        match (&access_key, &secret_key) {
            (Some(_), None) => return Err(ConfigError::Missing(OBJECT_ACCESS_SECRET_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(OBJECT_ACCESS_KEY_ENV)),
            _ => {}
        }

        let object_store = S3SignerConfig {
            bucket: required(OBJECT_BUCKET_ENV)?,
            region: required(OBJECT_REGION_ENV)?,
            access_key,
            secret_key,
            session_token: optional(OBJECT_SESSION_TOKEN_ENV),
            endpoint,
        };

        let defaults = GrantPolicy::default();
        let policy = GrantPolicy {
            default_ttl: ttl(DEFAULT_TTL_ENV, optional(DEFAULT_TTL_ENV), defaults.default_ttl)?,
            revalidation_ttl: ttl(
                REVALIDATION_TTL_ENV,
                optional(REVALIDATION_TTL_ENV),
                defaults.revalidation_ttl,
            )?,
            write_ttl: ttl(WRITE_TTL_ENV, optional(WRITE_TTL_ENV), defaults.write_ttl)?,
        };

        let log_format = match optional(LOG_FORMAT_ENV).as_deref() {
            None => LogFormat::default(),
            Some(raw) if raw.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(raw) if raw.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            Some(raw) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    value: raw.to_string(),
                    reason: "expected `json` or `pretty`".to_string(),
                })
            }
        };

        Ok(Self {
            host: optional(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parsed(PORT_ENV, optional(PORT_ENV))?.unwrap_or(DEFAULT_PORT),
            data_dir: optional(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            cache_capacity: parsed(CACHE_CAPACITY_ENV, optional(CACHE_CAPACITY_ENV))?
                .unwrap_or(DEFAULT_CACHE_CAPACITY),
            object_store,
            policy,
            log_format,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T>(name: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| {
        value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            value: value.clone(),
            reason: e.to_string(),
        })
    })
    .transpose()
}

fn ttl(name: &'static str, raw: Option<String>, default: Duration) -> Result<Duration, ConfigError> {
    let Some(secs) = parsed::<u64>(name, raw)? else {
        return Ok(default);
    };
    let ttl = Duration::from_secs(secs);
    if secs == 0 || ttl > MAX_PRESIGN_EXPIRY {
        return Err(ConfigError::Invalid {
            name,
            value: secs.to_string(),
            reason: format!("must be between 1 and {} seconds", MAX_PRESIGN_EXPIRY.as_secs()),
        });
    }
    Ok(ttl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        (OBJECT_BUCKET_ENV, "team-assets"),
        (OBJECT_REGION_ENV, "eu-west-1"),
        (OBJECT_ACCESS_KEY_ENV, "AKIDEXAMPLE"),
        (OBJECT_ACCESS_SECRET_ENV, "secret"),
    ];

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.database_path(), PathBuf::from("./data/grants.redb"));
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert_eq!(config.policy, GrantPolicy::default());
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.object_store.endpoint.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            (PORT_ENV, "9000"),
            (OBJECT_ENDPOINT_ENV, "http://localhost:9000"),
            (REVALIDATION_TTL_ENV, "120"),
            (LOG_FORMAT_ENV, "JSON"),
        ]);
        let config = Config::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.policy.revalidation_ttl, Duration::from_secs(120));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.object_store.endpoint.as_ref().map(Url::as_str),
            Some("http://localhost:9000/")
        );
    }

    #[test]
    fn half_credentials_fail() {
        let err = Config::from_lookup(lookup(&REQUIRED[..3])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(OBJECT_ACCESS_SECRET_ENV));
    }

    #[test]
    fn credentials_fall_back_to_provider_chain() {
        let config = Config::from_lookup(lookup(&REQUIRED[..2])).unwrap();
        assert!(config.object_store.access_key.is_none());
        assert!(config.object_store.secret_key.is_none());
    }

    #[test]
    fn missing_bucket_fails() {
        let err = Config::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(OBJECT_BUCKET_ENV));
    }

    #[test]
    fn bad_numbers_fail() {
        for (name, value) in [(PORT_ENV, "eighty"), (WRITE_TTL_ENV, "0"), (DEFAULT_TTL_ENV, "604801")] {
            let mut vars = REQUIRED.to_vec();
            vars.push((name, value));
            let err = Config::from_lookup(lookup(&vars)).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { name: n, .. } if n == name),
                "{name}={value}: {err:?}"
            );
        }
    }
}
