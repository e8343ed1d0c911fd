// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`AppConfig`] loaded from
//! them once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LEDGER_PATH` | redb file for the persistent ledger | unset (in-memory ledger) |
//! | `REGISTRY_ADDRESS` | Registry scope every proof and grant is bound to | `0x749b…31aD` |
//! | `CHAIN_ID` | Chain ID of the EIP-712 decryption domain | `11155111` |
//! | `DECRYPTION_ADDRESS` | Verifying contract of the decryption domain | `0xb6E1…07D1` |
//! | `PRINCIPAL_KEY_PATH` | PEM secp256k1 key of the custodied principal | unset |
//! | `PRINCIPAL_PRIVATE_KEY` | Hex key, used when no PEM path is set | unset (random key) |
//! | `COPROCESSOR_SEED` | 32-byte hex seed of the local coprocessor | unset (random per process) |
//! | `GRANT_DURATION_DAYS` | Validity window of decryption grants | `7` |
//! | `COMMIT_TIMEOUT_SECS` | Bound on the ledger commitment wait | unset (no bound) |
//! | `SIGNATURE_TIMEOUT_SECS` | Bound on signature collection | unset (no bound) |
//! | `TLS_CERT_PATH` | PEM certificate chain; HTTPS when set with the key | unset |
//! | `TLS_KEY_PATH` | PEM private key for TLS | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{address, Address};

use crate::grants::DEFAULT_GRANT_DURATION_DAYS;
use crate::models::Scope;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Path of the redb ledger file. Unset keeps the ledger in memory.
pub const LEDGER_PATH_ENV: &str = "LEDGER_PATH";

pub const REGISTRY_ADDRESS_ENV: &str = "REGISTRY_ADDRESS";
pub const CHAIN_ID_ENV: &str = "CHAIN_ID";
pub const DECRYPTION_ADDRESS_ENV: &str = "DECRYPTION_ADDRESS";

/// PEM key (SEC1 or PKCS#8) of the principal this instance signs for.
///
/// Takes precedence over [`PRINCIPAL_PRIVATE_KEY_ENV`].
pub const PRINCIPAL_KEY_PATH_ENV: &str = "PRINCIPAL_KEY_PATH";
pub const PRINCIPAL_PRIVATE_KEY_ENV: &str = "PRINCIPAL_PRIVATE_KEY";

/// Seed of the local coprocessor. Handles sealed under one seed can only be
/// opened by a coprocessor with the same seed, so a persistent ledger needs
/// a fixed seed.
pub const COPROCESSOR_SEED_ENV: &str = "COPROCESSOR_SEED";

pub const GRANT_DURATION_DAYS_ENV: &str = "GRANT_DURATION_DAYS";
pub const COMMIT_TIMEOUT_SECS_ENV: &str = "COMMIT_TIMEOUT_SECS";
pub const SIGNATURE_TIMEOUT_SECS_ENV: &str = "SIGNATURE_TIMEOUT_SECS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Sepolia.
pub const DEFAULT_CHAIN_ID: u64 = 11_155_111;

/// Deployed travel registry.
pub const DEFAULT_REGISTRY_ADDRESS: Address = address!("0x749b19f59b2264f846cff9d68bdb098ce63e31ad");

/// Decryption verifier of the Sepolia coprocessor deployment.
pub const DEFAULT_DECRYPTION_ADDRESS: Address =
    address!("0xb6e160b1ff80d67bfe90a85ee06ce0a2613607d1");

pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{present} is set but {missing} is not")]
    Incomplete {
        present: &'static str,
        missing: &'static str,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("expected `json` or `pretty`, got `{other}`")),
        }
    }
}

/// Where the principal key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalKeySource {
    PemFile(PathBuf),
    Hex(String),
    /// Fresh key per process.
    Ephemeral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub ledger_path: Option<PathBuf>,
    pub registry: Scope,
    pub chain_id: u64,
    pub decryption_address: Address,
    pub principal_key: PrincipalKeySource,
    pub coprocessor_seed: Option<[u8; 32]>,
    pub grant_duration_days: u32,
    pub commit_timeout: Option<Duration>,
    pub signature_timeout: Option<Duration>,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(&get, PORT_ENV, DEFAULT_PORT)?;
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| invalid(HOST_ENV, &host, e))?;

        let principal_key = match (get(PRINCIPAL_KEY_PATH_ENV), get(PRINCIPAL_PRIVATE_KEY_ENV)) {
            (Some(path), _) => PrincipalKeySource::PemFile(PathBuf::from(path)),
            (None, Some(hex)) => PrincipalKeySource::Hex(hex),
            (None, None) => PrincipalKeySource::Ephemeral,
        };

        let coprocessor_seed = get(COPROCESSOR_SEED_ENV)
            .map(|raw| {
                crate::coprocessor::local::parse_seed(&raw)
                    .map_err(|e| invalid(COPROCESSOR_SEED_ENV, "<redacted>", e))
            })
            .transpose()?;

        let grant_duration_days =
            parse_or(&get, GRANT_DURATION_DAYS_ENV, DEFAULT_GRANT_DURATION_DAYS)?;
        if grant_duration_days == 0 {
            return Err(invalid(GRANT_DURATION_DAYS_ENV, "0", "must be at least 1"));
        }

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    present: TLS_CERT_PATH_ENV,
                    missing: TLS_KEY_PATH_ENV,
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    present: TLS_KEY_PATH_ENV,
                    missing: TLS_CERT_PATH_ENV,
                })
            }
            (None, None) => None,
        };

        Ok(Self {
            bind_addr,
            ledger_path: get(LEDGER_PATH_ENV).map(PathBuf::from),
            registry: Scope(parse_or(&get, REGISTRY_ADDRESS_ENV, DEFAULT_REGISTRY_ADDRESS)?),
            chain_id: parse_or(&get, CHAIN_ID_ENV, DEFAULT_CHAIN_ID)?,
            decryption_address: parse_or(&get, DECRYPTION_ADDRESS_ENV, DEFAULT_DECRYPTION_ADDRESS)?,
            principal_key,
            coprocessor_seed,
            grant_duration_days,
            commit_timeout: parse_secs(&get, COMMIT_TIMEOUT_SECS_ENV)?,
            signature_timeout: parse_secs(&get, SIGNATURE_TIMEOUT_SECS_ENV)?,
            tls,
            log_format: parse_or(&get, LOG_FORMAT_ENV, LogFormat::default())?,
        })
    }
}

fn invalid(name: &'static str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw.trim().parse().map_err(|e| invalid(name, &raw, e)),
        None => Ok(default),
    }
}

fn parse_secs<G>(get: &G, name: &'static str) -> Result<Option<Duration>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => {
            let secs: u64 = raw.trim().parse().map_err(|e| invalid(name, &raw, e))?;
            Ok(Some(Duration::from_secs(secs)))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.registry, Scope(DEFAULT_REGISTRY_ADDRESS));
        assert_eq!(config.chain_id, DEFAULT_CHAIN_ID);
        assert_eq!(config.decryption_address, DEFAULT_DECRYPTION_ADDRESS);
        assert_eq!(config.principal_key, PrincipalKeySource::Ephemeral);
        assert_eq!(config.grant_duration_days, 7);
        assert_eq!(config.commit_timeout, None);
        assert_eq!(config.signature_timeout, None);
        assert!(config.ledger_path.is_none());
        assert!(config.tls.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            (HOST_ENV, "127.0.0.1"),
            (PORT_ENV, "9000"),
            (LEDGER_PATH_ENV, "/var/lib/ledger.redb"),
            (CHAIN_ID_ENV, "31337"),
            (PRINCIPAL_PRIVATE_KEY_ENV, "0x01"),
            (GRANT_DURATION_DAYS_ENV, "1"),
            (COMMIT_TIMEOUT_SECS_ENV, "30"),
            (LOG_FORMAT_ENV, "JSON"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.ledger_path, Some(PathBuf::from("/var/lib/ledger.redb")));
        assert_eq!(config.chain_id, 31_337);
        assert_eq!(config.principal_key, PrincipalKeySource::Hex("0x01".to_string()));
        assert_eq!(config.grant_duration_days, 1);
        assert_eq!(config.commit_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn pem_path_wins_over_hex_key() {
        let config = load(&[
            (PRINCIPAL_KEY_PATH_ENV, "/keys/principal.pem"),
            (PRINCIPAL_PRIVATE_KEY_ENV, "0x01"),
        ])
        .unwrap();
        assert_eq!(
            config.principal_key,
            PrincipalKeySource::PemFile(PathBuf::from("/keys/principal.pem"))
        );
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config = load(&[(PORT_ENV, ""), (LEDGER_PATH_ENV, "  ")]).unwrap();
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert!(config.ledger_path.is_none());
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            load(&[(PORT_ENV, "eighty")]),
            Err(ConfigError::Invalid { name: PORT_ENV, .. })
        ));
        assert!(matches!(
            load(&[(REGISTRY_ADDRESS_ENV, "0x1234")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            load(&[(GRANT_DURATION_DAYS_ENV, "0")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            load(&[(LOG_FORMAT_ENV, "xml")]),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn seed_is_parsed_and_never_echoed() {
        let seed = format!("0x{}", "ab".repeat(32));
        let config = load(&[(COPROCESSOR_SEED_ENV, &seed)]).unwrap();
        assert_eq!(config.coprocessor_seed, Some([0xab; 32]));

        let err = load(&[(COPROCESSOR_SEED_ENV, "0xnope")]).unwrap_err();
        assert!(!err.to_string().contains("nope"));
    }

    #[test]
    fn tls_requires_both_paths() {
        assert!(matches!(
            load(&[(TLS_CERT_PATH_ENV, "/tls/cert.pem")]),
            Err(ConfigError::Incomplete { .. })
        ));
        let config = load(&[
            (TLS_CERT_PATH_ENV, "/tls/cert.pem"),
            (TLS_KEY_PATH_ENV, "/tls/key.pem"),
        ])
        .unwrap();
        assert_eq!(config.tls.unwrap().key, PathBuf::from("/tls/key.pem"));
    }
}
