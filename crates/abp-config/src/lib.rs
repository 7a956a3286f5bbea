// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for the Solace gateway.
//!
//! This crate provides [`GatewayConfig`] — the top-level runtime settings —
//! together with helpers for loading from TOML, applying environment
//! overrides, merging overlays, and fail-fast validation. The gateway must
//! not serve traffic in a partially-configured state, so [`validate_config`]
//! is run once at startup and any error aborts the process.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while loading or validating a [`GatewayConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },
    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },
    /// `adapterId` was missing or empty.
    #[error("adapterId must be set and non-empty")]
    MissingAdapterId,
    /// `receiptPrivateKeyPem` and/or `receiptPublicKeyPem` were missing.
    #[error("receiptPrivateKeyPem and receiptPublicKeyPem must both be set")]
    MissingReceiptKeyPair,
    /// `core.coreBaseUrl` was missing or empty.
    #[error("core.coreBaseUrl must be set and non-empty")]
    MissingCoreUrl,
    /// `targets` had no entries.
    #[error("targets must contain at least one entry")]
    EmptyTargetTable,
    /// One or more other semantic checks failed.
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
    /// Two configs could not be merged because of conflicting constraints.
    #[error("merge conflict: {reason}")]
    MergeConflict {
        /// Description of the conflict.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent startup but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// `core.timeoutMs` is unusually large.
    LargeCoreTimeout {
        /// The configured timeout, in milliseconds.
        timeout_ms: u64,
    },
    /// `receiptTtlSeconds` is unusually large for a short-lived receipt.
    LargeReceiptTtl {
        /// The configured TTL, in seconds.
        ttl_seconds: i64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LargeCoreTimeout { timeout_ms } => {
                write!(f, "core.timeoutMs is unusually large ({timeout_ms}ms)")
            }
            Self::LargeReceiptTtl { ttl_seconds } => {
                write!(f, "receiptTtlSeconds is unusually large ({ttl_seconds}s)")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level runtime configuration for the Solace gateway.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Stable identity of this gateway deployment.
    #[serde(default)]
    pub adapter_id: String,
    /// Ed25519 PKCS8 PEM used to sign receipts.
    #[serde(default)]
    pub receipt_private_key_pem: String,
    /// Ed25519 SPKI PEM, for self-check and distribution to Executors.
    #[serde(default)]
    pub receipt_public_key_pem: String,
    /// Receipt validity window length, in seconds.
    #[serde(default = "default_receipt_ttl_seconds")]
    pub receipt_ttl_seconds: i64,
    /// Clock skew tolerance applied symmetrically at verification.
    #[serde(default = "default_clock_skew_seconds")]
    pub clock_skew_seconds: i64,
    /// Settings for talking to the external Core decision service.
    #[serde(default)]
    pub core: CoreClientSettings,
    /// Static routing table: service name to Executor target.
    #[serde(default)]
    pub targets: BTreeMap<String, TargetEntry>,
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"info"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Settings for the Core Client (`abp-core-client`).
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CoreClientSettings {
    /// Base URL of the Core decision service, e.g. `https://core.internal`.
    #[serde(default)]
    pub core_base_url: String,
    /// Per-call deadline, in milliseconds.
    #[serde(default = "default_core_timeout_ms")]
    pub timeout_ms: u64,
    /// Static headers merged onto every request to Core.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// A single entry in the static routing table.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetEntry {
    /// URL the Forwarder POSTs to.
    pub url: String,
    /// Optional bearer token sent as `Authorization: Bearer <token>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
}

fn default_receipt_ttl_seconds() -> i64 {
    30
}

fn default_clock_skew_seconds() -> i64 {
    10
}

fn default_core_timeout_ms() -> u64 {
    8_000
}

fn default_bind() -> String {
    "127.0.0.1:8088".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const LARGE_CORE_TIMEOUT_MS_THRESHOLD: u64 = 60_000;
const LARGE_RECEIPT_TTL_SECONDS_THRESHOLD: i64 = 3_600;
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`GatewayConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, starts from [`GatewayConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases. The
/// result is **not** validated; call [`validate_config`] before serving
/// traffic.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => GatewayConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`GatewayConfig`].
pub fn parse_toml(content: &str) -> Result<GatewayConfig, ConfigError> {
    toml::from_str::<GatewayConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables:
/// - `ABP_GW_ADAPTER_ID`
/// - `ABP_GW_RECEIPT_PRIVATE_KEY_PEM`
/// - `ABP_GW_RECEIPT_PUBLIC_KEY_PEM`
/// - `ABP_GW_RECEIPT_TTL_SECONDS`
/// - `ABP_GW_CLOCK_SKEW_SECONDS`
/// - `ABP_GW_CORE_URL`
/// - `ABP_GW_BIND`
/// - `ABP_GW_LOG_LEVEL`
pub fn apply_env_overrides(config: &mut GatewayConfig) {
    if let Ok(val) = std::env::var("ABP_GW_ADAPTER_ID") {
        config.adapter_id = val;
    }
    if let Ok(val) = std::env::var("ABP_GW_RECEIPT_PRIVATE_KEY_PEM") {
        config.receipt_private_key_pem = val;
    }
    if let Ok(val) = std::env::var("ABP_GW_RECEIPT_PUBLIC_KEY_PEM") {
        config.receipt_public_key_pem = val;
    }
    if let Ok(val) = std::env::var("ABP_GW_RECEIPT_TTL_SECONDS") {
        if let Ok(parsed) = val.parse() {
            config.receipt_ttl_seconds = parsed;
        }
    }
    if let Ok(val) = std::env::var("ABP_GW_CLOCK_SKEW_SECONDS") {
        if let Ok(parsed) = val.parse() {
            config.clock_skew_seconds = parsed;
        }
    }
    if let Ok(val) = std::env::var("ABP_GW_CORE_URL") {
        config.core.core_base_url = val;
    }
    if let Ok(val) = std::env::var("ABP_GW_BIND") {
        config.bind = val;
    }
    if let Ok(val) = std::env::var("ABP_GW_LOG_LEVEL") {
        config.log_level = val;
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (missing identity, missing keys, missing Core URL, empty
/// target table, out-of-range numeric fields) are returned as the specific
/// [`ConfigError`] variant; soft issues come back as [`ConfigWarning`]s.
pub fn validate_config(config: &GatewayConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    if config.adapter_id.trim().is_empty() {
        return Err(ConfigError::MissingAdapterId);
    }
    if config.receipt_private_key_pem.trim().is_empty()
        || config.receipt_public_key_pem.trim().is_empty()
    {
        return Err(ConfigError::MissingReceiptKeyPair);
    }
    if config.core.core_base_url.trim().is_empty() {
        return Err(ConfigError::MissingCoreUrl);
    }
    if config.targets.is_empty() {
        return Err(ConfigError::EmptyTargetTable);
    }

    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if config.receipt_ttl_seconds <= 0 {
        errors.push(format!(
            "receiptTtlSeconds must be positive, got {}",
            config.receipt_ttl_seconds
        ));
    } else if config.receipt_ttl_seconds > LARGE_RECEIPT_TTL_SECONDS_THRESHOLD {
        warnings.push(ConfigWarning::LargeReceiptTtl {
            ttl_seconds: config.receipt_ttl_seconds,
        });
    }

    if config.clock_skew_seconds < 0 {
        errors.push(format!(
            "clockSkewSeconds must not be negative, got {}",
            config.clock_skew_seconds
        ));
    }

    if config.core.timeout_ms == 0 {
        errors.push("core.timeoutMs must be positive".to_string());
    } else if config.core.timeout_ms > LARGE_CORE_TIMEOUT_MS_THRESHOLD {
        warnings.push(ConfigWarning::LargeCoreTimeout {
            timeout_ms: config.core.timeout_ms,
        });
    }

    if !VALID_LOG_LEVELS.contains(&config.log_level.as_str()) {
        errors.push(format!("invalid log_level '{}'", config.log_level));
    }

    for (name, target) in &config.targets {
        if name.trim().is_empty() {
            errors.push("target service name must not be empty".to_string());
        }
        if target.url.trim().is_empty() {
            errors.push(format!("target '{name}': url must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values in `overlay` take precedence over `base`.
///
/// `targets` and `core.headers` are combined; on key collisions the overlay
/// entry wins.
pub fn merge_configs(base: GatewayConfig, overlay: GatewayConfig) -> GatewayConfig {
    let mut targets = base.targets;
    targets.extend(overlay.targets);

    let mut headers = base.core.headers;
    headers.extend(overlay.core.headers);

    let core_base_url = if overlay.core.core_base_url.is_empty() {
        base.core.core_base_url
    } else {
        overlay.core.core_base_url
    };
    let timeout_ms = if overlay.core.timeout_ms == default_core_timeout_ms() {
        base.core.timeout_ms
    } else {
        overlay.core.timeout_ms
    };

    GatewayConfig {
        adapter_id: pick(overlay.adapter_id, base.adapter_id),
        receipt_private_key_pem: pick(
            overlay.receipt_private_key_pem,
            base.receipt_private_key_pem,
        ),
        receipt_public_key_pem: pick(overlay.receipt_public_key_pem, base.receipt_public_key_pem),
        receipt_ttl_seconds: if overlay.receipt_ttl_seconds == default_receipt_ttl_seconds() {
            base.receipt_ttl_seconds
        } else {
            overlay.receipt_ttl_seconds
        },
        clock_skew_seconds: if overlay.clock_skew_seconds == default_clock_skew_seconds() {
            base.clock_skew_seconds
        } else {
            overlay.clock_skew_seconds
        },
        core: CoreClientSettings {
            core_base_url,
            timeout_ms,
            headers,
        },
        targets,
        bind: if overlay.bind == default_bind() {
            base.bind
        } else {
            overlay.bind
        },
        log_level: if overlay.log_level == default_log_level() {
            base.log_level
        } else {
            overlay.log_level
        },
    }
}

fn pick(overlay: String, base: String) -> String {
    if overlay.is_empty() {
        base
    } else {
        overlay
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> GatewayConfig {
        let mut targets = BTreeMap::new();
        targets.insert(
            "payments".to_string(),
            TargetEntry {
                url: "https://executor.example/payments".to_string(),
                bearer_token: None,
            },
        );
        GatewayConfig {
            adapter_id: "gw-1".to_string(),
            receipt_private_key_pem: "PRIVATE".to_string(),
            receipt_public_key_pem: "PUBLIC".to_string(),
            core: CoreClientSettings {
                core_base_url: "https://core.internal".to_string(),
                ..Default::default()
            },
            targets,
            ..Default::default()
        }
    }

    #[test]
    fn valid_config_passes_with_no_warnings() {
        let warnings = validate_config(&valid_config()).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn missing_adapter_id_fails_fast() {
        let mut cfg = valid_config();
        cfg.adapter_id = String::new();
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::MissingAdapterId)
        ));
    }

    #[test]
    fn missing_receipt_keys_fails_fast() {
        let mut cfg = valid_config();
        cfg.receipt_public_key_pem = String::new();
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::MissingReceiptKeyPair)
        ));
    }

    #[test]
    fn missing_core_url_fails_fast() {
        let mut cfg = valid_config();
        cfg.core.core_base_url = String::new();
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::MissingCoreUrl)
        ));
    }

    #[test]
    fn empty_target_table_fails_fast() {
        let mut cfg = valid_config();
        cfg.targets.clear();
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::EmptyTargetTable)
        ));
    }

    #[test]
    fn negative_clock_skew_is_a_validation_error() {
        let mut cfg = valid_config();
        cfg.clock_skew_seconds = -1;
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn large_receipt_ttl_is_a_warning_not_an_error() {
        let mut cfg = valid_config();
        cfg.receipt_ttl_seconds = LARGE_RECEIPT_TTL_SECONDS_THRESHOLD + 1;
        let warnings = validate_config(&cfg).unwrap();
        assert!(warnings.contains(&ConfigWarning::LargeReceiptTtl {
            ttl_seconds: cfg.receipt_ttl_seconds
        }));
    }

    #[test]
    fn parses_minimal_toml() {
        let toml_src = r#"
            adapterId = "gw-1"
            receiptPrivateKeyPem = "PRIVATE"
            receiptPublicKeyPem = "PUBLIC"

            [core]
            coreBaseUrl = "https://core.internal"

            [targets.payments]
            url = "https://executor.example/payments"
        "#;
        let cfg = parse_toml(toml_src).unwrap();
        assert_eq!(cfg.adapter_id, "gw-1");
        assert_eq!(cfg.receipt_ttl_seconds, 30);
        assert_eq!(cfg.clock_skew_seconds, 10);
        assert_eq!(cfg.core.timeout_ms, 8_000);
        assert_eq!(
            cfg.targets["payments"].url,
            "https://executor.example/payments"
        );
        assert!(validate_config(&cfg).unwrap().is_empty());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            parse_toml("not = [valid"),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn overlay_wins_on_merge_and_maps_combine() {
        let base = valid_config();
        let mut overlay = GatewayConfig::default();
        overlay.log_level = "debug".to_string();
        overlay.targets.insert(
            "mail".to_string(),
            TargetEntry {
                url: "https://executor.example/mail".to_string(),
                bearer_token: None,
            },
        );

        let merged = merge_configs(base, overlay);
        assert_eq!(merged.log_level, "debug");
        assert_eq!(merged.adapter_id, "gw-1");
        assert_eq!(merged.targets.len(), 2);
    }

    #[test]
    fn missing_file_is_reported() {
        let result = load_config(Some(Path::new("/nonexistent/gateway.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn loads_from_an_actual_file_on_disk() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            adapterId = "gw-1"
            receiptPrivateKeyPem = "PRIVATE"
            receiptPublicKeyPem = "PUBLIC"

            [core]
            coreBaseUrl = "https://core.internal"

            [targets.payments]
            url = "https://executor.example/payments"
            "#
        )
        .unwrap();

        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.adapter_id, "gw-1");
        assert!(validate_config(&cfg).is_ok());
    }
}
