//! Configuration loading and representation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use quickship_shipping::ShipmentOptions;

pub const DATABASE_URL_VAR: &str = "QUICKSHIP_DATABASE_URL";
pub const DEFAULT_SOURCE_VAR: &str = "QUICKSHIP_DEFAULT_SOURCE";
pub const SKIP_INVENTORY_DEDUCTION_VAR: &str = "QUICKSHIP_SKIP_INVENTORY_DEDUCTION";
pub const FORCE_FALLBACK_VAR: &str = "QUICKSHIP_FORCE_FALLBACK";

/// Source an unmatched shipment is recorded against when nothing is deducted.
pub const DEFAULT_SOURCE_CODE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} must be a boolean (1/0/true/false/yes/no), got '{value}'")]
    InvalidBool { var: String, value: String },

    #[error("{var} must not be empty")]
    Empty { var: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfraConfig {
    /// Postgres connection string; `None` means in-memory persistence.
    pub database_url: Option<String>,
    pub default_source: String,
    pub skip_inventory_deduction: bool,
    pub force_fallback: bool,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            default_source: DEFAULT_SOURCE_CODE.to_string(),
            skip_inventory_deduction: false,
            force_fallback: false,
        }
    }
}

impl InfraConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (process env, a map in tests, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup(DATABASE_URL_VAR).filter(|v| !v.trim().is_empty());

        let default_source = match lookup(DEFAULT_SOURCE_VAR) {
            None => DEFAULT_SOURCE_CODE.to_string(),
            Some(v) if v.trim().is_empty() => {
                return Err(ConfigError::Empty {
                    var: DEFAULT_SOURCE_VAR.to_string(),
                });
            }
            Some(v) => v.trim().to_string(),
        };

        let skip_inventory_deduction = parse_bool(
            SKIP_INVENTORY_DEDUCTION_VAR,
            lookup(SKIP_INVENTORY_DEDUCTION_VAR),
        )?;
        let force_fallback = parse_bool(FORCE_FALLBACK_VAR, lookup(FORCE_FALLBACK_VAR))?;

        Ok(Self {
            database_url,
            default_source,
            skip_inventory_deduction,
            force_fallback,
        })
    }

    pub fn shipment_options(&self) -> ShipmentOptions {
        ShipmentOptions {
            skip_inventory_deduction: self.skip_inventory_deduction,
            force_fallback: self.force_fallback,
        }
    }
}

fn parse_bool(var: &str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(raw) = value else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" => Ok(false),
        "1" | "true" | "yes" => Ok(true),
        _ => Err(ConfigError::InvalidBool {
            var: var.to_string(),
            value: raw,
        }),
    }
}
