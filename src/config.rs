use serde::{Deserialize, Serialize};

use crate::billing::BillingError;
use crate::error::{LedgerError, Result};
use crate::utils::{get_env_with_prefix, parse_bool_flag};
use crate::vietqr::{self, VietQrRequest};

#[cfg(feature = "database")]
use crate::database::DatabaseConfig;

/// Main configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[cfg(feature = "database")]
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub vietqr: VietQrConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

/// Receiving bank account for VietQR payment payloads.
///
/// Payloads can only be built once both `bank_bin` and `account_number` are
/// set.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VietQrConfig {
    /// Six-digit BIN of the receiving bank (e.g. 970436).
    #[serde(default)]
    pub bank_bin: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    /// Display name of the bank. Not encoded.
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
    /// Falls back to `account_name`, then to the default merchant name.
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub merchant_city: Option<String>,
    #[serde(default = "default_service_code")]
    pub service_code: String,
}

fn default_service_code() -> String {
    vietqr::SERVICE_CODE_TO_ACCOUNT.to_string()
}

impl Default for VietQrConfig {
    fn default() -> Self {
        Self {
            bank_bin: None,
            account_number: None,
            bank_name: None,
            account_name: None,
            merchant_name: None,
            merchant_city: None,
            service_code: default_service_code(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl VietQrConfig {
    /// Whether a receiving account is set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        non_blank(&self.bank_bin).is_some() && non_blank(&self.account_number).is_some()
    }

    /// Start a payload request for the configured account.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::MissingPayee`] when the account is not set.
    pub fn request(&self, amount_vnd: u64, order_id: Option<&str>) -> Result<VietQrRequest> {
        let (Some(bank_bin), Some(account_number)) =
            (non_blank(&self.bank_bin), non_blank(&self.account_number))
        else {
            return Err(BillingError::MissingPayee.into());
        };

        let account_name = non_blank(&self.account_name).unwrap_or_default();
        let merchant_name = non_blank(&self.merchant_name)
            .or(non_blank(&self.account_name))
            .unwrap_or(vietqr::DEFAULT_MERCHANT_NAME);
        let merchant_city =
            non_blank(&self.merchant_city).unwrap_or(vietqr::DEFAULT_MERCHANT_CITY);

        let mut request = VietQrRequest::new(bank_bin, account_number)
            .with_amount_vnd(amount_vnd)
            .with_account_name(account_name)
            .with_merchant_name(merchant_name)
            .with_merchant_city(merchant_city)
            .with_service_code(self.service_code.trim());
        if let Some(order_id) = order_id {
            request = request.with_order_id(order_id);
        }
        Ok(request)
    }

    /// Read `VIETQR_*` variables (with optional `DOGAI_` prefix).
    pub fn from_env() -> Self {
        Self {
            bank_bin: get_env_with_prefix("VIETQR_BANK_BIN"),
            account_number: get_env_with_prefix("VIETQR_ACCOUNT_NUMBER"),
            bank_name: get_env_with_prefix("VIETQR_BANK_NAME"),
            account_name: get_env_with_prefix("VIETQR_ACCOUNT_NAME"),
            merchant_name: get_env_with_prefix("VIETQR_MERCHANT_NAME"),
            merchant_city: get_env_with_prefix("VIETQR_MERCHANT_CITY"),
            service_code: get_env_with_prefix("VIETQR_SERVICE_CODE")
                .unwrap_or_else(default_service_code),
        }
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    #[cfg(feature = "database")]
    pub fn with_database(mut self, database: DatabaseConfig) -> Self {
        self.config.database = database;
        self
    }

    #[cfg(feature = "database")]
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database.url = url.into();
        self
    }

    pub fn with_vietqr(mut self, vietqr: VietQrConfig) -> Self {
        self.config.vietqr = vietqr;
        self
    }

    /// Set the receiving account for payment QR codes.
    pub fn with_payee(
        mut self,
        bank_bin: impl Into<String>,
        account_number: impl Into<String>,
    ) -> Self {
        self.config.vietqr.bank_bin = Some(bank_bin.into());
        self.config.vietqr.account_number = Some(account_number.into());
        self
    }

    pub fn with_merchant(
        mut self,
        merchant_name: impl Into<String>,
        merchant_city: impl Into<String>,
    ) -> Self {
        self.config.vietqr.merchant_name = Some(merchant_name.into());
        self.config.vietqr.merchant_city = Some(merchant_city.into());
        self
    }

    /// Load configuration from environment variables with DOGAI_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = parse_bool_flag(&json).unwrap_or(false);
        }

        #[cfg(feature = "database")]
        {
            if let Some(database) = DatabaseConfig::from_env() {
                self.config.database = database;
            } else {
                self.config.database = self.config.database.with_env_overrides();
            }
        }

        self.config.vietqr = VietQrConfig::from_env();

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns a validation error if:
    /// - The log level is not one of trace/debug/info/warn/error
    /// - A configured bank BIN is not six digits
    /// - The database pool has zero max connections or min > max
    pub fn build(self) -> Result<Config> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(LedgerError::validation(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if let Some(bin) = non_blank(&self.config.vietqr.bank_bin) {
            vietqr::validate_bank_bin(bin)?;
        }

        #[cfg(feature = "database")]
        {
            let db = &self.config.database;
            if db.max_connections == 0 {
                return Err(LedgerError::validation(
                    "Database max_connections must be greater than 0",
                ));
            }
            if db.min_connections > db.max_connections {
                return Err(LedgerError::validation(format!(
                    "Database min_connections ({}) exceeds max_connections ({})",
                    db.min_connections, db.max_connections
                )));
            }
            tracing::debug!(url = %db.redacted_url(), "Database configured");
        }

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
