//! Strategy configuration and validation.
//!
//! Values are read from the `[strategy]` section of a [`ConfigPort`]. Bad values
//! are reported, never replaced with a default.

use crate::domain::error::VatraderError;
use crate::domain::rounding::{parse_decimal, round, MAX_PRECISION};
use crate::ports::config_port::ConfigPort;
use rust_decimal::Decimal;

pub const DEFAULT_BASE_PRECISION: u32 = 8;
pub const DEFAULT_QUOTE_PRECISION: u32 = 2;
pub const DEFAULT_FREQUENCY: u32 = 365;
pub const DEFAULT_EXCHANGE: &str = "paper";

const SECTION: &str = "strategy";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyConfig {
    /// Currency committed at the first interval.
    pub principal_amount: Decimal,
    /// Annualised growth rate of the target, e.g. `0.10`.
    ///
    /// Kept at full precision. Ledgers that rounded the rate to quote
    /// precision first will diverge: `0.075` targets `20.25` at interval 2
    /// here but `20.27` when the rate was rounded to `0.08`.
    pub interest_rate: Decimal,
    /// Compounding periods per year.
    pub frequency: u32,
    /// Fractional digits kept on asset quantities.
    pub base_precision: u32,
    /// Fractional digits kept on currency amounts.
    pub quote_precision: u32,
    pub starting_interval: u32,
    /// Venue tag written on every record.
    pub exchange: String,
}

impl StrategyConfig {
    pub fn new(principal_amount: Decimal, interest_rate: Decimal, frequency: u32) -> Self {
        Self {
            principal_amount,
            interest_rate,
            frequency,
            base_precision: DEFAULT_BASE_PRECISION,
            quote_precision: DEFAULT_QUOTE_PRECISION,
            starting_interval: 1,
            exchange: DEFAULT_EXCHANGE.to_string(),
        }
    }

    pub fn with_precision(mut self, base_precision: u32, quote_precision: u32) -> Self {
        self.base_precision = base_precision;
        self.quote_precision = quote_precision;
        self
    }

    pub fn with_starting_interval(mut self, interval: u32) -> Self {
        self.starting_interval = interval;
        self
    }

    pub fn with_exchange(mut self, exchange: &str) -> Self {
        self.exchange = exchange.to_string();
        self
    }

    pub fn validate(&self) -> Result<(), VatraderError> {
        if self.principal_amount <= Decimal::ZERO {
            return Err(VatraderError::invalid(
                "principal_amount",
                "principal_amount must be positive",
            ));
        }
        if round(self.principal_amount, self.quote_precision.min(MAX_PRECISION)).is_zero() {
            return Err(VatraderError::invalid(
                "principal_amount",
                "principal_amount rounds to zero at quote precision",
            ));
        }
        if self.interest_rate.is_sign_negative() && !self.interest_rate.is_zero() {
            return Err(VatraderError::invalid(
                "interest_rate",
                "interest_rate must be non-negative",
            ));
        }
        if self.frequency == 0 {
            return Err(VatraderError::invalid(
                "frequency",
                "frequency must be positive",
            ));
        }
        if self.starting_interval == 0 {
            return Err(VatraderError::invalid(
                "starting_interval",
                "starting_interval must be at least 1",
            ));
        }
        for (field, value) in [
            ("base_precision", self.base_precision),
            ("quote_precision", self.quote_precision),
        ] {
            if value > MAX_PRECISION {
                return Err(VatraderError::invalid(
                    field,
                    format!("{field} must be at most {MAX_PRECISION}"),
                ));
            }
        }
        if self.exchange.trim().is_empty() {
            return Err(VatraderError::invalid("exchange", "exchange must not be empty"));
        }
        Ok(())
    }
}

/// Build and validate a [`StrategyConfig`] from the `[strategy]` section.
pub fn build_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, VatraderError> {
    let principal_amount = required_decimal(config, "principal_amount")?;
    let interest_rate = required_decimal(config, "interest_rate")?;

    let built = StrategyConfig {
        principal_amount,
        interest_rate,
        frequency: optional_u32(config, "frequency", DEFAULT_FREQUENCY)?,
        base_precision: optional_u32(config, "base_precision", DEFAULT_BASE_PRECISION)?,
        quote_precision: optional_u32(config, "quote_precision", DEFAULT_QUOTE_PRECISION)?,
        starting_interval: optional_u32(config, "starting_interval", 1)?,
        exchange: config
            .get_string(SECTION, "exchange")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_EXCHANGE.to_string()),
    };

    built.validate().map_err(|e| match e {
        VatraderError::InvalidConfiguration { field, reason } => VatraderError::ConfigInvalid {
            section: SECTION.to_string(),
            key: field,
            reason,
        },
        other => other,
    })?;
    Ok(built)
}

fn required_decimal(config: &dyn ConfigPort, key: &str) -> Result<Decimal, VatraderError> {
    let raw = config
        .get_string(SECTION, key)
        .ok_or_else(|| VatraderError::ConfigMissing {
            section: SECTION.to_string(),
            key: key.to_string(),
        })?;
    parse_decimal(&raw).map_err(|_| VatraderError::ConfigInvalid {
        section: SECTION.to_string(),
        key: key.to_string(),
        reason: format!("{raw:?} is not a decimal number"),
    })
}

fn optional_u32(config: &dyn ConfigPort, key: &str, default: u32) -> Result<u32, VatraderError> {
    match config.get_string(SECTION, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<u32>().map_err(|_| VatraderError::ConfigInvalid {
            section: SECTION.to_string(),
            key: key.to_string(),
            reason: format!("{raw:?} is not a non-negative integer"),
        }),
    }
}
