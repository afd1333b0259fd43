//! Asset identifiers used to key ledgers in a record store.

use crate::domain::error::VatraderError;
use std::fmt;

/// Lower-cased base symbol of a trading pair, e.g. `btc` for `BTC/USD`.
///
/// Only `[a-z0-9._-]` survive validation, so two spellings of the same
/// symbol never map to different ledgers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(String);

impl AssetId {
    pub fn from_symbol(symbol: &str) -> Result<Self, VatraderError> {
        let trimmed = symbol.trim();
        if trimmed.contains(',') {
            return Err(VatraderError::InvalidAsset {
                symbol: symbol.to_string(),
                reason: "expected a single symbol in the form BASE/QUOTE".into(),
            });
        }
        let base = trimmed.split('/').next().unwrap_or_default().trim();
        if base.is_empty() {
            return Err(VatraderError::InvalidAsset {
                symbol: symbol.to_string(),
                reason: "empty base symbol".into(),
            });
        }

        let id = base.to_lowercase();
        if let Some(bad) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(VatraderError::InvalidAsset {
                symbol: symbol.to_string(),
                reason: format!("unsupported character {bad:?}"),
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
