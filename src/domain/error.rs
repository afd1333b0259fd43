//! Domain error types.

/// Top-level error type for vatrader.
#[derive(Debug, thiserror::Error)]
pub enum VatraderError {
    #[error("invalid configuration: {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("arithmetic error: {reason}")]
    Arithmetic { reason: String },

    #[error("failed to persist interval {interval}: {reason}")]
    Persistence { interval: u32, reason: String },

    #[error("ledger state error: {reason}")]
    LedgerState { reason: String },

    #[error("invalid asset symbol {symbol:?}: {reason}")]
    InvalidAsset { symbol: String, reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("bar feed error: {reason}")]
    Feed { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl VatraderError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        VatraderError::InvalidConfiguration {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn arithmetic(reason: impl Into<String>) -> Self {
        VatraderError::Arithmetic {
            reason: reason.into(),
        }
    }
}

impl From<&VatraderError> for std::process::ExitCode {
    fn from(err: &VatraderError) -> Self {
        let code: u8 = match err {
            VatraderError::Io(_) => 1,
            VatraderError::ConfigParse { .. }
            | VatraderError::ConfigMissing { .. }
            | VatraderError::ConfigInvalid { .. }
            | VatraderError::InvalidConfiguration { .. }
            | VatraderError::InvalidAsset { .. } => 2,
            VatraderError::Database { .. }
            | VatraderError::DatabaseQuery { .. }
            | VatraderError::Persistence { .. } => 3,
            VatraderError::Arithmetic { .. } | VatraderError::LedgerState { .. } => 4,
            VatraderError::Feed { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_message_names_interval() {
        let err = VatraderError::Persistence {
            interval: 7,
            reason: "disk full".into(),
        };
        assert_eq!(err.to_string(), "failed to persist interval 7: disk full");
    }

    #[test]
    fn invalid_helper_builds_configuration_error() {
        let err = VatraderError::invalid("frequency", "must be positive");
        assert!(matches!(
            err,
            VatraderError::InvalidConfiguration { ref field, .. } if field == "frequency"
        ));
    }
}
