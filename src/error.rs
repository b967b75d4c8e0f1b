use std::path::PathBuf;

use thiserror::Error;

/// Application result type.
pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("could not read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("provider '{0}' not found in configuration")]
    ProviderNotFound(String),

    #[error("model '{model}' not found for provider '{provider}'")]
    ModelNotFound { provider: String, model: String },

    #[error("remote call failed: {0}")]
    RemoteCall(String),

    #[error("I/O error while {operation} at {path}: {source}")]
    Persistence {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode conversation at {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no conversation found at {path}")]
    NotFound { path: PathBuf },
}

impl AppError {
    #[must_use]
    pub fn persistence(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Persistence {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Only configuration problems are allowed to end the process.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigRead { .. } | Self::ConfigParse { .. } | Self::ConfigInvalid(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_config_errors_are_fatal() {
        assert!(AppError::ConfigInvalid("no providers".into()).is_fatal());
        assert!(!AppError::RemoteCall("timeout".into()).is_fatal());
        assert!(!AppError::ProviderNotFound("groq".into()).is_fatal());
        assert!(!AppError::NotFound {
            path: PathBuf::from("/tmp/x.json")
        }
        .is_fatal());
    }
}
