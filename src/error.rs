use thiserror::Error;

pub type Result<T> = std::result::Result<T, RiskIntelError>;

#[derive(Debug, Error)]
pub enum RiskIntelError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("missing domain in URL")]
    MissingDomain,

    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("lookup failed for {target}: {reason}")]
    Lookup { target: String, reason: String },

    #[error("storage error during {operation}: {reason}")]
    Storage { operation: String, reason: String },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl RiskIntelError {
    pub fn fetch_error(url: &str, reason: &str) -> Self {
        Self::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn lookup_error(target: &str, reason: &str) -> Self {
        Self::Lookup {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn storage_error(operation: &str, reason: &str) -> Self {
        Self::Storage {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn validation_error(field: &str, reason: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

/* Conversions so `?` works smoothly */
impl From<std::io::Error> for RiskIntelError {
    fn from(e: std::io::Error) -> Self {
        RiskIntelError::Other(e.to_string())
    }
}
impl From<serde_json::Error> for RiskIntelError {
    fn from(e: serde_json::Error) -> Self {
        RiskIntelError::Other(e.to_string())
    }
}
impl From<reqwest::Error> for RiskIntelError {
    fn from(e: reqwest::Error) -> Self {
        RiskIntelError::Other(e.to_string())
    }
}
