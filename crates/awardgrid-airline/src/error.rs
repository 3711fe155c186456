use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Failure of one search operation against an airline site.
///
/// The sub-kinds exist for logging and diagnostics; the retry machinery
/// treats them uniformly.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("result extraction failed: {0}")]
    Extraction(String),

    #[error("anti-automation challenge detected: {0}")]
    AntiAutomation(String),
}

/// Errors loading or validating airline definitions.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to parse airline definition TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid definition for {airline}: {reason}")]
    Invalid { airline: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScrapeError::Timeout("search results".to_string());
        assert_eq!(err.to_string(), "timed out waiting for search results");

        let err = DefinitionError::Invalid {
            airline: "british-airways".to_string(),
            reason: "no price selectors".to_string(),
        };
        assert!(err.to_string().contains("british-airways"));
        assert!(err.to_string().contains("no price selectors"));
    }
}
