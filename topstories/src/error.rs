use thiserror::Error;

/// Failures surfaced by sources, the registry and the story service.
///
/// The service never rewraps these: whatever a source reports reaches the caller unchanged.
#[derive(Error, Debug)]
pub enum StoryError {
    /// Unknown or sentinel source identifier. Caller error, not retriable.
    #[error("source '{0}' is not supported")]
    UnsupportedSource(String),

    /// Transport-level failure (connect, timeout, 5xx, rate limit).
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Upstream rejected our credentials.
    #[error("upstream rejected credentials: {0}")]
    UpstreamAuth(String),

    /// Body did not match the expected schema or a timestamp failed to parse.
    #[error("upstream response malformed: {0}")]
    UpstreamMalformed(String),
}

impl StoryError {
    /// Only transport failures are worth retrying.
    pub fn is_retriable(&self) -> bool {
        matches!(self, StoryError::UpstreamUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, StoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_retriable() {
        assert!(StoryError::UpstreamUnavailable("timeout".into()).is_retriable());
        assert!(!StoryError::UpstreamAuth("401".into()).is_retriable());
        assert!(!StoryError::UpstreamMalformed("bad json".into()).is_retriable());
        assert!(!StoryError::UnsupportedSource("none".into()).is_retriable());
    }

    #[test]
    fn unsupported_source_names_identifier() {
        let err = StoryError::UnsupportedSource("none".into());
        assert_eq!(err.to_string(), "source 'none' is not supported");
    }
}
