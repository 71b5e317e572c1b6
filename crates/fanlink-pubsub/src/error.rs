/// The upstream provider's subscribe request failed.
///
/// Surfaced only to the subscribe call that won the upstream race.
#[derive(Debug, thiserror::Error)]
#[error("upstream subscribe failed for {topic}: {reason}")]
pub struct UpstreamError {
    topic: String,
    reason: String,
}

impl UpstreamError {
    /// Create an upstream failure for `topic`.
    pub fn new(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// The topic whose upstream subscribe failed.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Errors that can occur in topic section operations.
#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    /// The section was disposed by its owning registry.
    #[error("section for topic {topic} is disposed")]
    SectionDisposed { topic: String },

    /// The upstream subscribe request failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

pub type Result<T> = std::result::Result<T, PubSubError>;
