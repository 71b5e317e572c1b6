use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Delivery details attached to a publication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    /// The session id of the publisher, when disclosed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<u64>,

    /// The concrete topic, when it differs from the subscribed one
    /// (pattern-based subscriptions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

/// Options a section subscribes upstream with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscribeOptions {
    /// Topic matching policy ("exact", "prefix", "wildcard").
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_policy: Option<String>,
}

/// One event-delivery instance, fanned out to every local subscriber.
///
/// The publication id is caller-assigned and opaque to this layer. `M` is
/// the raw argument representation the wire codec produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Publication<M> {
    /// Caller-assigned publication id.
    pub publication_id: u64,
    /// Delivery details.
    pub details: EventDetails,
    /// Optional positional arguments.
    pub arguments: Option<Vec<M>>,
    /// Optional named arguments.
    pub arguments_keywords: Option<BTreeMap<String, M>>,
}

impl<M> Publication<M> {
    /// Create a publication with no arguments.
    pub fn new(publication_id: u64, details: EventDetails) -> Self {
        Self {
            publication_id,
            details,
            arguments: None,
            arguments_keywords: None,
        }
    }

    /// Attach positional arguments.
    pub fn with_arguments(mut self, arguments: Vec<M>) -> Self {
        self.arguments = Some(arguments);
        self
    }

    /// Attach named arguments.
    pub fn with_keywords(mut self, keywords: BTreeMap<String, M>) -> Self {
        self.arguments_keywords = Some(keywords);
        self
    }
}
