//! Per-topic subscription multiplexing for fanlink.
//!
//! A [`TopicSection`] bridges any number of local subscribers to at most
//! one upstream subscription: the first subscriber to win an atomic race
//! issues the single upstream subscribe request, and every publication is
//! fanned out synchronously to all registered subscribers in registration
//! order. When a revocation removes the last subscriber, the owning
//! registry is told exactly once so it can recycle the section.

pub mod error;
pub mod publication;
pub mod section;

pub use error::{PubSubError, Result, UpstreamError};
pub use publication::{EventDetails, Publication, SubscribeOptions};
pub use section::{
    SectionObserver, SectionSink, SubscriptionHandle, TopicSection, TopicSubscriber,
    UpstreamHandle, UpstreamProvider,
};
