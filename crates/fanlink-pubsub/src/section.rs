use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::debug;

use crate::error::{PubSubError, Result, UpstreamError};
use crate::publication::{Publication, SubscribeOptions};

const NOT_SUBSCRIBED: u8 = 0;
const SUBSCRIBING: u8 = 1;
const SUBSCRIBED: u8 = 2;

/// A local subscriber registered with a topic section.
pub trait TopicSubscriber<M>: Send + Sync {
    /// One publication delivered to this subscriber.
    fn event(&self, publication: &Publication<M>);
}

/// The provider a section subscribes to exactly once per lifetime.
pub trait UpstreamProvider<M>: Send + Sync {
    /// Issue the upstream subscribe request. Publications from the
    /// upstream feed go through `sink`.
    fn subscribe(
        &self,
        sink: SectionSink<M>,
        options: &SubscribeOptions,
        topic: &str,
    ) -> std::result::Result<Box<dyn UpstreamHandle>, UpstreamError>;
}

/// Revocable handle for an established upstream subscription.
pub trait UpstreamHandle: Send {
    /// Revoke the upstream subscription. Called at most once.
    fn unsubscribe(&mut self);
}

/// Single-shot observer the owning registry registers at section creation;
/// told when a revocation removes the section's last subscriber.
pub trait SectionObserver: Send + Sync {
    /// The section has no subscribers left and can be recycled.
    fn section_empty(&self, topic: &str);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

struct Entry<M> {
    id: u64,
    subscriber: Arc<dyn TopicSubscriber<M>>,
}

/// The ordered fan-out set, shared between the section, its subscription
/// handles, and the upstream sink.
struct FanOut<M> {
    topic: String,
    entries: Mutex<Vec<Entry<M>>>,
    next_id: AtomicU64,
    disposed: AtomicBool,
    empty_observer: Option<Arc<dyn SectionObserver>>,
}

impl<M> FanOut<M> {
    fn add(&self, subscriber: Arc<dyn TopicSubscriber<M>>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.entries).push(Entry { id, subscriber });
        id
    }

    /// Remove a registration; the empty notification fires iff this
    /// removal took out the last subscriber. The condition is evaluated
    /// under the lock so concurrent removals produce exactly one firing.
    fn remove(&self, id: u64) {
        let emptied = {
            let mut entries = lock(&self.entries);
            let before = entries.len();
            entries.retain(|entry| entry.id != id);
            before != entries.len() && entries.is_empty()
        };
        if emptied {
            debug!(topic = %self.topic, "section became empty");
            if let Some(observer) = &self.empty_observer {
                observer.section_empty(&self.topic);
            }
        }
    }

    /// Deliver one publication to every registered subscriber.
    ///
    /// The lock is held across the whole broadcast: its acquisition order
    /// fixes the publication order every subscriber observes, and the
    /// iteration order is registration order.
    fn dispatch(&self, publication: &Publication<M>) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        let entries = lock(&self.entries);
        for entry in entries.iter() {
            entry.subscriber.event(publication);
        }
    }

    fn has_subscribers(&self) -> bool {
        !lock(&self.entries).is_empty()
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Marks the fan-out disposed and drops all registrations without
    /// firing the empty notification. Returns true for the first caller.
    fn shutdown(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        lock(&self.entries).clear();
        true
    }
}

/// Where an upstream feed delivers publications for local fan-out.
///
/// Handed to the upstream provider by the winning subscribe call.
pub struct SectionSink<M> {
    fanout: Arc<FanOut<M>>,
}

impl<M> SectionSink<M> {
    /// Fan one publication out to the section's subscribers.
    pub fn publish(&self, publication: &Publication<M>) {
        self.fanout.dispatch(publication);
    }

    /// The topic this sink feeds.
    pub fn topic(&self) -> &str {
        &self.fanout.topic
    }
}

impl<M> Clone for SectionSink<M> {
    fn clone(&self) -> Self {
        Self {
            fanout: Arc::clone(&self.fanout),
        }
    }
}

/// Revocation handle returned by [`TopicSection::subscribe`].
///
/// Revoking (or dropping) it removes the subscriber from the section's
/// fan-out set. Revocation is idempotent.
#[derive(Debug)]
pub struct SubscriptionHandle<M> {
    fanout: Weak<FanOut<M>>,
    id: u64,
    revoked: AtomicBool,
}

impl<M> SubscriptionHandle<M> {
    /// Remove this subscriber from the section.
    pub fn revoke(&self) {
        if self.revoked.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(fanout) = self.fanout.upgrade() {
            fanout.remove(self.id);
        }
    }
}

impl<M> Drop for SubscriptionHandle<M> {
    fn drop(&mut self) {
        self.revoke();
    }
}

/// Per-topic local multiplexer: bridges any number of local subscribers to
/// at most one upstream subscription.
///
/// Created by the owning registry on first interest in a topic and
/// disposed once the registry handles the section-empty notification. A
/// disposed section must never be reused.
pub struct TopicSection<M> {
    topic: String,
    options: SubscribeOptions,
    provider: Arc<dyn UpstreamProvider<M>>,
    fanout: Arc<FanOut<M>>,
    upstream_state: AtomicU8,
    upstream: Mutex<Option<Box<dyn UpstreamHandle>>>,
}

impl<M> TopicSection<M> {
    /// Create a section for `topic`. The registry's `empty_observer` is
    /// told, exactly once per empty transition, when the last subscriber
    /// is removed.
    pub fn new(
        topic: impl Into<String>,
        options: SubscribeOptions,
        provider: Arc<dyn UpstreamProvider<M>>,
        empty_observer: Option<Arc<dyn SectionObserver>>,
    ) -> Self {
        let topic = topic.into();
        Self {
            fanout: Arc::new(FanOut {
                topic: topic.clone(),
                entries: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                disposed: AtomicBool::new(false),
                empty_observer,
            }),
            topic,
            options,
            provider,
            upstream_state: AtomicU8::new(NOT_SUBSCRIBED),
            upstream: Mutex::new(None),
        }
    }

    /// The topic this section multiplexes.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The options this section subscribes upstream with.
    pub fn options(&self) -> &SubscribeOptions {
        &self.options
    }

    /// True iff the local registration set is non-empty.
    pub fn has_subscribers(&self) -> bool {
        self.fanout.has_subscribers()
    }

    /// Register a local subscriber.
    ///
    /// The first-ever subscribe attempt wins an atomic race for the right
    /// to issue the single upstream subscribe request; losers still get a
    /// valid local registration. If the upstream request fails, the
    /// winner's registration is rolled back, the race is re-armed so a
    /// later subscribe can retry, and the failure returns to the winner
    /// only.
    pub fn subscribe(
        &self,
        subscriber: Arc<dyn TopicSubscriber<M>>,
    ) -> Result<SubscriptionHandle<M>> {
        if self.fanout.is_disposed() {
            return Err(PubSubError::SectionDisposed {
                topic: self.topic.clone(),
            });
        }

        let handle = SubscriptionHandle {
            fanout: Arc::downgrade(&self.fanout),
            id: self.fanout.add(subscriber),
            revoked: AtomicBool::new(false),
        };

        if self
            .upstream_state
            .compare_exchange(
                NOT_SUBSCRIBED,
                SUBSCRIBING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            let sink = SectionSink {
                fanout: Arc::clone(&self.fanout),
            };
            match self.provider.subscribe(sink, &self.options, &self.topic) {
                Ok(upstream) => {
                    *lock(&self.upstream) = Some(upstream);
                    self.upstream_state.store(SUBSCRIBED, Ordering::Release);
                    debug!(topic = %self.topic, "upstream subscription established");
                    // Dispose may have raced the store; never hold the
                    // upstream of a disposed section.
                    if self.fanout.is_disposed() {
                        self.release_upstream();
                    }
                }
                Err(err) => {
                    self.upstream_state.store(NOT_SUBSCRIBED, Ordering::Release);
                    handle.revoke();
                    return Err(err.into());
                }
            }
        }

        Ok(handle)
    }

    /// Deliver one publication to every currently registered subscriber,
    /// synchronously, in registration order. No-op after dispose.
    pub fn event(&self, publication: &Publication<M>) {
        self.fanout.dispatch(publication);
    }

    /// Release the fan-out set and any held upstream subscription.
    /// Idempotent; the upstream handle is revoked at most once.
    pub fn dispose(&self) {
        if !self.fanout.shutdown() {
            return;
        }
        self.release_upstream();
        debug!(topic = %self.topic, "section disposed");
    }

    fn release_upstream(&self) {
        if let Some(mut upstream) = lock(&self.upstream).take() {
            upstream.unsubscribe();
        }
    }
}
