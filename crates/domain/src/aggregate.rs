//! Core aggregate and domain event traits.

use chrono::{DateTime, Utc};
use common::EventId;
use order_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events record facts that already happened. They are immutable and
/// named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name, e.g. `order.created`.
    fn event_type(&self) -> &'static str;

    fn event_id(&self) -> EventId;

    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Trait for state-based aggregates.
///
/// An aggregate guards its own invariants: state only changes through its
/// behavior methods, and each change records a domain event in a transient
/// buffer. The buffer is not persisted; whoever saves the aggregate drains it
/// with [`Aggregate::take_events`] and hands the events to a publisher.
pub trait Aggregate: Send + Sync + Sized {
    type Id: Copy + std::fmt::Display + Send + Sync;

    /// The type of events this aggregate produces.
    type Event: DomainEvent;

    /// The type of errors its behavior methods can produce.
    type Error: std::error::Error + Send + Sync;

    fn id(&self) -> Self::Id;

    /// Persistence version the aggregate was loaded at, `Version::initial()`
    /// if it was never saved.
    fn version(&self) -> Version;

    /// Called by the command handler after a successful save.
    fn set_version(&mut self, version: Version);

    /// Events recorded since the last drain, oldest first.
    fn pending_events(&self) -> &[Self::Event];

    /// Moves the pending events out, leaving the buffer empty.
    fn take_events(&mut self) -> Vec<Self::Event>;

    fn has_pending_events(&self) -> bool {
        !self.pending_events().is_empty()
    }
}
