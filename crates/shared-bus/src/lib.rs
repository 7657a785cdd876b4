//! # Shared Bus - Chain Event Bus
//!
//! A minimal in-process publish/subscribe facility that decouples the ledger
//! core from transaction-pool, UI and network-layer consumers.
//!
//! ```text
//! ┌──────────────┐   publish()   ┌──────────────┐   subscribe()   ┌──────────────┐
//! │ Chain / Net  │ ────────────→ │  Event Bus   │ ──────────────→ │  Handlers    │
//! └──────────────┘               └──────────────┘                 └──────────────┘
//! ```
//!
//! ## Topics
//!
//! `BlockAdded` is raised by the chain after each commit. The remaining topics
//! carry inbound peer traffic as raw payload bytes plus the sending peer.
//!
//! ## Delivery
//!
//! Publishing reaches every live subscription. Handlers registered through
//! [`EventDispatcher`] run concurrently on a bounded worker pool and must not
//! assume ordering between events.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod dispatcher;
pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use dispatcher::{EventDispatcher, EventHandler};
pub use events::{ChainEvent, EventFilter, EventTopic};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Default bound on concurrently running handler invocations.
pub const DEFAULT_DISPATCH_CONCURRENCY: usize = 64;
