//! # Event Dispatcher
//!
//! Typed handler table on top of the bus. Each registered handler owns a
//! subscription and a receive loop; every matching event is handled on a
//! separate task drawn from a shared, bounded worker pool.
//!
//! ## Delivery contract
//!
//! Handlers run concurrently with each other and with themselves. No ordering
//! is guaranteed between two events delivered to the same handler, so a
//! handler must not assume it sees events in publish order.

use crate::events::{ChainEvent, EventFilter};
use crate::publisher::InMemoryEventBus;
use crate::DEFAULT_DISPATCH_CONCURRENCY;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A consumer of chain events.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    async fn handle(&self, event: ChainEvent);
}

/// Fans bus events out to registered handlers on a bounded worker pool.
pub struct EventDispatcher {
    bus: Arc<InMemoryEventBus>,
    workers: Arc<Semaphore>,
    max_concurrency: usize,
    loops: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl EventDispatcher {
    #[must_use]
    pub fn new(bus: Arc<InMemoryEventBus>) -> Self {
        Self::with_concurrency(bus, DEFAULT_DISPATCH_CONCURRENCY)
    }

    /// `max_concurrency` bounds the number of handler invocations in flight
    /// across all handlers.
    #[must_use]
    pub fn with_concurrency(bus: Arc<InMemoryEventBus>, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            bus,
            workers: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            loops: Mutex::new(Vec::new()),
            shutdown_tx,
        }
    }

    /// Register `handler` for events matching `filter`.
    ///
    /// The subscription is taken before this returns, so events published
    /// afterwards are never missed. Must be called inside a tokio runtime.
    pub fn register(&self, filter: EventFilter, handler: Arc<dyn EventHandler>) {
        let mut subscription = self.bus.subscribe(filter);
        let workers = Arc::clone(&self.workers);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let name = handler.name();

        let receive_loop = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    event = subscription.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };

                let permit = match Arc::clone(&workers).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    handler.handle(event).await;
                    drop(permit);
                });
            }
            debug!(handler = name, "Dispatcher loop stopped");
        });

        match self.loops.lock() {
            Ok(mut loops) => loops.push(receive_loop),
            Err(_) => warn!(handler = name, "Dispatcher loop table poisoned"),
        }
        debug!(handler = name, "Handler registered");
    }

    /// Handler invocations currently running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.max_concurrency - self.workers.available_permits()
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.loops.lock().map(|loops| loops.len()).unwrap_or(0)
    }

    /// Stop every receive loop and wait for them to exit. Handler invocations
    /// already running are left to finish on their own.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let loops = match self.loops.lock() {
            Ok(mut loops) => std::mem::take(&mut *loops),
            Err(_) => return,
        };
        for receive_loop in loops {
            if let Err(e) = receive_loop.await {
                warn!(error = %e, "Dispatcher loop ended abnormally");
            }
        }
    }
}
