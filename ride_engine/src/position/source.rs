use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::LocationError;

use super::{PositionEvent, PositionProvider, WatchOptions};

/// Live subscriber queues. `None` once the watch has ended or been stopped.
type Subscribers = Arc<Mutex<Option<Vec<mpsc::UnboundedSender<PositionEvent>>>>>;

/// Typed wrapper around the platform's position watch.
///
/// A background pump reads the provider, applies the per-fix timeout, drops
/// fixes that are not newer than the last accepted one, and hands the rest to
/// every live [`Subscription`]. Each subscription has its own unbounded queue,
/// so a slow listener still sees every fix, in order.
pub struct PositionSource {
    subscribers: Subscribers,
    pump: Option<JoinHandle<()>>,
}

impl PositionSource {
    pub fn start<P: PositionProvider>(provider: P, options: WatchOptions) -> Self {
        let subscribers: Subscribers = Arc::new(Mutex::new(Some(Vec::new())));

        tracing::info!("Starting position watch (high accuracy: {}, timeout: {:?})", options.high_accuracy, options.timeout);
        let pump = tokio::spawn(pump(provider, options, subscribers.clone()));

        Self {
            subscribers,
            pump: Some(pump),
        }
    }

    /// Subscribes to every fix delivered from now on. Subscribing to a stopped
    /// or ended watch gives a subscription that is already closed.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut subscribers = lock(&self.subscribers);
        match subscribers.as_mut() {
            Some(list) => {
                list.push(tx);
                Subscription { rx: Some(rx) }
            }
            None => Subscription { rx: None },
        }
    }

    /// Stops the platform watch. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            close(&self.subscribers);
            tracing::info!("Position watch stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.pump.as_ref().is_some_and(|pump| !pump.is_finished())
    }
}

impl Drop for PositionSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One listener on a [`PositionSource`].
pub struct Subscription {
    rx: Option<mpsc::UnboundedReceiver<PositionEvent>>,
}

impl Subscription {
    /// Next fix or error, in arrival order. `None` once stopped or once the stream has ended.
    pub async fn recv(&mut self) -> Option<PositionEvent> {
        let rx = self.rx.as_mut()?;
        let event = rx.recv().await;
        if event.is_none() {
            self.rx = None;
        }
        event
    }

    /// Detaches from the source. Nothing is delivered after this returns, queued fixes included.
    pub fn stop(&mut self) {
        self.rx = None;
    }

    pub fn is_stopped(&self) -> bool {
        self.rx.is_none()
    }
}

fn lock(subscribers: &Subscribers) -> std::sync::MutexGuard<'_, Option<Vec<mpsc::UnboundedSender<PositionEvent>>>> {
    // A poisoned list is still a valid list of senders
    subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Drops every sender so subscriptions see the end of the stream.
fn close(subscribers: &Subscribers) {
    lock(subscribers).take();
}

async fn pump<P: PositionProvider>(mut provider: P, options: WatchOptions, subscribers: Subscribers) {
    let mut last_accepted: Option<DateTime<Utc>> = None;

    loop {
        let event = match tokio::time::timeout(options.timeout, provider.next_fix(&options)).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::info!("Position stream ended");
                break;
            }
            Err(_) => Err(LocationError::Timeout),
        };

        match &event {
            Ok(sample) => {
                if last_accepted.is_some_and(|last| sample.timestamp <= last) {
                    tracing::debug!("Dropping out of order fix from {}", sample.timestamp);
                    continue;
                }
                last_accepted = Some(sample.timestamp);
            }
            Err(err) => tracing::warn!("Location error: {}", err),
        }

        if let Some(list) = lock(&subscribers).as_mut() {
            list.retain(|tx| tx.send(event).is_ok());
        }
    }

    close(&subscribers);
}
