//! Shutdown coordination for the terminator.

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that the serve loop and async tasks subscribe
/// to. The serve loop is synchronous and checks its receiver with
/// [`is_signalled`] once per tick.
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers (loops still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking check of a shutdown receiver.
///
/// A dropped coordinator counts as a shutdown request.
pub fn is_signalled(rx: &mut broadcast::Receiver<()>) -> bool {
    match rx.try_recv() {
        Ok(()) => true,
        Err(broadcast::error::TryRecvError::Empty) => false,
        Err(broadcast::error::TryRecvError::Lagged(_)) => true,
        Err(broadcast::error::TryRecvError::Closed) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receiver_sees_trigger_without_awaiting() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 1);
        assert!(!is_signalled(&mut rx));

        shutdown.trigger();
        assert!(is_signalled(&mut rx));
    }

    #[test]
    fn dropped_coordinator_counts_as_shutdown() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        drop(shutdown);
        assert!(is_signalled(&mut rx));
    }
}
