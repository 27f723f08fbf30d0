//! Change notifier: aggregated-data arrivals become start signals.
//!
//! Watches the store's object-created events, keeps only keys under the
//! aggregated prefix, and emits exactly one payload-free start signal per
//! matching object. Delivery is at-least-once: when the watcher lags behind
//! the event channel it emits a single catch-up signal instead of dropping
//! the missed arrivals, so the orchestrator may see duplicates but never
//! silence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::metrics;
use crate::store::{ObjectCreated, AGGREGATED_PREFIX};
use crate::workflow::StartSignal;

/// Forwards aggregated-prefix object creations to the orchestrator.
pub struct ChangeNotifier {
    events_rx: std::sync::Mutex<Option<broadcast::Receiver<ObjectCreated>>>,
    signal_tx: mpsc::Sender<StartSignal>,
    audit: Option<AuditHandle>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ChangeNotifier {
    /// Create a notifier from a store event subscription and the
    /// orchestrator's signal sender.
    pub fn new(
        events_rx: broadcast::Receiver<ObjectCreated>,
        signal_tx: mpsc::Sender<StartSignal>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            events_rx: std::sync::Mutex::new(Some(events_rx)),
            signal_tx,
            audit: None,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Sets the audit handle for logging events.
    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Whether the watch loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start the watch loop (spawns a background task).
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Change notifier already running");
            return;
        }

        let Some(mut events_rx) = self.events_rx.lock().unwrap().take() else {
            warn!("Change notifier event receiver already consumed");
            return;
        };

        let signal_tx = self.signal_tx.clone();
        let audit = self.audit.clone();
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Change notifier started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Change notifier received shutdown signal");
                        break;
                    }
                    event = events_rx.recv() => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        match event {
                            Ok(event) => {
                                if !event.key.starts_with(AGGREGATED_PREFIX) {
                                    continue;
                                }
                                debug!(key = %event.key, "Aggregated object arrived");
                                Self::emit_signal(&signal_tx, &audit, &event.key).await;
                            }
                            Err(broadcast::error::RecvError::Lagged(missed)) => {
                                // Missed events cannot be replayed; one
                                // catch-up signal keeps delivery
                                // at-least-once.
                                warn!(missed, "Event channel lagged, emitting catch-up signal");
                                Self::emit_signal(&signal_tx, &audit, "aggregated/").await;
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                info!("Store event channel closed");
                                break;
                            }
                        }
                    }
                }
            }
            running.store(false, Ordering::SeqCst);
            info!("Change notifier stopped");
        });
    }

    /// Stop the watch loop.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Change notifier not running");
            return;
        }
        let _ = self.shutdown_tx.send(());
    }

    async fn emit_signal(
        signal_tx: &mpsc::Sender<StartSignal>,
        audit: &Option<AuditHandle>,
        key: &str,
    ) {
        if signal_tx.send(StartSignal::now()).await.is_err() {
            warn!("Orchestrator signal channel closed, dropping start signal");
            return;
        }

        metrics::SIGNALS_EMITTED_TOTAL.inc();

        if let Some(audit) = audit {
            audit
                .emit(AuditEvent::StartSignalEmitted {
                    key: key.to_string(),
                })
                .await;
        }
    }
}
