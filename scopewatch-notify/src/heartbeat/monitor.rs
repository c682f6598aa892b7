//! Background worker batching heartbeats and reporting dead units.
//!
//! One tick every `tick_interval`:
//! 1. drain the heartbeat signals, one entry per unit however often it
//!    signaled
//! 2. send one heartbeat per signaled unit that is still registered
//! 3. report and evict every registered unit whose handle was dropped
//!
//! Nothing inside a tick is fatal to the loop: a failed request is logged
//! and the remaining units are still served.

use super::registry::Shared;
use super::unit::UnitId;
use crate::error::NotifyError;
use crate::protocol::{self, MonitorRequest};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    Continue,
    /// The registry emptied itself through dead-unit eviction.
    Idle,
}

/// Handle on the running worker, kept in the registry's worker slot.
pub(crate) struct MonitorWorker {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl MonitorWorker {
    /// Ask the loop to exit without waiting for it.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel the loop and wait for it to exit, at most `timeout`; after that
    /// the task is aborted.
    pub(crate) async fn shutdown(self, timeout: Duration) {
        self.cancel.cancel();
        let abort = self.handle.abort_handle();

        match tokio::time::timeout(timeout, self.handle).await {
            Ok(Ok(())) => info!("Heartbeat monitor {} stopped", self.generation),
            Ok(Err(e)) => error!("Heartbeat monitor {} ended abnormally: {}", self.generation, e),
            Err(_) => {
                warn!(
                    "Heartbeat monitor {} did not stop within {:?}, aborting",
                    self.generation, timeout
                );
                abort.abort();
            }
        }
    }
}

pub(crate) struct HeartbeatMonitor {
    shared: Arc<Shared>,
    generation: u64,
}

impl HeartbeatMonitor {
    pub(crate) fn spawn(shared: Arc<Shared>, generation: u64) -> MonitorWorker {
        let cancel = CancellationToken::new();
        let monitor = HeartbeatMonitor { shared, generation };
        let handle = tokio::spawn(monitor.run(cancel.clone()));
        info!("Heartbeat monitor {} started", generation);

        MonitorWorker {
            generation,
            cancel,
            handle,
        }
    }

    async fn run(self, cancel: CancellationToken) {
        let period = self.shared.config.tick_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // A stop request may arrive while the tick waits on the registry
            // lock held by the stopping caller.
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.tick() => outcome,
            };
            if outcome == TickOutcome::Idle {
                break;
            }
        }
        debug!("Heartbeat monitor {} loop exited", self.generation);
    }

    async fn tick(&self) -> TickOutcome {
        let signaled = {
            let mut rx = self.shared.signals.lock();
            drain_signals(&mut rx)
        };
        if !signaled.is_empty() {
            self.send_heartbeats(&signaled).await;
        }
        self.reap_dead_units().await
    }

    async fn send_heartbeats(&self, signaled: &HashSet<UnitId>) {
        let targets: Vec<(UnitId, String)> = {
            let state = self.shared.state.lock().await;
            signaled
                .iter()
                .filter_map(|unit| state.registrations.get(unit).map(|r| (*unit, r.monitor_id.clone())))
                .collect()
        };

        for (unit, monitor_id) in targets {
            let request = MonitorRequest { monitor_id: &monitor_id };
            match self.shared.transport.send_request(protocol::HEARTBEAT, &request).await {
                Ok(()) => debug!("Heartbeat sent for unit {} ({})", unit, monitor_id),
                Err(e) => error!("Error sending heartbeat for unit {}: {}", unit, e),
            }
        }
    }

    /// Report units whose handle is gone. Runs entirely under the registry
    /// lock so it never sees a half-applied start or stop.
    async fn reap_dead_units(&self) -> TickOutcome {
        let mut state = self.shared.state.lock().await;

        let dead: Vec<UnitId> = state
            .registrations
            .iter()
            .filter(|(_, registration)| !registration.is_alive())
            .map(|(unit, _)| *unit)
            .collect();
        if dead.is_empty() {
            return TickOutcome::Continue;
        }

        for unit in dead {
            let Some(registration) = state.registrations.get(&unit) else {
                continue;
            };
            error!(
                "Unit {} has died without stopping its heartbeats (monitor {}, alert {:?}, timeout {} min)",
                unit, registration.monitor_id, registration.failure_text, registration.timeout_minutes
            );

            let request = MonitorRequest {
                monitor_id: &registration.monitor_id,
            };
            match self.shared.transport.send_request(protocol::MONITOR_FAILURE, &request).await {
                Ok(()) => {
                    state.registrations.remove(&unit);
                }
                Err(NotifyError::CapExceeded(message)) => {
                    warn!("SMS cap exceeded while reporting unit {}, giving up on it: {}", unit, message);
                    state.registrations.remove(&unit);
                }
                Err(e) => error!("Error sending failure report for unit {}, will retry: {}", unit, e),
            }
        }

        let ours = state.worker.as_ref().map(|w| w.generation) == Some(self.generation);
        if state.registrations.is_empty() && ours {
            // Detaches our own JoinHandle; the loop ends right after.
            state.worker = None;
            info!("Heartbeat monitor {} idle, stopping", self.generation);
            return TickOutcome::Idle;
        }
        TickOutcome::Continue
    }
}

/// Empty the signal queue into a set of units.
pub(crate) fn drain_signals(rx: &mut mpsc::UnboundedReceiver<UnitId>) -> HashSet<UnitId> {
    let mut signaled = HashSet::new();
    while let Ok(unit) = rx.try_recv() {
        signaled.insert(unit);
    }
    signaled
}
