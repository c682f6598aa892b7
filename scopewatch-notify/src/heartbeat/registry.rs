/**
 * REGISTRE HEARTBEAT - Unités actuellement supervisées par le serveur
 *
 * RÔLE :
 * Garde une inscription par unité supervisée et pilote le cycle de vie du
 * worker de surveillance : la première inscription le démarre, la dernière
 * désinscription l'arrête.
 *
 * VERROUILLAGE :
 * Les inscriptions et l'emplacement du worker sont derrière un seul mutex
 * async. Inscriptions, scan des unités mortes et arrêt/démarrage du worker
 * ne s'entrelacent jamais.
 */

use super::monitor::{HeartbeatMonitor, MonitorState, MonitorWorker};
use super::unit::{UnitHandle, UnitId};
use super::MIN_TIMEOUT_MINUTES;
use crate::config::MonitorConfig;
use crate::error::{NotifyError, Result};
use crate::gateway::ContactInfo;
use crate::protocol::{self, MonitorRequest, StartMonitorRequest};
use crate::transport::TransportClient;
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

pub(crate) struct MonitorRegistration {
    pub(crate) monitor_id: String,
    pub(crate) failure_text: String,
    pub(crate) timeout_minutes: u32,
    liveness: Weak<()>,
}

impl MonitorRegistration {
    pub(crate) fn is_alive(&self) -> bool {
        self.liveness.strong_count() > 0
    }
}

#[derive(Default)]
pub(crate) struct RegistryState {
    pub(crate) registrations: HashMap<UnitId, MonitorRegistration>,
    pub(crate) worker: Option<MonitorWorker>,
}

/// State shared between the registry and its monitor worker.
pub(crate) struct Shared {
    pub(crate) state: Mutex<RegistryState>,
    pub(crate) signals: SyncMutex<mpsc::UnboundedReceiver<UnitId>>,
    pub(crate) transport: TransportClient,
    pub(crate) config: MonitorConfig,
}

pub struct HeartbeatRegistry {
    shared: Arc<Shared>,
    signal_tx: mpsc::UnboundedSender<UnitId>,
    next_unit: AtomicU64,
    next_generation: AtomicU64,
}

impl HeartbeatRegistry {
    pub fn new(transport: TransportClient, config: MonitorConfig) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RegistryState::default()),
                signals: SyncMutex::new(signal_rx),
                transport,
                config,
            }),
            signal_tx,
            next_unit: AtomicU64::new(1),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Issue a handle for a new execution unit.
    pub fn issue_unit(&self) -> UnitHandle {
        UnitHandle::new(UnitId::new(self.next_unit.fetch_add(1, Ordering::Relaxed)))
    }

    /// Register `unit`, announce it to the server and make sure a monitor
    /// worker is running. If the server refuses the announcement the unit is
    /// left unregistered.
    pub async fn start(
        &self,
        unit: &UnitHandle,
        failure_text: &str,
        timeout_minutes: u32,
        contact: &ContactInfo,
    ) -> Result<()> {
        validate_timeout(timeout_minutes)?;
        let unit_id = unit.id();

        let mut state = self.shared.state.lock().await;
        if state.registrations.contains_key(&unit_id) {
            return Err(NotifyError::configuration(format!(
                "unit {} is already being monitored",
                unit_id
            )));
        }

        let monitor_id = generate_monitor_id(unit_id);
        state.registrations.insert(
            unit_id,
            MonitorRegistration {
                monitor_id: monitor_id.clone(),
                failure_text: failure_text.to_string(),
                timeout_minutes,
                liveness: unit.liveness(),
            },
        );

        let request = StartMonitorRequest {
            monitor_id: &monitor_id,
            failure_text,
            email: &contact.email,
            cellphone: &contact.cellphone,
            timeout_minutes: timeout_minutes.to_string(),
        };
        if let Err(e) = self.shared.transport.send_request(protocol::START_MONITOR, &request).await {
            state.registrations.remove(&unit_id);
            return Err(e);
        }
        info!("Unit {} monitored as {} (timeout {} min)", unit_id, monitor_id, timeout_minutes);

        if state.worker.is_none() {
            let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            state.worker = Some(HeartbeatMonitor::spawn(Arc::clone(&self.shared), generation));
        }
        Ok(())
    }

    /// Deregister `unit`. When it was the last one, the monitor worker is
    /// stopped and waited for before the server is told.
    pub async fn stop(&self, unit: &UnitHandle) -> Result<()> {
        let unit_id = unit.id();

        let monitor_id = {
            let mut state = self.shared.state.lock().await;
            let registration = state.registrations.remove(&unit_id).ok_or_else(|| {
                NotifyError::configuration(format!("unit {} is not currently sending heartbeats", unit_id))
            })?;

            if state.registrations.is_empty() {
                if let Some(worker) = state.worker.take() {
                    worker.shutdown(self.shared.config.shutdown_timeout()).await;
                }
            }
            registration.monitor_id
        };

        debug!("Unit {} ({}) deregistered", unit_id, monitor_id);
        self.shared
            .transport
            .send_request(protocol::STOP_MONITOR, &MonitorRequest { monitor_id: &monitor_id })
            .await
    }

    /// Record a heartbeat from `unit`. Never blocks; the next monitor tick
    /// picks it up.
    pub fn signal(&self, unit: &UnitHandle) {
        // The receiver lives as long as `shared`, which we hold.
        let _ = self.signal_tx.send(unit.id());
    }

    pub async fn len(&self) -> usize {
        self.shared.state.lock().await.registrations.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn is_registered(&self, unit: UnitId) -> bool {
        self.shared.state.lock().await.registrations.contains_key(&unit)
    }

    pub async fn monitor_id(&self, unit: UnitId) -> Option<String> {
        self.shared
            .state
            .lock()
            .await
            .registrations
            .get(&unit)
            .map(|r| r.monitor_id.clone())
    }

    pub async fn monitor_state(&self) -> MonitorState {
        match self.shared.state.lock().await.worker {
            Some(_) => MonitorState::Running,
            None => MonitorState::Stopped,
        }
    }
}

impl Drop for HeartbeatRegistry {
    fn drop(&mut self) {
        // The worker keeps `shared` alive on its own.
        if let Ok(mut state) = self.shared.state.try_lock() {
            if let Some(worker) = state.worker.take() {
                worker.cancel();
            }
        }
    }
}

pub(crate) fn validate_timeout(timeout_minutes: u32) -> Result<()> {
    if timeout_minutes < MIN_TIMEOUT_MINUTES {
        return Err(NotifyError::configuration(format!(
            "heartbeat timeout {} is too short (minimum {} minutes)",
            timeout_minutes, MIN_TIMEOUT_MINUTES
        )));
    }
    Ok(())
}

/// Correlation token: unit identity plus registration time.
fn generate_monitor_id(unit: UnitId) -> String {
    format!("{}-{}", unit, chrono::Utc::now().timestamp_millis())
}
