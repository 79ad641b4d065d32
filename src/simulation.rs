use crate::capture::CaptureUnit;
use crate::config::{ConfigError, SimulationConfig};
use crate::gateway::{MqttPublisher, NullPublisher, Publisher, TopicScheme};
use crate::generator::{PipelineContext, SpawnedTask};
use crate::handoff::MotionHandoff;
use crate::readings::{CaptureUnitSnapshot, RigId, RigSnapshot};
use crate::rig::Rig;
use crate::shutdown::ShutdownSignal;
use crate::store::{ReadingStore, StoreReader, StoreStats};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("simulation is already running")]
    AlreadyRunning,
    #[error("simulation was stopped; build a new one to run again")]
    Stopped,
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleState {
    Idle,
    Running,
    Stopped,
}

/// Owns the fleet: every rig, the capture unit, the shared store, the
/// publish gateway and the shutdown signal.
pub struct Simulation {
    config: SimulationConfig,
    store: Arc<ReadingStore>,
    gateway: Arc<dyn Publisher>,
    handoff: Arc<MotionHandoff>,
    shutdown: ShutdownSignal,
    state: LifecycleState,
    tasks: Vec<SpawnedTask>,
}

impl Simulation {
    pub fn new(config: SimulationConfig, gateway: Arc<dyn Publisher>) -> Result<Self, LifecycleError> {
        config.validate()?;

        Ok(Self {
            store: Arc::new(ReadingStore::new(config.fleet_size)),
            handoff: Arc::new(MotionHandoff::new(config.handoff_policy)),
            shutdown: ShutdownSignal::new(),
            state: LifecycleState::Idle,
            tasks: Vec::new(),
            gateway,
            config,
        })
    }

    /// Simulation that never publishes. Publishing is switched off in the
    /// config so `start` does not try to connect.
    pub fn headless(mut config: SimulationConfig) -> Result<Self, LifecycleError> {
        config.sink.enabled = false;
        Self::new(config, Arc::new(NullPublisher))
    }

    /// Simulation publishing to the MQTT broker named in the config, or
    /// headless when publishing is disabled.
    pub fn from_config(config: SimulationConfig) -> Result<Self, LifecycleError> {
        if config.sink.enabled {
            config.validate()?;
            let gateway = Arc::new(MqttPublisher::from_config(&config.sink)?);
            Self::new(config, gateway)
        } else {
            Self::headless(config)
        }
    }

    /// Connect the sink (failure only disables publishing) and launch every
    /// generator task.
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            LifecycleState::Idle => {}
            LifecycleState::Running => {
                warn!("start requested while the simulation is already running");
                return Err(LifecycleError::AlreadyRunning);
            }
            LifecycleState::Stopped => {
                warn!("start requested after stop");
                return Err(LifecycleError::Stopped);
            }
        }

        if self.config.sink.enabled {
            match self.gateway.connect().await {
                Ok(()) => info!(endpoint = %self.config.sink.endpoint, "publishing telemetry"),
                Err(e) => warn!(error = %e, "telemetry sink unavailable, continuing without publishing"),
            }
        } else {
            info!("publishing disabled, running headless");
        }

        let ctx = PipelineContext::new(
            Arc::clone(&self.store),
            Arc::clone(&self.gateway),
            TopicScheme::new(self.config.topic_prefix.clone()),
            self.shutdown.clone(),
        );

        for rig_id in 1..=self.config.fleet_size {
            let rig = Rig::new(rig_id, &self.config, &ctx);
            debug!(rig = rig.id(), "launching rig");
            self.tasks.extend(rig.spawn());
        }
        debug!(
            capacity = self.handoff.capacity(),
            policy = ?self.handoff.policy(),
            "motion hand-off ready"
        );
        let capture = CaptureUnit::new(&self.config, Arc::clone(&self.handoff), &ctx);
        self.tasks.extend(capture.spawn());

        self.state = LifecycleState::Running;
        info!(rigs = self.config.fleet_size, tasks = self.tasks.len(), "simulation started");
        Ok(())
    }

    /// Signal every task, wait for them within the grace period, then close
    /// the sink. Returns `false` when the simulation was already stopped.
    pub async fn stop(&mut self) -> bool {
        if self.state == LifecycleState::Stopped {
            debug!("stop requested again, nothing to do");
            return false;
        }

        info!("stopping simulation");
        self.shutdown.trigger();

        let deadline = Instant::now() + self.config.shutdown_grace();
        for SpawnedTask { name, mut handle } in self.tasks.drain(..) {
            match time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => debug!(task = %name, "task finished"),
                Ok(Err(e)) => error!(task = %name, error = %e, "task ended abnormally"),
                Err(_) => {
                    warn!(task = %name, "task missed the shutdown grace period, aborting");
                    handle.abort();
                }
            }
        }

        self.gateway.disconnect().await;
        self.state = LifecycleState::Stopped;
        info!("simulation stopped");
        true
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LifecycleState::Running
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn snapshot_rig(&self, rig_id: RigId) -> Option<RigSnapshot> {
        self.store.snapshot_rig(rig_id)
    }

    pub fn snapshot_capture_unit(&self) -> CaptureUnitSnapshot {
        self.store.snapshot_capture_unit()
    }

    /// Read-only handle for viewers that outlive borrows of the simulation.
    pub fn reader(&self) -> StoreReader {
        StoreReader::new(Arc::clone(&self.store))
    }

    pub fn rig_ids(&self) -> Vec<RigId> {
        self.store.rig_ids().collect()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn is_publishing(&self) -> bool {
        self.gateway.is_connected()
    }

    /// Motion ids lost to hand-off overflow so far.
    pub fn handoff_dropped(&self) -> u64 {
        self.handoff.dropped()
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        if self.state == LifecycleState::Running {
            self.shutdown.trigger();
        }
    }
}
