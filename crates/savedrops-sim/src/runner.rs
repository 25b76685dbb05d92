//! ---
//! sd_section: "04-simulation"
//! sd_subsection: "module"
//! sd_type: "source"
//! sd_scope: "code"
//! sd_description: "Periodic tick loop and bounded fire-and-forget write path."
//! sd_version: "v0.1.0"
//! sd_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use savedrops_backend::{collections, DocumentStore};
use savedrops_common::SimulationConfig;
use savedrops_telemetry::{Reading, SimulationState};

use crate::engine::{NoiseSource, SimulationEngine, SimulationError};
use crate::health::{SharedRegistry, SyncHealth, SyncStatus};

const COMMAND_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy)]
enum RunnerCommand {
    ToggleMotor,
    SetTankLevel(f64),
    SimulateLeak,
    ResetLeak,
}

/// Drives a [`SimulationEngine`] on the configured tick interval.
///
/// Emitted readings pass through a bounded queue into the backend so a slow
/// or failing store never blocks the tick loop; when the queue is full the
/// oldest pending reading is evicted and counted rather than silently lost.
pub struct SimulationRunner;

impl SimulationRunner {
    /// Start the tick loop and writer task, returning a control handle.
    pub fn spawn<N>(
        mut engine: SimulationEngine<N>,
        store: DocumentStore,
        config: &SimulationConfig,
        registry: &SharedRegistry,
    ) -> Result<RunnerHandle>
    where
        N: NoiseSource + Send + 'static,
    {
        let health = SyncHealth::new(registry, config.degraded_after_failures)
            .context("failed to register sync-health metrics")?;
        let queue: Arc<Mutex<VecDeque<Reading>>> = Arc::new(Mutex::new(VecDeque::new()));
        let queue_depth = config.write_queue_depth;
        let notify = Arc::new(Notify::new());

        let (commands_tx, mut commands_rx) = mpsc::channel::<RunnerCommand>(COMMAND_BUFFER);
        let (shutdown_tx, mut tick_shutdown_rx) = broadcast::channel::<()>(4);
        let mut writer_shutdown_rx = shutdown_tx.subscribe();

        engine.start();
        let (state_tx, state_rx) = watch::channel(*engine.state());

        let tick_period = config.tick_interval;
        let tick_queue = queue.clone();
        let tick_notify = notify.clone();
        let tick_health = health.clone();
        let tick_task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + tick_period, tick_period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match engine.tick() {
                            Ok(reading) => {
                                let _ = state_tx.send(*engine.state());
                                push_bounded(&tick_queue, queue_depth, &tick_health, reading);
                                tick_notify.notify_one();
                            }
                            Err(err) => warn!(error = %err, "tick skipped"),
                        }
                    }
                    command = commands_rx.recv() => {
                        let Some(command) = command else { break };
                        if let Some(reading) =
                            apply_command(&mut engine, command)
                        {
                            push_bounded(&tick_queue, queue_depth, &tick_health, reading);
                            tick_notify.notify_one();
                        }
                        let _ = state_tx.send(*engine.state());
                    }
                    _ = tick_shutdown_rx.recv() => {
                        engine.stop();
                        break;
                    }
                }
            }
            info!("tick loop stopped");
        });

        let writer_store = store;
        let writer_queue = queue;
        let writer_health = health.clone();
        let writer_notify = notify;
        let writer_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_notify.notified() => {
                        drain_queue(&writer_queue, &writer_store, &writer_health);
                    }
                    _ = writer_shutdown_rx.recv() => {
                        // Already-queued readings are allowed to complete.
                        drain_queue(&writer_queue, &writer_store, &writer_health);
                        break;
                    }
                }
            }
            info!("writer stopped");
        });

        Ok(RunnerHandle {
            commands: commands_tx,
            shutdown: shutdown_tx,
            state_rx,
            health,
            tick_task,
            writer_task,
        })
    }
}

fn apply_command<N: NoiseSource>(
    engine: &mut SimulationEngine<N>,
    command: RunnerCommand,
) -> Option<Reading> {
    let outcome = match command {
        RunnerCommand::ToggleMotor => engine.toggle_motor().map(|_| None),
        RunnerCommand::SetTankLevel(level) => engine.set_tank_level(level).map(|_| None),
        RunnerCommand::SimulateLeak => engine.simulate_leak().map(Some),
        RunnerCommand::ResetLeak => engine.reset_leak().map(|_| None),
    };
    match outcome {
        Ok(reading) => reading,
        Err(err) => {
            warn!(error = %err, ?command, "override rejected");
            None
        }
    }
}

/// Enqueue with a drop-oldest policy so the newest telemetry survives.
fn push_bounded(
    queue: &Mutex<VecDeque<Reading>>,
    depth: usize,
    health: &SyncHealth,
    reading: Reading,
) {
    let mut pending = queue.lock();
    if pending.len() >= depth {
        pending.pop_front();
        health.record_dropped();
    }
    pending.push_back(reading);
}

fn drain_queue(queue: &Mutex<VecDeque<Reading>>, store: &DocumentStore, health: &SyncHealth) {
    loop {
        let Some(reading) = queue.lock().pop_front() else {
            break;
        };
        let payload = match serde_json::to_value(&reading) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "reading serialization failed");
                health.record_append_failure();
                continue;
            }
        };
        match store.append(collections::READINGS, payload) {
            Ok(id) => {
                debug!(record = %id, "reading appended");
                health.record_append_ok();
            }
            Err(err) => {
                // Best-effort once: no retry, but the failure is visible
                // through sync health instead of being swallowed.
                warn!(error = %err, "reading append failed");
                health.record_append_failure();
            }
        }
    }
}

/// Control handle for a running simulation.
pub struct RunnerHandle {
    commands: mpsc::Sender<RunnerCommand>,
    shutdown: broadcast::Sender<()>,
    state_rx: watch::Receiver<SimulationState>,
    health: SyncHealth,
    tick_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl RunnerHandle {
    /// Most recently published simulation state.
    pub fn state(&self) -> SimulationState {
        *self.state_rx.borrow()
    }

    /// Write-path counters and status.
    pub fn health(&self) -> &SyncHealth {
        &self.health
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.health.status()
    }

    pub async fn toggle_motor(&self) -> Result<(), SimulationError> {
        self.send(RunnerCommand::ToggleMotor).await
    }

    pub async fn set_tank_level(&self, level: f64) -> Result<(), SimulationError> {
        self.send(RunnerCommand::SetTankLevel(level)).await
    }

    pub async fn simulate_leak(&self) -> Result<(), SimulationError> {
        self.send(RunnerCommand::SimulateLeak).await
    }

    pub async fn reset_leak(&self) -> Result<(), SimulationError> {
        self.send(RunnerCommand::ResetLeak).await
    }

    async fn send(&self, command: RunnerCommand) -> Result<(), SimulationError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SimulationError::NotRunning)
    }

    /// Stop the tick loop, flush the queue, and await both tasks.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.tick_task
            .await
            .context("tick task panicked or was cancelled")?;
        self.writer_task
            .await
            .context("writer task panicked or was cancelled")?;
        Ok(())
    }
}

impl std::fmt::Debug for RunnerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerHandle")
            .field("sync_status", &self.health.status())
            .finish_non_exhaustive()
    }
}
