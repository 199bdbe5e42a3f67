//! Periodic read/decode loop publishing the latest button snapshot.
//!
//! The loop runs as one tokio task per peripheral. Each period is measured from
//! the end of one cycle to the start of the next, so a slow bus stretches the
//! period instead of overlapping cycles.

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::bus::{BusSession, PeripheralHandle, Transport};
use crate::decoder::{decode, ButtonState};
use crate::device::DeviceState;
use crate::error::ReadError;
use crate::reader::read_frame_on;
use crate::timing::sleep_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Pause between the end of one cycle and the start of the next.
    pub interval_ms: u64,
    /// Consecutive failed cycles after which the device is marked failed.
    pub failure_threshold: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 50,
            failure_threshold: 3,
        }
    }
}

impl PollSettings {
    /// Replace zero fields with their defaults. A zero threshold would fail
    /// the device on its first bad cycle.
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        Self {
            interval_ms: if self.interval_ms == 0 {
                defaults.interval_ms
            } else {
                self.interval_ms
            },
            failure_threshold: if self.failure_threshold == 0 {
                defaults.failure_threshold
            } else {
                self.failure_threshold
            },
        }
    }
}

/// The unit of work run every period.
pub struct PollCycle<T> {
    handle: PeripheralHandle<T>,
    published: Arc<watch::Sender<ButtonState>>,
}

impl<T> Clone for PollCycle<T> {
    fn clone(&self) -> Self {
        PollCycle {
            handle: self.handle.clone(),
            published: Arc::clone(&self.published),
        }
    }
}

impl<T: Transport> PollCycle<T> {
    pub fn new(handle: PeripheralHandle<T>, published: Arc<watch::Sender<ButtonState>>) -> Self {
        PollCycle { handle, published }
    }

    /// Read, decode and publish one frame. On failure the published state is
    /// left untouched.
    pub async fn poll_once(&self) -> Result<ButtonState, ReadError> {
        let mut session = self.handle.lock().await;
        self.poll_on(&mut session).await
    }

    /// Same as [`poll_once`](Self::poll_once) on a session the caller holds.
    pub async fn poll_on(&self, session: &mut BusSession<'_, T>) -> Result<ButtonState, ReadError> {
        match read_frame_on(session).await {
            Ok(frame) => {
                let state = decode(&frame);
                self.published.send_replace(state);
                debug!("0x{:02x}: button state -> {}", self.handle.address(), state);
                Ok(state)
            }
            Err(e) => {
                warn!(
                    "0x{:02x}: poll failed (errno {}): {}; keeping {}",
                    self.handle.address(),
                    e.errno(),
                    e,
                    *self.published.borrow()
                );
                Err(e)
            }
        }
    }
}

/// Handle on a running poll task.
pub struct Poller {
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Poller {
    /// Spawn the poll loop and return immediately.
    pub fn start<T: Transport + 'static>(
        cycle: PollCycle<T>,
        settings: PollSettings,
        status: Arc<watch::Sender<DeviceState>>,
    ) -> Self {
        let settings = settings.normalized();
        let (stop_tx, stop_rx) = watch::channel(false);
        info!(
            "0x{:02x}: polling every {}ms",
            cycle.handle.address(),
            settings.interval_ms
        );
        let task = tokio::spawn(run(cycle, settings, status, stop_rx));

        Poller {
            stop_tx,
            task: Some(task),
        }
    }

    /// Signal the loop and wait for the cycle in flight, if any, to finish.
    /// No cycle starts after this returns.
    pub async fn stop(&mut self) {
        self.stop_tx.send_replace(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Poll task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}

async fn run<T: Transport>(
    cycle: PollCycle<T>,
    settings: PollSettings,
    status: Arc<watch::Sender<DeviceState>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let address = cycle.handle.address();
    let mut failures: u32 = 0;

    loop {
        if *stop_rx.borrow_and_update() {
            break;
        }

        match cycle.poll_once().await {
            Ok(_) => failures = 0,
            Err(e) => {
                failures += 1;
                if failures >= settings.failure_threshold {
                    error!(
                        "0x{:02x}: {} consecutive read failures, last: {}; giving up",
                        address, failures, e
                    );
                    status.send_if_modified(|s| {
                        if *s == DeviceState::Polling {
                            *s = DeviceState::Failed;
                            true
                        } else {
                            false
                        }
                    });
                    break;
                }
            }
        }

        tokio::select! {
            _ = sleep_ms(settings.interval_ms) => {}
            _ = stop_rx.changed() => break,
        }
    }

    debug!("0x{:02x}: poll loop exited", address);
}
