//! Lifecycle of one attached peripheral.
//!
//! ```text
//! Uninitialized --attach--> Initialized --start--> Polling --detach--> Removed
//!       |                        ^                    |  |
//!       +--handshake error--+    +-------stop---------+  +--read failures--> Failed
//!                           v
//!                         Failed
//! ```
//!
//! `Failed` and `Removed` are terminal; a new attachment needs a new [`Device`].

use log::{info, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::bus::{PeripheralHandle, Transport};
use crate::decoder::ButtonState;
use crate::error::DeviceError;
use crate::handshake;
use crate::poller::{PollCycle, PollSettings, Poller};
use crate::reader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Uninitialized,
    Initialized,
    Polling,
    Failed,
    Removed,
}

impl DeviceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeviceState::Failed | DeviceState::Removed)
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceState::Uninitialized => "uninitialized",
            DeviceState::Initialized => "initialized",
            DeviceState::Polling => "polling",
            DeviceState::Failed => "failed",
            DeviceState::Removed => "removed",
        };
        f.write_str(name)
    }
}

pub struct Device<T> {
    handle: PeripheralHandle<T>,
    settings: PollSettings,
    status: Arc<watch::Sender<DeviceState>>,
    published: Arc<watch::Sender<ButtonState>>,
    poller: Option<Poller>,
    /// Set after a handshake until the stale first frame has been discarded.
    needs_prime: AtomicBool,
}

impl<T: Transport + 'static> Device<T> {
    pub fn new(handle: PeripheralHandle<T>, settings: PollSettings) -> Self {
        let (status, _) = watch::channel(DeviceState::Uninitialized);
        let (published, _) = watch::channel(ButtonState::released());

        Device {
            handle,
            settings: settings.normalized(),
            status: Arc::new(status),
            published: Arc::new(published),
            poller: None,
            needs_prime: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> DeviceState {
        *self.status.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<DeviceState> {
        self.status.subscribe()
    }

    /// Receiver of the published button snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ButtonState> {
        self.published.subscribe()
    }

    /// Snapshot as of the last successful poll.
    pub fn latest(&self) -> ButtonState {
        *self.published.borrow()
    }

    pub fn address(&self) -> u8 {
        self.handle.address()
    }

    /// Run the handshake. A failed handshake leaves the device `Failed`.
    pub async fn attach(&mut self) -> Result<(), DeviceError> {
        self.require(&[DeviceState::Uninitialized], "attach")?;

        match handshake::initialize(&self.handle).await {
            Ok(()) => {
                self.needs_prime.store(true, Ordering::SeqCst);
                self.transition(DeviceState::Uninitialized, DeviceState::Initialized);
                info!("0x{:02x}: attached", self.address());
                Ok(())
            }
            Err(e) => {
                self.transition(DeviceState::Uninitialized, DeviceState::Failed);
                Err(e.into())
            }
        }
    }

    /// Discard one frame, then hand the peripheral to a fresh poll task.
    pub async fn start(&mut self) -> Result<(), DeviceError> {
        self.require(&[DeviceState::Initialized], "start")?;

        {
            let mut session = self.handle.lock().await;
            reader::prime_on(&mut session).await;
            self.needs_prime.store(false, Ordering::SeqCst);
        }

        self.transition(DeviceState::Initialized, DeviceState::Polling);
        let cycle = PollCycle::new(self.handle.clone(), Arc::clone(&self.published));
        self.poller = Some(Poller::start(cycle, self.settings, Arc::clone(&self.status)));
        Ok(())
    }

    /// Halt polling and return to `Initialized`.
    pub async fn stop(&mut self) -> Result<(), DeviceError> {
        self.require(&[DeviceState::Polling], "stop")?;

        self.stop_poller().await;
        if !self.transition(DeviceState::Polling, DeviceState::Initialized) {
            // the poll task escalated while we were waiting for it
            return Err(DeviceError::InvalidState {
                state: self.state(),
                operation: "stop",
            });
        }
        Ok(())
    }

    /// Stop polling and release the peripheral. A failed device stays failed.
    pub async fn detach(&mut self) -> Result<(), DeviceError> {
        self.require(
            &[
                DeviceState::Uninitialized,
                DeviceState::Initialized,
                DeviceState::Polling,
                DeviceState::Failed,
            ],
            "detach",
        )?;

        self.stop_poller().await;
        self.status.send_if_modified(|s| {
            if *s == DeviceState::Failed {
                false
            } else {
                *s = DeviceState::Removed;
                true
            }
        });
        info!("0x{:02x}: detached ({})", self.address(), self.state());
        Ok(())
    }

    /// Re-run the handshake without tearing the device down. The handshake and
    /// the discard read share one session, so no poll cycle sees the stale
    /// frame. Failure is reported but leaves the state alone; persistent
    /// trouble surfaces through polling.
    pub async fn reinitialize(&self) -> Result<(), DeviceError> {
        self.require(&[DeviceState::Initialized, DeviceState::Polling], "reinitialize")?;

        let mut session = self.handle.lock().await;
        match handshake::run(&mut session).await {
            Ok(()) => {
                reader::prime_on(&mut session).await;
                self.needs_prime.store(false, Ordering::SeqCst);
                info!("0x{:02x}: reinitialized", self.address());
                Ok(())
            }
            Err(e) => {
                warn!("0x{:02x}: reinitialize failed: {}", self.address(), e);
                Err(e.into())
            }
        }
    }

    /// Run a single poll cycle on demand, outside the periodic schedule.
    /// The first call after `attach` discards one frame before decoding.
    pub async fn poll_once(&self) -> Result<ButtonState, DeviceError> {
        self.require(&[DeviceState::Initialized, DeviceState::Polling], "poll")?;

        let cycle = PollCycle::new(self.handle.clone(), Arc::clone(&self.published));
        let mut session = self.handle.lock().await;
        if self.needs_prime.swap(false, Ordering::SeqCst) {
            reader::prime_on(&mut session).await;
        }
        let state = cycle.poll_on(&mut session).await?;
        Ok(state)
    }

    async fn stop_poller(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.stop().await;
        }
    }

    fn require(&self, allowed: &[DeviceState], operation: &'static str) -> Result<(), DeviceError> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(DeviceError::InvalidState { state, operation })
        }
    }

    fn transition(&self, from: DeviceState, to: DeviceState) -> bool {
        self.status.send_if_modified(|s| {
            if *s == from {
                *s = to;
                true
            } else {
                false
            }
        })
    }
}
