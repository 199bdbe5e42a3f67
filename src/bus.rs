//! Raw byte transactions against the peripheral.
//!
//! A [`Transport`] moves bytes; a [`PeripheralHandle`] pairs one transport with the
//! peripheral address and serializes every transaction behind a single async lock.
//! Minimum byte counts are enforced by [`BusSession`], retries are left to callers.

use embedded_hal::i2c::{Error as _, I2c};
use log::debug;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::BusError;

/// Factory address of the nunchuk family.
pub const DEFAULT_ADDRESS: u8 = 0x52;

/// Host bus access. Both calls block for the duration of the bus operation and
/// report how many bytes actually moved.
pub trait Transport: Send {
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<usize, BusError>;

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<usize, BusError>;
}

/// Adapts any `embedded-hal` I2C controller (e.g. `linux_embedded_hal::I2cdev`).
///
/// `embedded-hal` transfers are all-or-nothing, so success reports the full
/// length and a controller fault is surfaced as [`BusError::Transport`].
pub struct HalTransport<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> HalTransport<I2C> {
    pub fn new(i2c: I2C) -> Self {
        HalTransport { i2c }
    }
}

impl<I2C: I2c + Send> Transport for HalTransport<I2C> {
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<usize, BusError> {
        self.i2c
            .write(address, bytes)
            .map(|_| bytes.len())
            .map_err(|e| BusError::Transport(e.kind()))
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<usize, BusError> {
        self.i2c
            .read(address, buf)
            .map(|_| buf.len())
            .map_err(|e| BusError::Transport(e.kind()))
    }
}

/// Shared reference to one attached peripheral.
pub struct PeripheralHandle<T> {
    address: u8,
    transport: Arc<Mutex<T>>,
}

impl<T> Clone for PeripheralHandle<T> {
    fn clone(&self) -> Self {
        PeripheralHandle {
            address: self.address,
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> PeripheralHandle<T> {
    pub fn new(transport: T, address: u8) -> Self {
        PeripheralHandle {
            address,
            transport: Arc::new(Mutex::new(transport)),
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Take exclusive ownership of the bus for one transaction sequence.
    /// Waits (without blocking the thread) while another session is open.
    pub async fn lock(&self) -> BusSession<'_, T> {
        BusSession {
            address: self.address,
            transport: self.transport.lock().await,
        }
    }
}

/// Exclusive access to the peripheral; released on drop.
pub struct BusSession<'a, T> {
    address: u8,
    transport: MutexGuard<'a, T>,
}

impl<T: Transport> BusSession<'_, T> {
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Send `bytes`, failing unless every byte was accepted.
    pub fn send(&mut self, bytes: &[u8]) -> Result<usize, BusError> {
        let sent = self.transport.write(self.address, bytes)?;
        debug!("0x{:02x} <- {:02x?} ({} sent)", self.address, bytes, sent);
        if sent < bytes.len() {
            return Err(BusError::ShortWrite {
                sent,
                expected: bytes.len(),
            });
        }
        Ok(sent)
    }

    /// Receive exactly `N` bytes.
    pub fn receive<const N: usize>(&mut self) -> Result<[u8; N], BusError> {
        let mut buf = [0u8; N];
        let received = self.transport.read(self.address, &mut buf)?;
        debug!("0x{:02x} -> {:02x?} ({} received)", self.address, buf, received);
        if received < N {
            return Err(BusError::ShortRead {
                received,
                expected: N,
            });
        }
        Ok(buf)
    }
}
