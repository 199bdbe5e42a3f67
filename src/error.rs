use embedded_hal::i2c::ErrorKind;
use thiserror::Error;

use crate::device::DeviceState;
use crate::handshake::HandshakeStep;

/// Error code the kernel driver returned for every bus failure.
pub const EIO: i32 = 5;

/// Transport-level failures. Never retried by the bus layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("short write: {sent} of {expected} bytes accepted")]
    ShortWrite { sent: usize, expected: usize },

    #[error("short read: {received} of {expected} bytes returned")]
    ShortRead { received: usize, expected: usize },

    #[error("bus transport error: {0}")]
    Transport(ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("handshake failed at {step} step: {source}")]
    HandshakeFailed {
        step: HandshakeStep,
        #[source]
        source: BusError,
    },
}

/// Per-cycle read failures, recovered locally by the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("failed to start register read: {0}")]
    RequestFailed(#[source] BusError),

    #[error("failed to receive data: {0}")]
    IncompleteFrame(#[source] BusError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error("cannot {operation} while device is {state}")]
    InvalidState {
        state: DeviceState,
        operation: &'static str,
    },
}

impl BusError {
    pub fn errno(&self) -> i32 {
        EIO
    }
}

impl InitError {
    pub fn errno(&self) -> i32 {
        EIO
    }

    pub fn step(&self) -> HandshakeStep {
        match self {
            InitError::HandshakeFailed { step, .. } => *step,
        }
    }
}

impl ReadError {
    pub fn errno(&self) -> i32 {
        EIO
    }
}

impl DeviceError {
    pub fn errno(&self) -> i32 {
        match self {
            DeviceError::Init(e) => e.errno(),
            DeviceError::Read(e) => e.errno(),
            // EBUSY: the lifecycle refused the operation
            DeviceError::InvalidState { .. } => 16,
        }
    }
}
