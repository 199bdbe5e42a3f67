//! Switches the peripheral from its obscured default output to raw bytes.

use log::{debug, error};
use std::fmt;

use crate::bus::{BusSession, PeripheralHandle, Transport};
use crate::error::InitError;
use crate::timing::sleep_ms;

/// First write: request unencrypted output.
pub const HANDSHAKE_START: [u8; 2] = [0xf0, 0x55];
/// Second write: complete the mode switch.
pub const HANDSHAKE_FINISH: [u8; 2] = [0xfb, 0x00];
/// Pause after each handshake write.
pub const HANDSHAKE_DELAY_MS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    Start,
    Finish,
}

impl HandshakeStep {
    fn command(self) -> &'static [u8; 2] {
        match self {
            HandshakeStep::Start => &HANDSHAKE_START,
            HandshakeStep::Finish => &HANDSHAKE_FINISH,
        }
    }
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeStep::Start => write!(f, "start"),
            HandshakeStep::Finish => write!(f, "finish"),
        }
    }
}

/// Run both handshake writes under one bus session. Aborts on the first
/// failed write; the finish step is never attempted after a failed start.
pub async fn initialize<T: Transport>(handle: &PeripheralHandle<T>) -> Result<(), InitError> {
    let mut session = handle.lock().await;
    run(&mut session).await
}

/// Handshake on a session the caller already holds.
pub async fn run<T: Transport>(session: &mut BusSession<'_, T>) -> Result<(), InitError> {
    for step in [HandshakeStep::Start, HandshakeStep::Finish] {
        if let Err(source) = session.send(step.command()) {
            error!(
                "0x{:02x}: failed to {} handshake (errno {}): {}",
                session.address(),
                step,
                source.errno(),
                source
            );
            return Err(InitError::HandshakeFailed { step, source });
        }
        sleep_ms(HANDSHAKE_DELAY_MS).await;
    }

    debug!("0x{:02x}: raw output mode enabled", session.address());
    Ok(())
}
