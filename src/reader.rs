//! One request/response cycle against the peripheral.

use log::{debug, warn};

use crate::bus::{BusSession, PeripheralHandle, Transport};
use crate::decoder::{RawFrame, FRAME_LEN};
use crate::error::ReadError;
use crate::timing::{sleep_ms, sleep_range_ms};

/// Asks the peripheral to latch the next frame.
pub const REQUEST_FRAME: [u8; 1] = [0x00];

/// Randomized pause before a new request.
pub const SETTLE_MIN_MS: u64 = 10;
pub const SETTLE_MAX_MS: u64 = 20;
/// Peripheral processing time between request and read.
pub const PROCESSING_DELAY_MS: u64 = 10;
/// Bus settle time after the read, before the handle is reused.
pub const BUS_SETTLE_MS: u64 = 10;

/// Request and read one frame. The bus stays locked for the whole cycle,
/// delays included, so nothing can slip between request and response.
pub async fn read_frame<T: Transport>(handle: &PeripheralHandle<T>) -> Result<RawFrame, ReadError> {
    let mut session = handle.lock().await;
    read_frame_on(&mut session).await
}

/// Read cycle on a session the caller already holds.
pub async fn read_frame_on<T: Transport>(
    session: &mut BusSession<'_, T>,
) -> Result<RawFrame, ReadError> {
    sleep_range_ms(SETTLE_MIN_MS, SETTLE_MAX_MS).await;

    session
        .send(&REQUEST_FRAME)
        .map_err(ReadError::RequestFailed)?;

    sleep_ms(PROCESSING_DELAY_MS).await;

    let bytes = session
        .receive::<FRAME_LEN>()
        .map_err(ReadError::IncompleteFrame)?;

    sleep_ms(BUS_SETTLE_MS).await;

    Ok(RawFrame::new(bytes))
}

/// Throwaway read after the handshake; the first frame can be stale.
pub async fn prime<T: Transport>(handle: &PeripheralHandle<T>) {
    let mut session = handle.lock().await;
    prime_on(&mut session).await;
}

pub async fn prime_on<T: Transport>(session: &mut BusSession<'_, T>) {
    match read_frame_on(session).await {
        Ok(frame) => debug!(
            "0x{:02x}: discarded initial frame {:02x?}",
            session.address(),
            frame.bytes()
        ),
        Err(e) => warn!(
            "0x{:02x}: failed initial read (errno {}): {}",
            session.address(),
            e.errno(),
            e
        ),
    }
}
