//! Nunchuk Controller - protocol core for a two-button handheld accessory on I2C
//!
//! Brings the peripheral into raw output mode, reads its 6-byte status frame on a
//! fixed schedule and publishes the decoded button state to the host.

pub mod bus;
pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod events;
pub mod handshake;
pub mod poller;
pub mod reader;
pub mod timing;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use bus::{HalTransport, PeripheralHandle, Transport};
pub use decoder::{decode, ButtonState, RawFrame};
pub use device::{Device, DeviceState};
pub use error::{BusError, DeviceError, InitError, ReadError};
pub use poller::PollSettings;
