use std::fmt;

pub const FRAME_LEN: usize = 6;

/// Index of the byte carrying the button bits.
const BUTTON_BYTE: usize = 5;
const Z_RELEASED: u8 = 1 << 0;
const C_RELEASED: u8 = 1 << 1;

/// One unparsed response from the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame([u8; FRAME_LEN]);

impl RawFrame {
    pub fn new(bytes: [u8; FRAME_LEN]) -> Self {
        RawFrame(bytes)
    }

    pub fn bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonState {
    pub c_pressed: bool,
    pub z_pressed: bool,
}

impl ButtonState {
    pub const fn released() -> Self {
        ButtonState {
            c_pressed: false,
            z_pressed: false,
        }
    }
}

impl fmt::Display for ButtonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "C = {}, Z = {}",
            self.c_pressed as u8, self.z_pressed as u8
        )
    }
}

/// Buttons are active low: a set bit means released.
pub fn decode(frame: &RawFrame) -> ButtonState {
    let bits = frame.0[BUTTON_BYTE];
    ButtonState {
        c_pressed: bits & C_RELEASED == 0,
        z_pressed: bits & Z_RELEASED == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(last: u8) -> RawFrame {
        RawFrame::new([0x7f, 0x80, 0x12, 0x34, 0x56, last])
    }

    #[test]
    fn test_both_pressed() {
        assert_eq!(
            decode(&frame(0b00)),
            ButtonState { c_pressed: true, z_pressed: true }
        );
    }

    #[test]
    fn test_c_pressed_only() {
        assert_eq!(
            decode(&frame(0b01)),
            ButtonState { c_pressed: true, z_pressed: false }
        );
    }

    #[test]
    fn test_z_pressed_only() {
        assert_eq!(
            decode(&frame(0b10)),
            ButtonState { c_pressed: false, z_pressed: true }
        );
    }

    #[test]
    fn test_released() {
        assert_eq!(decode(&RawFrame::new([0xff; 6])), ButtonState::released());
    }

    #[test]
    fn test_every_button_byte() {
        for b in 0..=u8::MAX {
            let f = frame(b);
            let state = decode(&f);
            assert_eq!(state.z_pressed, b & 0b01 == 0);
            assert_eq!(state.c_pressed, b & 0b10 == 0);
            assert_eq!(decode(&f), state);
        }
    }

    #[test]
    fn test_accelerometer_bits_ignored() {
        // upper six bits of byte 5 carry accelerometer LSBs
        assert_eq!(decode(&frame(0b1111_1100)), decode(&frame(0b00)));
    }

    #[test]
    fn test_display() {
        let state = ButtonState { c_pressed: true, z_pressed: false };
        assert_eq!(state.to_string(), "C = 1, Z = 0");
    }
}
