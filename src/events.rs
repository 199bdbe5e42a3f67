//! Discrete press/release events derived from successive snapshots.

use std::fmt;

use crate::decoder::ButtonState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    C,
    Z,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: Button,
    pub transition: Transition,
}

impl fmt::Display for ButtonEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let transition = match self.transition {
            Transition::Pressed => "pressed",
            Transition::Released => "released",
        };
        write!(f, "Button {:?} {}", self.button, transition)
    }
}

/// Events for every button whose state changed, C first.
pub fn diff(previous: &ButtonState, current: &ButtonState) -> Vec<ButtonEvent> {
    let pairs = [
        (Button::C, previous.c_pressed, current.c_pressed),
        (Button::Z, previous.z_pressed, current.z_pressed),
    ];

    pairs
        .into_iter()
        .filter(|(_, before, after)| before != after)
        .map(|(button, _, after)| ButtonEvent {
            button,
            transition: if after {
                Transition::Pressed
            } else {
                Transition::Released
            },
        })
        .collect()
}
