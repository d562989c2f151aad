//! IO device interface
//!
//! The virtual machine knows nothing about how pixels reach a screen, where key
//! presses come from or how a tone is produced. The host plugs those in through
//! the traits in this module.
use crate::constants::*;

/// Display output.
pub trait Screen {
    /// Width of the logical pixel grid.
    fn width(&self) -> usize;

    /// Height of the logical pixel grid.
    fn height(&self) -> usize;

    /// Blit the display buffer to screen output.
    ///
    /// The buffer is laid out row by row, indexed by `x + y * width`,
    /// with each cell either 0 or 1. Its length is always `width() * height()`.
    fn draw(&mut self, display: &[u8]);
}

/// Keyboard input.
pub trait Keypad {
    /// Checks immediately whether the given key is currently pressed.
    fn is_pressed(&self, key: KeyCode) -> bool;
}

/// Sound output, driven by the sound timer.
pub trait Buzzer {
    /// Turn the tone on.
    fn start(&mut self);

    /// Turn the tone off.
    fn stop(&mut self);
}

/// Set of pressed keys. Pressed is a 1 bit, released is a 0 bit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KeyState(u16);

impl KeyState {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            self.0 |= 1 << key.as_u8();
        } else {
            self.0 &= !(1 << key.as_u8());
        }
    }

    /// Check whether any key is pressed down.
    #[inline(always)]
    pub fn any(&self) -> bool {
        self.0 > 0
    }

    /// Retrieve the first key that is pressed down.
    pub fn first(&self) -> Option<KeyCode> {
        self.iter().next()
    }

    /// Iterate the pressed keys, in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = KeyCode> + '_ {
        (0..KEY_COUNT)
            .filter_map(|k| KeyCode::try_from(k).ok())
            .filter(|k| self.is_pressed(*k))
    }

    /// Set all keys to up.
    #[inline(always)]
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Raw bit set.
    pub fn bits(&self) -> u16 {
        self.0
    }
}

impl Keypad for KeyState {
    #[inline]
    fn is_pressed(&self, key: KeyCode) -> bool {
        self.0 & (1 << key.as_u8()) > 0
    }
}

/// Buzzer that discards every request, for headless runs.
#[derive(Debug, Default)]
pub struct Mute;

impl Buzzer for Mute {
    fn start(&mut self) {}
    fn stop(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum KeyCode {
    Key0 = 0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF = 0xF,
}

impl KeyCode {
    #[inline(always)]
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Map the low nibble of a register value to a key.
    #[inline]
    pub fn from_nibble(value: u8) -> Self {
        match value & 0xF {
            0 => Self::Key0,
            1 => Self::Key1,
            2 => Self::Key2,
            3 => Self::Key3,
            4 => Self::Key4,
            5 => Self::Key5,
            6 => Self::Key6,
            7 => Self::Key7,
            8 => Self::Key8,
            9 => Self::Key9,
            10 => Self::KeyA,
            11 => Self::KeyB,
            12 => Self::KeyC,
            13 => Self::KeyD,
            14 => Self::KeyE,
            _ => Self::KeyF,
        }
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let key_id = self.as_u8();
        write!(f, "k{key_id:x}")
    }
}

impl From<KeyCode> for u8 {
    fn from(keycode: KeyCode) -> Self {
        keycode.as_u8()
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = InvalidKeyCode;

    fn try_from(key_id: u8) -> Result<Self, Self::Error> {
        if key_id < KEY_COUNT {
            Ok(Self::from_nibble(key_id))
        } else {
            Err(InvalidKeyCode)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidKeyCode;

impl std::error::Error for InvalidKeyCode {}

impl std::fmt::Display for InvalidKeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "keycode must be in range 0 <= keycode < 16")
    }
}

#[cfg(feature = "serde")]
mod de {
    use std::fmt::Display;

    use serde::de::{Deserialize, Error, Expected, Unexpected, Visitor};

    use super::*;

    impl Expected for InvalidKeyCode {
        fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            <Self as Display>::fmt(self, f)
        }
    }

    impl<'de> Deserialize<'de> for KeyCode {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            // YAML integer type
            deserializer.deserialize_i64(KeyCodeVisitor)
        }
    }

    struct KeyCodeVisitor;

    impl<'de> Visitor<'de> for KeyCodeVisitor {
        type Value = KeyCode;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "an integer between 0 and 15")
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            u8::try_from(v)
                .ok()
                .and_then(|k| KeyCode::try_from(k).ok())
                .ok_or_else(|| E::invalid_value(Unexpected::Signed(v), &InvalidKeyCode))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            u8::try_from(v)
                .ok()
                .and_then(|k| KeyCode::try_from(k).ok())
                .ok_or_else(|| E::invalid_value(Unexpected::Unsigned(v), &InvalidKeyCode))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_key_state() {
        let mut keys = KeyState::default();

        keys.set(KeyCode::Key0, true);
        assert_eq!(keys.bits(), 0b00000000_00000001);
        assert!(keys.is_pressed(KeyCode::Key0));
        assert!(!keys.is_pressed(KeyCode::Key1));
        assert!(!keys.is_pressed(KeyCode::Key7));

        keys.set(KeyCode::Key7, true);
        assert_eq!(keys.bits(), 0b00000000_10000001);
        assert!(keys.is_pressed(KeyCode::Key0));
        assert!(keys.is_pressed(KeyCode::Key7));

        keys.set(KeyCode::Key0, false);
        assert_eq!(keys.bits(), 0b00000000_10000000);
        assert!(!keys.is_pressed(KeyCode::Key0));
        assert!(keys.is_pressed(KeyCode::Key7));

        keys.set(KeyCode::KeyF, true);
        assert_eq!(keys.bits(), 0b10000000_10000000);
        assert!(keys.is_pressed(KeyCode::KeyF));
        assert_eq!(keys.first(), Some(KeyCode::Key7));
        assert_eq!(
            keys.iter().collect::<Vec<_>>(),
            vec![KeyCode::Key7, KeyCode::KeyF]
        );

        keys.clear();
        assert!(!keys.any());
        assert_eq!(keys.first(), None);
    }

    #[test]
    fn test_keycode_conversion() {
        for k in 0..KEY_COUNT {
            let key = KeyCode::try_from(k).unwrap();
            assert_eq!(u8::from(key), k);
        }
        assert_eq!(KeyCode::try_from(16), Err(InvalidKeyCode));
        assert_eq!(KeyCode::from_nibble(0x1A), KeyCode::KeyA);
        assert_eq!(KeyCode::KeyB.to_string(), "kb");
    }
}
