use std::{
    collections::VecDeque,
    fmt,
    time::{Duration, Instant},
};

use chip8::{constants::KEY_COUNT, KeyCode};
use serde::Deserialize;
use smol_str::SmolStr;

/// Input mapper
///
/// Maps terminal key events to either Chip8 keycodes (suitable to be used in the VM),
/// or application specific named actions.
///
/// - *Chip8 Keycode*: These are the 16 keys of the old COSMAC VIP computer.
/// - *Named Action*: These are application specific input events that are
///   identified by a readable string.
///
/// Most terminals only report key presses and auto-repeats, never releases.
/// A Chip8 key is therefore held down until no press or repeat was seen for
/// the configured hold time, or until an explicit release arrives.
#[derive(Debug)]
pub struct InputMap {
    actions: Box<[InputInfo]>,
    /// Mapping of host keyboard keys to application actions, by index.
    keys: Box<[(HostKey, usize)]>,
    /// Buffer of collected events, as they happen.
    events: VecDeque<InputEvent>,
    /// When each Chip8 key was last seen pressed.
    held: [Option<Instant>; KEY_COUNT as usize],
    hold: Duration,
}

#[derive(Debug)]
struct InputInfo {
    chip8: Option<KeyCode>,
    action: Option<SmolStr>,
}

/// Mapping to make optional fields infallible.
impl From<&InputDef> for InputInfo {
    fn from(def: &InputDef) -> Self {
        Self {
            chip8: def.chip8,
            action: def.action.clone(),
        }
    }
}

/// One entry of the `keys` list in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct InputDef {
    pub chip8: Option<KeyCode>,
    pub action: Option<SmolStr>,
    pub keyboard_keys: Option<Vec<HostKey>>,
}

/// Terminal key, as named in the config file.
///
/// Either a single character, or one of `esc`, `enter`, `space`, `tab`, `backspace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum HostKey {
    Char(char),
    Esc,
    Enter,
    Space,
    Tab,
    Backspace,
}

impl TryFrom<String> for HostKey {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(' '), None) => Ok(HostKey::Space),
            (Some(c), None) => Ok(HostKey::Char(c.to_ascii_lowercase())),
            _ => match name.to_ascii_lowercase().as_str() {
                "esc" | "escape" => Ok(HostKey::Esc),
                "enter" | "return" => Ok(HostKey::Enter),
                "space" => Ok(HostKey::Space),
                "tab" => Ok(HostKey::Tab),
                "backspace" => Ok(HostKey::Backspace),
                _ => Err(format!("unknown keyboard key {name:?}")),
            },
        }
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(c) => write!(f, "{c}"),
            Self::Esc => write!(f, "esc"),
            Self::Enter => write!(f, "enter"),
            Self::Space => write!(f, "space"),
            Self::Tab => write!(f, "tab"),
            Self::Backspace => write!(f, "backspace"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Action(SmolStr),
    Chip8 { key: KeyCode, pressed: bool },
}

/// Named actions understood by the application.
pub mod actions {
    pub const EXIT: &str = "exit";
    pub const RESET: &str = "reset";
}

/// COSMAC VIP keypad laid over the left hand side of a QWERTY keyboard.
///
/// ```text
/// 1 2 3 C      1 2 3 4
/// 4 5 6 D  =>  q w e r
/// 7 8 9 E      a s d f
/// A 0 B F      z x c v
/// ```
#[rustfmt::skip]
const CONVENTIONAL_KEYMAP: [(char, KeyCode); 16] = [
    ('1', KeyCode::Key1), ('2', KeyCode::Key2), ('3', KeyCode::Key3), ('4', KeyCode::KeyC),
    ('q', KeyCode::Key4), ('w', KeyCode::Key5), ('e', KeyCode::Key6), ('r', KeyCode::KeyD),
    ('a', KeyCode::Key7), ('s', KeyCode::Key8), ('d', KeyCode::Key9), ('f', KeyCode::KeyE),
    ('z', KeyCode::KeyA), ('x', KeyCode::Key0), ('c', KeyCode::KeyB), ('v', KeyCode::KeyF),
];

/// Default key definitions, used when the config has none.
pub fn default_defs() -> Vec<InputDef> {
    let mut defs: Vec<InputDef> = CONVENTIONAL_KEYMAP
        .iter()
        .map(|(c, key)| InputDef {
            chip8: Some(*key),
            action: None,
            keyboard_keys: Some(vec![HostKey::Char(*c)]),
        })
        .collect();

    defs.push(InputDef {
        chip8: None,
        action: Some(actions::EXIT.into()),
        keyboard_keys: Some(vec![HostKey::Esc]),
    });
    defs.push(InputDef {
        chip8: None,
        action: Some(actions::RESET.into()),
        keyboard_keys: Some(vec![HostKey::Backspace]),
    });

    defs
}

impl InputMap {
    pub fn new(defs: &[InputDef], hold: Duration) -> Self {
        log::debug!("input definitions: {:#?}", defs);

        Self {
            actions: defs.iter().map(InputInfo::from).collect(),
            keys: Self::build_keys(defs),
            events: VecDeque::new(),
            held: [None; KEY_COUNT as usize],
            hold,
        }
    }

    /// Build a mapping of [`HostKey`]s to indices into the given action definition mapping.
    fn build_keys(defs: &[InputDef]) -> Box<[(HostKey, usize)]> {
        defs.iter()
            // definitions will be mapped by their index
            .enumerate()
            // lift keycodes out of the definitions
            .filter_map(|(index, def)| def.keyboard_keys.as_ref().map(|keys| (index, keys)))
            // flatten borrowed keycodes into one iterator of copied keycodes
            .flat_map(|(index, keys)| keys.iter().copied().map(move |keycode| (keycode, index)))
            .collect::<Vec<(HostKey, usize)>>()
            .into_boxed_slice()
    }

    /// Given a terminal key, find the definition it maps to.
    fn map_key(&self, key: HostKey) -> Option<&InputInfo> {
        self.keys
            .iter()
            .find(|(keycode, _)| *keycode == key)
            .and_then(|(_, index)| self.actions.get(*index))
    }

    /// Push key event into the input state.
    ///
    /// Repeats of a held Chip8 key only refresh its hold time.
    pub fn push_key(&mut self, key: HostKey, pressed: bool, now: Instant) {
        let (chip8, action) = match self.map_key(key) {
            Some(info) => (info.chip8, info.action.clone()),
            None => {
                log::trace!("no input mapping for {key}");
                return;
            }
        };

        if let Some(chip8_key) = chip8 {
            let slot = &mut self.held[chip8_key.as_u8() as usize];
            match (pressed, slot.is_some()) {
                (true, was_held) => {
                    *slot = Some(now);
                    if !was_held {
                        self.events.push_back(InputEvent::Chip8 {
                            key: chip8_key,
                            pressed: true,
                        });
                    }
                }
                (false, true) => {
                    *slot = None;
                    self.events.push_back(InputEvent::Chip8 {
                        key: chip8_key,
                        pressed: false,
                    });
                }
                (false, false) => {}
            }
        } else if let Some(action) = action {
            if pressed {
                self.events.push_back(InputEvent::Action(action));
            }
        }
    }

    /// Release every Chip8 key that has not been pressed for longer than the hold time.
    pub fn expire(&mut self, now: Instant) {
        for (key_id, slot) in self.held.iter_mut().enumerate() {
            if let Some(since) = *slot {
                if now.saturating_duration_since(since) >= self.hold {
                    *slot = None;
                    if let Ok(key) = KeyCode::try_from(key_id as u8) {
                        self.events
                            .push_back(InputEvent::Chip8 { key, pressed: false });
                    }
                }
            }
        }
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = InputEvent> + '_ {
        self.events.drain(..)
    }

    /// Forget all held keys and pending events.
    pub fn clear_state(&mut self) {
        self.held = [None; KEY_COUNT as usize];
        self.events.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn input_map() -> InputMap {
        InputMap::new(&default_defs(), Duration::from_millis(100))
    }

    #[test]
    fn test_press_and_expire() {
        let mut input = input_map();
        let t0 = Instant::now();

        input.push_key(HostKey::Char('q'), true, t0);
        // auto-repeat must not produce a second press
        input.push_key(HostKey::Char('q'), true, t0 + Duration::from_millis(50));
        input.expire(t0 + Duration::from_millis(120));

        let events: Vec<_> = input.drain_events().collect();
        assert_eq!(
            events,
            vec![InputEvent::Chip8 {
                key: KeyCode::Key4,
                pressed: true
            }]
        );

        input.expire(t0 + Duration::from_millis(151));
        let events: Vec<_> = input.drain_events().collect();
        assert_eq!(
            events,
            vec![InputEvent::Chip8 {
                key: KeyCode::Key4,
                pressed: false
            }]
        );
    }

    #[test]
    fn test_explicit_release() {
        let mut input = input_map();
        let t0 = Instant::now();

        input.push_key(HostKey::Char('v'), true, t0);
        input.push_key(HostKey::Char('v'), false, t0);
        input.push_key(HostKey::Char('v'), false, t0);
        input.expire(t0 + Duration::from_secs(1));

        let events: Vec<_> = input.drain_events().collect();
        assert_eq!(
            events,
            vec![
                InputEvent::Chip8 {
                    key: KeyCode::KeyF,
                    pressed: true
                },
                InputEvent::Chip8 {
                    key: KeyCode::KeyF,
                    pressed: false
                },
            ]
        );
    }

    #[test]
    fn test_actions() {
        let mut input = input_map();
        let now = Instant::now();

        input.push_key(HostKey::Esc, true, now);
        input.push_key(HostKey::Esc, false, now);
        input.push_key(HostKey::Char('p'), true, now);

        let events: Vec<_> = input.drain_events().collect();
        assert_eq!(events, vec![InputEvent::Action(actions::EXIT.into())]);
    }

    #[test]
    fn test_host_key_names() {
        assert_eq!(HostKey::try_from("Q".to_string()), Ok(HostKey::Char('q')));
        assert_eq!(HostKey::try_from("Esc".to_string()), Ok(HostKey::Esc));
        assert_eq!(HostKey::try_from(" ".to_string()), Ok(HostKey::Space));
        assert!(HostKey::try_from("f13".to_string()).is_err());
    }

    #[test]
    fn test_deserialize_defs() {
        let yaml = "
- chip8: 10
  keyboard_keys: ['j', 'space']
- action: exit
  keyboard_keys: ['esc']
";
        let defs: Vec<InputDef> = serde_yaml::from_str(yaml).unwrap();
        let mut input = InputMap::new(&defs, Duration::from_millis(100));
        input.push_key(HostKey::Space, true, Instant::now());
        input.push_key(HostKey::Esc, true, Instant::now());

        let events: Vec<_> = input.drain_events().collect();
        assert_eq!(
            events,
            vec![
                InputEvent::Chip8 {
                    key: KeyCode::KeyA,
                    pressed: true
                },
                InputEvent::Action(actions::EXIT.into()),
            ]
        );
    }

    #[test]
    fn test_reject_invalid_keycode() {
        let yaml = "- chip8: 16\n  keyboard_keys: ['j']\n";
        assert!(serde_yaml::from_str::<Vec<InputDef>>(yaml).is_err());
    }
}
