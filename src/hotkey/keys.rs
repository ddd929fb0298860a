//! Modifier and key definitions
//!
//! Provides the modifier and key identifiers a hotkey is built from, the
//! process-wide name lookup table, and parsing of `ctrl+shift+KeyS` style
//! combinations.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Errors from parsing modifier, key or combination names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown key name: {0}")]
    UnknownKey(String),

    #[error("unknown modifier name: {0}")]
    UnknownModifier(String),

    #[error("combination has no key: {0}")]
    MissingKey(String),

    #[error("combination has more than one key: {0}")]
    MultipleKeys(String),

    #[error("modifier {0} listed twice")]
    DuplicateModifier(Modifier),
}

/// Auxiliary key held together with the main key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Modifier {
    /// Control key
    Ctrl,
    /// Shift key
    Shift,
    /// Alt/Option key
    Alt,
    /// Command/Super key
    Cmd,
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Ctrl => write!(f, "Ctrl"),
            Modifier::Shift => write!(f, "Shift"),
            Modifier::Alt => write!(f, "Alt"),
            Modifier::Cmd => write!(f, "Cmd"),
        }
    }
}

impl FromStr for Modifier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => Ok(Modifier::Ctrl),
            "shift" => Ok(Modifier::Shift),
            "alt" | "option" | "opt" => Ok(Modifier::Alt),
            "cmd" | "command" | "super" | "meta" => Ok(Modifier::Cmd),
            _ => Err(ParseError::UnknownModifier(s.to_string())),
        }
    }
}

/// Generates `Key`, its table name and display label from one list
macro_rules! keys {
    ($($variant:ident => $name:literal, $label:literal;)*) => {
        /// Main key of a hotkey combination
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Key {
            $($variant,)*
        }

        impl Key {
            /// Every key, in lookup table order
            pub const ALL: &'static [Key] = &[$(Key::$variant),*];

            /// Name of this key in [`KEY_MAP`], e.g. `KeyS`
            pub fn name(self) -> &'static str {
                match self {
                    $(Key::$variant => $name,)*
                }
            }

            /// Short label used when displaying a hotkey, e.g. `S`
            pub fn label(self) -> &'static str {
                match self {
                    $(Key::$variant => $label,)*
                }
            }
        }
    };
}

keys! {
    Space => "KeySpace", "Space";
    Num1 => "Key1", "1";
    Num2 => "Key2", "2";
    Num3 => "Key3", "3";
    Num4 => "Key4", "4";
    Num5 => "Key5", "5";
    Num6 => "Key6", "6";
    Num7 => "Key7", "7";
    Num8 => "Key8", "8";
    Num9 => "Key9", "9";
    Num0 => "Key0", "0";
    A => "KeyA", "A";
    B => "KeyB", "B";
    C => "KeyC", "C";
    D => "KeyD", "D";
    E => "KeyE", "E";
    F => "KeyF", "F";
    G => "KeyG", "G";
    H => "KeyH", "H";
    I => "KeyI", "I";
    J => "KeyJ", "J";
    K => "KeyK", "K";
    L => "KeyL", "L";
    M => "KeyM", "M";
    N => "KeyN", "N";
    O => "KeyO", "O";
    P => "KeyP", "P";
    Q => "KeyQ", "Q";
    R => "KeyR", "R";
    S => "KeyS", "S";
    T => "KeyT", "T";
    U => "KeyU", "U";
    V => "KeyV", "V";
    W => "KeyW", "W";
    X => "KeyX", "X";
    Y => "KeyY", "Y";
    Z => "KeyZ", "Z";
    Return => "KeyReturn", "Return";
    Escape => "KeyEscape", "Escape";
    Delete => "KeyDelete", "Delete";
    Tab => "KeyTab", "Tab";
    Left => "KeyLeft", "Left";
    Right => "KeyRight", "Right";
    Up => "KeyUp", "Up";
    Down => "KeyDown", "Down";
    F1 => "KeyF1", "F1";
    F2 => "KeyF2", "F2";
    F3 => "KeyF3", "F3";
    F4 => "KeyF4", "F4";
    F5 => "KeyF5", "F5";
    F6 => "KeyF6", "F6";
    F7 => "KeyF7", "F7";
    F8 => "KeyF8", "F8";
    F9 => "KeyF9", "F9";
    F10 => "KeyF10", "F10";
    F11 => "KeyF11", "F11";
    F12 => "KeyF12", "F12";
    F13 => "KeyF13", "F13";
    F14 => "KeyF14", "F14";
    F15 => "KeyF15", "F15";
    F16 => "KeyF16", "F16";
    F17 => "KeyF17", "F17";
    F18 => "KeyF18", "F18";
    F19 => "KeyF19", "F19";
    F20 => "KeyF20", "F20";
}

/// Read-only lookup from key names (`KeyA`, `KeyF1`, ...) to keys
pub static KEY_MAP: LazyLock<HashMap<&'static str, Key>> =
    LazyLock::new(|| Key::ALL.iter().map(|key| (key.name(), *key)).collect());

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Key {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for Key {
    type Err = ParseError;

    /// Accepts table names (`KeyS`) and display labels (`S`, `s`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(key) = KEY_MAP.get(s) {
            return Ok(*key);
        }
        Key::ALL
            .iter()
            .find(|key| key.label().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| ParseError::UnknownKey(s.to_string()))
    }
}

/// Order-insignificant identity of a hotkey: modifier set plus key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Combination {
    modifiers: BTreeSet<Modifier>,
    key: Key,
}

impl Combination {
    pub fn new(modifiers: impl IntoIterator<Item = Modifier>, key: Key) -> Self {
        Self {
            modifiers: modifiers.into_iter().collect(),
            key,
        }
    }

    pub fn modifiers(&self) -> &BTreeSet<Modifier> {
        &self.modifiers
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn has(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        for modifier in &self.modifiers {
            write!(f, "+{}", modifier)?;
        }
        Ok(())
    }
}

/// Parse a `+`-separated combination such as `ctrl+shift+KeyS`.
///
/// Modifiers keep the order they were written in. Exactly one key is
/// required, in any position.
pub fn parse_combination(s: &str) -> Result<(Vec<Modifier>, Key), ParseError> {
    let mut modifiers = Vec::new();
    let mut key = None;

    for part in s.split('+').map(str::trim).filter(|p| !p.is_empty()) {
        if let Ok(modifier) = part.parse::<Modifier>() {
            if modifiers.contains(&modifier) {
                return Err(ParseError::DuplicateModifier(modifier));
            }
            modifiers.push(modifier);
            continue;
        }

        let parsed = part.parse::<Key>()?;
        if key.replace(parsed).is_some() {
            return Err(ParseError::MultipleKeys(s.to_string()));
        }
    }

    let key = key.ok_or_else(|| ParseError::MissingKey(s.to_string()))?;
    Ok((modifiers, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_map_contents() {
        let names = [
            "KeySpace", "Key1", "Key2", "Key3", "Key4", "Key5", "Key6", "Key7", "Key8", "Key9",
            "Key0", "KeyA", "KeyB", "KeyC", "KeyD", "KeyE", "KeyF", "KeyG", "KeyH", "KeyI",
            "KeyJ", "KeyK", "KeyL", "KeyM", "KeyN", "KeyO", "KeyP", "KeyQ", "KeyR", "KeyS",
            "KeyT", "KeyU", "KeyV", "KeyW", "KeyX", "KeyY", "KeyZ", "KeyReturn", "KeyEscape",
            "KeyDelete", "KeyTab", "KeyLeft", "KeyRight", "KeyUp", "KeyDown", "KeyF1", "KeyF2",
            "KeyF3", "KeyF4", "KeyF5", "KeyF6", "KeyF7", "KeyF8", "KeyF9", "KeyF10", "KeyF11",
            "KeyF12", "KeyF13", "KeyF14", "KeyF15", "KeyF16", "KeyF17", "KeyF18", "KeyF19",
            "KeyF20",
        ];

        assert_eq!(KEY_MAP.len(), names.len());
        for name in names {
            let key = KEY_MAP.get(name).unwrap_or_else(|| panic!("{} missing", name));
            assert_eq!(key.name(), name);
        }
    }

    #[test]
    fn test_key_from_str() {
        assert_eq!("KeyS".parse::<Key>(), Ok(Key::S));
        assert_eq!("s".parse::<Key>(), Ok(Key::S));
        assert_eq!("F12".parse::<Key>(), Ok(Key::F12));
        assert_eq!("space".parse::<Key>(), Ok(Key::Space));
        assert_eq!(
            "KeyF21".parse::<Key>(),
            Err(ParseError::UnknownKey("KeyF21".to_string()))
        );
    }

    #[test]
    fn test_modifier_aliases() {
        assert_eq!("control".parse::<Modifier>(), Ok(Modifier::Ctrl));
        assert_eq!("Option".parse::<Modifier>(), Ok(Modifier::Alt));
        assert_eq!("SUPER".parse::<Modifier>(), Ok(Modifier::Cmd));
        assert!("hyper".parse::<Modifier>().is_err());
    }

    #[test]
    fn test_parse_combination_keeps_order() {
        let (mods, key) = parse_combination("shift+ctrl+KeyS").unwrap();
        assert_eq!(mods, vec![Modifier::Shift, Modifier::Ctrl]);
        assert_eq!(key, Key::S);

        let (mods, key) = parse_combination(" F5 ").unwrap();
        assert!(mods.is_empty());
        assert_eq!(key, Key::F5);
    }

    #[test]
    fn test_parse_combination_errors() {
        assert_eq!(
            parse_combination("ctrl+shift"),
            Err(ParseError::MissingKey("ctrl+shift".to_string()))
        );
        assert_eq!(
            parse_combination("ctrl+KeyA+KeyB"),
            Err(ParseError::MultipleKeys("ctrl+KeyA+KeyB".to_string()))
        );
        assert_eq!(
            parse_combination("ctrl+control+KeyA"),
            Err(ParseError::DuplicateModifier(Modifier::Ctrl))
        );
        assert!(matches!(
            parse_combination("ctrl+Bogus"),
            Err(ParseError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_combination_ignores_modifier_order() {
        let a = Combination::new([Modifier::Ctrl, Modifier::Shift], Key::S);
        let b = Combination::new([Modifier::Shift, Modifier::Ctrl], Key::S);
        assert_eq!(a, b);
        assert!(a.has(Modifier::Ctrl));
        assert!(!a.has(Modifier::Alt));
        assert_ne!(a, Combination::new([Modifier::Ctrl], Key::S));
    }

    #[test]
    fn test_key_serializes_as_table_name() {
        let json = serde_json::to_string(&Key::F1).unwrap();
        assert_eq!(json, "\"KeyF1\"");
        let key: Key = serde_json::from_str("\"KeyReturn\"").unwrap();
        assert_eq!(key, Key::Return);
    }
}
