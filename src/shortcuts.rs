//! Keyboard shortcut chords and the actions they trigger.
//!
//! Chords are written like `ctrl+shift+r`. `cmd`/`command`/`meta`/`super` are
//! treated as Ctrl so the same table works on every platform. The whole table
//! is switched off when `keyboardShortcuts` is false in settings.

use std::fmt;

use thiserror::Error;

use crate::settings::Settings;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShortcutError {
    #[error("Empty shortcut")]
    Empty,
    #[error("Unsupported modifier token: {0}")]
    Modifier(String),
    #[error("Unsupported key: {0}")]
    Key(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    /// F1..F12
    Function(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chord {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub key: Key,
}

#[derive(Clone, Copy)]
enum Modifier {
    Ctrl,
    Shift,
    Alt,
}

fn parse_modifier_token(token: &str) -> Option<Modifier> {
    match token {
        "control" | "ctrl" | "command" | "cmd" | "super" | "meta" => Some(Modifier::Ctrl),
        "shift" => Some(Modifier::Shift),
        "alt" | "option" => Some(Modifier::Alt),
        _ => None,
    }
}

fn parse_key(token: &str) -> Result<Key, ShortcutError> {
    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphanumeric() {
            return Ok(Key::Char(c.to_ascii_lowercase()));
        }
    }
    token
        .strip_prefix('f')
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|n| (1..=12).contains(n))
        .map(Key::Function)
        .ok_or_else(|| ShortcutError::Key(token.to_string()))
}

impl Chord {
    pub const fn ctrl(key: char) -> Self {
        Self {
            ctrl: true,
            shift: false,
            alt: false,
            key: Key::Char(key),
        }
    }

    pub const fn ctrl_shift(key: char) -> Self {
        Self {
            ctrl: true,
            shift: true,
            alt: false,
            key: Key::Char(key),
        }
    }

    pub const fn function(n: u8) -> Self {
        Self {
            ctrl: false,
            shift: false,
            alt: false,
            key: Key::Function(n),
        }
    }

    /// Parses `ctrl+shift+r`, `Cmd+1`, `F1`, ... The last token is the key.
    pub fn parse(raw: &str) -> Result<Self, ShortcutError> {
        let tokens: Vec<String> = raw
            .split(|c: char| c == '+' || c.is_whitespace())
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        let Some((key, modifiers)) = tokens.split_last() else {
            return Err(ShortcutError::Empty);
        };

        let mut chord = Chord {
            ctrl: false,
            shift: false,
            alt: false,
            key: parse_key(key)?,
        };
        for token in modifiers {
            match parse_modifier_token(token) {
                Some(Modifier::Ctrl) => chord.ctrl = true,
                Some(Modifier::Shift) => chord.shift = true,
                Some(Modifier::Alt) => chord.alt = true,
                None => return Err(ShortcutError::Modifier(token.clone())),
            }
        }
        Ok(chord)
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.shift {
            f.write_str("Shift+")?;
        }
        if self.alt {
            f.write_str("Alt+")?;
        }
        match self.key {
            Key::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
            Key::Function(n) => write!(f, "F{n}"),
        }
    }
}

/// Controller action a shortcut can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    Capture,
    Upload,
    ClearResults,
    ToggleRegionMode,
    ToggleTesseract,
    ToggleEasyocr,
    Help,
}

impl ShortcutAction {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Capture => "Capture screen (or region in region mode)",
            Self::Upload => "Upload an image",
            Self::ClearResults => "Clear the current result",
            Self::ToggleRegionMode => "Toggle region mode",
            Self::ToggleTesseract => "Toggle Tesseract",
            Self::ToggleEasyocr => "Toggle EasyOCR",
            Self::Help => "Show shortcuts",
        }
    }
}

const BINDINGS: &[(Chord, ShortcutAction)] = &[
    (Chord::ctrl('s'), ShortcutAction::Capture),
    (Chord::ctrl('u'), ShortcutAction::Upload),
    (Chord::ctrl('r'), ShortcutAction::ClearResults),
    (Chord::ctrl_shift('r'), ShortcutAction::ToggleRegionMode),
    (Chord::ctrl('1'), ShortcutAction::ToggleTesseract),
    (Chord::ctrl('2'), ShortcutAction::ToggleEasyocr),
    (Chord::function(1), ShortcutAction::Help),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortcutMap {
    enabled: bool,
}

impl ShortcutMap {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            enabled: settings.keyboard_shortcuts,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Action bound to `chord`, or `None` when unbound or shortcuts are off.
    pub fn lookup(&self, chord: &Chord) -> Option<ShortcutAction> {
        if !self.enabled {
            return None;
        }
        BINDINGS
            .iter()
            .find(|(bound, _)| bound == chord)
            .map(|(_, action)| *action)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (Chord, ShortcutAction)> {
        BINDINGS.iter().copied()
    }

    pub fn help_text(&self) -> String {
        let mut out = String::from("Keyboard shortcuts");
        if !self.enabled {
            out.push_str(" (disabled in settings)");
        }
        out.push('\n');
        for (chord, action) in self.bindings() {
            out.push_str(&format!("  {:<14} {}\n", chord.to_string(), action.description()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(enabled: bool) -> ShortcutMap {
        ShortcutMap::from_settings(&Settings {
            keyboard_shortcuts: enabled,
            ..Settings::default()
        })
    }

    #[test]
    fn test_parse_is_case_insensitive_and_cmd_is_ctrl() {
        assert_eq!(Chord::parse("Ctrl+S").unwrap(), Chord::ctrl('s'));
        assert_eq!(Chord::parse("cmd + s").unwrap(), Chord::ctrl('s'));
        assert_eq!(Chord::parse("shift+CTRL+r").unwrap(), Chord::ctrl_shift('r'));
        assert_eq!(Chord::parse("f1").unwrap(), Chord::function(1));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Chord::parse("  "), Err(ShortcutError::Empty));
        assert_eq!(
            Chord::parse("hyper+s"),
            Err(ShortcutError::Modifier("hyper".into()))
        );
        assert_eq!(Chord::parse("ctrl+f13"), Err(ShortcutError::Key("f13".into())));
        assert_eq!(Chord::parse("ctrl+!"), Err(ShortcutError::Key("!".into())));
    }

    #[test]
    fn test_lookup_maps_every_binding() {
        let map = map(true);
        let cases = [
            ("ctrl+s", ShortcutAction::Capture),
            ("ctrl+u", ShortcutAction::Upload),
            ("ctrl+r", ShortcutAction::ClearResults),
            ("ctrl+shift+r", ShortcutAction::ToggleRegionMode),
            ("ctrl+1", ShortcutAction::ToggleTesseract),
            ("ctrl+2", ShortcutAction::ToggleEasyocr),
            ("F1", ShortcutAction::Help),
        ];
        for (raw, action) in cases {
            assert_eq!(map.lookup(&Chord::parse(raw).unwrap()), Some(action), "{raw}");
        }
        assert_eq!(map.lookup(&Chord::parse("ctrl+q").unwrap()), None);
        assert_eq!(map.lookup(&Chord::parse("s").unwrap()), None);
    }

    #[test]
    fn test_disabled_map_ignores_everything() {
        let map = map(false);
        assert_eq!(map.lookup(&Chord::ctrl('s')), None);
        assert!(map.help_text().contains("disabled"));
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(Chord::ctrl_shift('r').to_string(), "Ctrl+Shift+R");
        assert_eq!(Chord::function(1).to_string(), "F1");
    }
}
