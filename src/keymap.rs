//! Terminfo bootstrap (component F): one-shot query for the symbolic key
//! sequences and the alternate-character-set map, resolved once at
//! startup under `TERM=ansi` and cached as two immutable tables.

use std::collections::HashMap;
use std::env;

use anyhow::{Context, Result};
use terminfo::{capability as cap, Database};

/// The symbolic keys forwarded to the PTY, standing in for curses
/// keycodes (`symbolic_keymapping` in the distillation's source) since
/// `crossterm` reports keys as a structured enum rather than an int.
/// `0xb3` is deliberately absent — it's the reserved mode-toggle key and
/// never reaches the keymap lookup (see `session.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialKey {
    Enter,
    Left,
    Down,
    Right,
    Up,
    Home,
    Insert,
    Backspace,
    PageUp,
    PageDown,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
}

const SYMBOLIC_KEYS: &[(SpecialKey, &str)] = &[
    (SpecialKey::Enter, "cr"),
    (SpecialKey::Left, "kcub1"),
    (SpecialKey::Down, "kcud1"),
    (SpecialKey::Right, "kcuf1"),
    (SpecialKey::Up, "kcuu1"),
    (SpecialKey::Home, "khome"),
    (SpecialKey::Insert, "kich1"),
    (SpecialKey::Backspace, "kbs"),
    (SpecialKey::PageUp, "kpp"),
    (SpecialKey::PageDown, "knp"),
    (SpecialKey::F1, "kf1"),
    (SpecialKey::F2, "kf2"),
    (SpecialKey::F3, "kf3"),
    (SpecialKey::F4, "kf4"),
    (SpecialKey::F5, "kf5"),
    (SpecialKey::F6, "kf6"),
    (SpecialKey::F7, "kf7"),
    (SpecialKey::F8, "kf8"),
    (SpecialKey::F9, "kf9"),
];

/// Fixed VT100 glyph-name -> plain-glyph table. The original composes
/// this with `acsc` against real curses `ACS_*` constants; since our
/// CellCanvas stores single-byte glyphs rather than curses chtypes, each
/// VT100 name resolves to a plain ASCII line-drawing stand-in instead.
fn vt100_acs_table() -> HashMap<u8, u8> {
    [
        (b'l', b'+'), (b'm', b'+'), (b'k', b'+'), (b'j', b'+'),
        (b't', b'+'), (b'u', b'+'), (b'v', b'+'), (b'w', b'+'),
        (b'q', crate::canvas::HLINE), (b'x', crate::canvas::VLINE),
        (b'n', b'+'), (b'o', b'-'), (b's', b'_'),
        (b'`', b'+'), (b'a', b'#'), (b'f', b'\''), (b'~', b'o'),
        (b',', b'<'), (b'+', b'>'), (b'.', b'v'), (b'-', b'^'),
        (b'h', b'#'), (b'i', b'#'), (b'p', b'-'), (b'r', b'_'),
        (b'y', b'<'), (b'z', b'>'), (b'{', b'p'), (b'|', b'!'),
        (b'}', b'f'),
    ]
    .into_iter()
    .collect()
}

/// Resolved tables the session holds for its whole lifetime.
pub struct Keymap {
    /// Special key -> raw bytes to write to the PTY, with `\E` already
    /// substituted for ESC.
    pub sequences: HashMap<SpecialKey, Vec<u8>>,
    /// Host-sent byte (while in graphics mode) -> resolved glyph.
    pub acs_map: HashMap<u8, u8>,
}

fn capability_bytes(db: &Database, name: &str) -> Option<Vec<u8>> {
    macro_rules! lookup {
        ($cap:ty) => {
            db.get::<$cap>().map(|c| c.as_ref().to_vec())
        };
    }
    match name {
        "cr" => lookup!(cap::CarriageReturn),
        "kcub1" => lookup!(cap::KeyLeft),
        "kcud1" => lookup!(cap::KeyDown),
        "kcuf1" => lookup!(cap::KeyRight),
        "kcuu1" => lookup!(cap::KeyUp),
        "khome" => lookup!(cap::KeyHome),
        "kich1" => lookup!(cap::KeyInsert),
        "kbs" => lookup!(cap::KeyBackspace),
        "kpp" => lookup!(cap::KeyPreviousPage),
        "knp" => lookup!(cap::KeyNextPage),
        "kf1" => lookup!(cap::KeyF1),
        "kf2" => lookup!(cap::KeyF2),
        "kf3" => lookup!(cap::KeyF3),
        "kf4" => lookup!(cap::KeyF4),
        "kf5" => lookup!(cap::KeyF5),
        "kf6" => lookup!(cap::KeyF6),
        "kf7" => lookup!(cap::KeyF7),
        "kf8" => lookup!(cap::KeyF8),
        "kf9" => lookup!(cap::KeyF9),
        _ => None,
    }
}

impl Keymap {
    /// Resolve under `TERM=ansi`, then restore the caller's `TERM`. The
    /// lookup itself never touches the live session's environment beyond
    /// this bracketed window.
    pub fn bootstrap() -> Result<Self> {
        let old_term = env::var("TERM").ok();
        env::set_var("TERM", "ansi");
        let result = Self::load();
        match old_term {
            Some(t) => env::set_var("TERM", t),
            None => env::remove_var("TERM"),
        }
        result
    }

    fn load() -> Result<Self> {
        let db = Database::from_name("ansi").context("loading terminfo for TERM=ansi")?;

        let mut sequences = HashMap::new();
        for (code, name) in SYMBOLIC_KEYS {
            if let Some(bytes) = capability_bytes(&db, name) {
                let resolved = substitute_esc(&bytes);
                sequences.insert(*code, resolved);
            }
        }

        let acsc = db
            .get::<cap::AcsChars>()
            .map(|c| c.as_ref().to_vec())
            .unwrap_or_default();
        let vt100_to_glyph = vt100_acs_table();
        // acsc pairs are (vt100_name, host_char) repeating; the host
        // byte is what the child actually sends while in graphics mode.
        let mut acs_map = HashMap::new();
        for pair in acsc.chunks_exact(2) {
            let (vt100_name, host_char) = (pair[0], pair[1]);
            if let Some(glyph) = vt100_to_glyph.get(&vt100_name) {
                acs_map.insert(host_char, *glyph);
            }
        }

        Ok(Keymap { sequences, acs_map })
    }
}

/// Replace literal `\E` escape markers some terminfo strings use with the
/// real ESC byte, matching the original's `.replace(b"\\E", ESC)`.
fn substitute_esc(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'E') {
            out.push(0x1b);
            i += 2;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_esc_replaces_literal_marker() {
        assert_eq!(substitute_esc(b"\\E[A"), vec![0x1b, b'[', b'A']);
    }

    #[test]
    fn substitute_esc_leaves_plain_bytes_alone() {
        assert_eq!(substitute_esc(b"\r"), vec![b'\r']);
    }

    #[test]
    fn vt100_table_maps_hline_and_vline() {
        let table = vt100_acs_table();
        assert_eq!(table[&b'q'], crate::canvas::HLINE);
        assert_eq!(table[&b'x'], crate::canvas::VLINE);
    }
}
