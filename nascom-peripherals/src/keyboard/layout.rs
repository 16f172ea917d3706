/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
use core::fmt;

use super::{KeyChord, KeyCoord, MATRIX_ROWS};

const NO_CAP: u8 = 0;

/// Characters on the unshifted key caps, by matrix row and column.
const KEY_CAPS: [[u8; 7]; MATRIX_ROWS] = [
    [b'-', NO_CAP, NO_CAP, NO_CAP, NO_CAP, b'@', NO_CAP],
    [b'H', b'B',   b'5',   b'F',   b'X',   b'T', NO_CAP],
    [b'J', b'N',   b'6',   b'D',   b'Z',   b'Y', NO_CAP],
    [b'K', b'M',   b'7',   b'E',   b'S',   b'U', NO_CAP],
    [b'L', b',',   b'8',   b'W',   b'A',   b'I', NO_CAP],
    [b';', b'.',   b'9',   b'3',   b'Q',   b'O', NO_CAP],
    [b':', b'/',   b'0',   b'2',   b'1',   b'P', b'['],
    [b'G', b'V',   b'4',   b'C',   b'R',   b' ', b']'],
];

/// (character, key cap) pairs typed with `SHIFT`.
const SHIFT_REMAP: &[(u8, u8)] = &[
    (b'!', b'1'), (b'"', b'2'), (b'#', b'3'), (b'$', b'4'), (b'%', b'5'),
    (b'&', b'6'), (b'\'', b'7'), (b'(', b'8'), (b')', b'9'), (b'_', b'0'),
    (b'=', b'-'), (b'<', b','), (b'>', b'.'), (b'+', b';'), (b'*', b':'),
    (b'?', b'/'), (b'{', b'['), (b'}', b']'),
];

/// (character, key cap) pairs typed with `CTRL`.
const CTRL_REMAP: &[(u8, u8)] = &[
    (b'\\', b'/'), (b'^', b'-'),
];

/// (character, key cap) pairs typed with both `SHIFT` and `CTRL`.
const SHIFT_CTRL_REMAP: &[(u8, u8)] = &[
    (b'|', b'/'), (b'~', b'-'), (b'`', b'@'),
];

const ASCII_LEN: usize = 0x80;
const CONTROL_LEN: usize = 0x20;

/// Resolves host characters to NASCOM keyboard chords.
///
/// * Uppercase letters and `@` are typed with `SHIFT`.
/// * Lowercase letters and other characters on the key caps are typed without modifiers.
/// * Remaining printable characters are looked up in turn in the `SHIFT`, `CTRL` and
///   `SHIFT`+`CTRL` tables.
/// * Control characters `0x00..0x20` are looked up in a table of chords, e.g. `0x0D` is `ENTER`
///   and `0x03` is `CTRL`+`C`.
///
/// Any other character does not resolve to a key.
#[derive(Clone)]
pub struct KeyMapping {
    caps: [Option<KeyCoord>; ASCII_LEN],
    shifted: [Option<KeyCoord>; ASCII_LEN],
    ctrl: [Option<KeyCoord>; ASCII_LEN],
    shift_ctrl: [Option<KeyCoord>; ASCII_LEN],
    control: [Option<KeyChord>; CONTROL_LEN],
}

impl Default for KeyMapping {
    fn default() -> Self {
        KeyMapping::new()
    }
}

impl fmt::Debug for KeyMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMapping").finish_non_exhaustive()
    }
}

impl KeyMapping {
    pub fn new() -> Self {
        let mut caps = [None; ASCII_LEN];
        for (row, line) in KEY_CAPS.iter().enumerate() {
            for (col, &cap) in line.iter().enumerate() {
                if cap != NO_CAP {
                    caps[cap as usize] = Some(KeyCoord::new(row as u8, col as u8));
                }
            }
        }
        let remap = |pairs: &[(u8, u8)]| {
            let mut table = [None; ASCII_LEN];
            for &(ch, cap) in pairs {
                table[ch as usize] = caps[cap as usize];
            }
            table
        };
        let shifted = remap(SHIFT_REMAP);
        let ctrl = remap(CTRL_REMAP);
        let shift_ctrl = remap(SHIFT_CTRL_REMAP);

        let mut control = [None; CONTROL_LEN];
        for (code, chord) in control.iter_mut().enumerate() {
            *chord = match code as u8 {
                0x08 => Some(KeyChord::plain(KeyCoord::BACKSPACE)),
                0x0A|0x0D => Some(KeyChord::plain(KeyCoord::ENTER)),
                0x1C|0x1E|0x1F => None,
                code => caps[(code | 0x40) as usize].map(KeyChord::with_ctrl)
            };
        }
        KeyMapping { caps, shifted, ctrl, shift_ctrl, control }
    }
    /// Returns the chord producing `ch`, or `None` if `ch` can not be typed.
    pub fn resolve(&self, ch: char) -> Option<KeyChord> {
        let code = u32::from(ch) as usize;
        if code < CONTROL_LEN {
            return self.control[code]
        }
        if code >= ASCII_LEN {
            return None
        }
        let byte = code as u8;
        if byte.is_ascii_uppercase() || byte == b'@' {
            return self.caps[code].map(KeyChord::shifted)
        }
        self.caps[byte.to_ascii_uppercase() as usize].map(KeyChord::plain)
        .or_else(|| self.shifted[code].map(KeyChord::shifted))
        .or_else(|| self.ctrl[code].map(KeyChord::with_ctrl))
        .or_else(|| self.shift_ctrl[code].map(KeyChord::with_shift_ctrl))
    }
    /// Returns the key with `cap` engraved on it, if any.
    pub fn key_cap(&self, cap: char) -> Option<KeyCoord> {
        let code = u32::from(cap) as usize;
        self.caps.get(code).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_mapping_resolves_letters() {
        let mapping = KeyMapping::new();
        assert_eq!(mapping.resolve('A'), Some(KeyChord::shifted(KeyCoord::new(4, 4))));
        assert_eq!(mapping.resolve('a'), Some(KeyChord::plain(KeyCoord::new(4, 4))));
        assert_eq!(mapping.resolve('@'), Some(KeyChord::shifted(KeyCoord::AT)));
        assert_eq!(mapping.resolve('z'), Some(KeyChord::plain(KeyCoord::new(2, 4))));
        for ch in ('a'..='z').chain('A'..='Z') {
            let chord = mapping.resolve(ch).unwrap();
            assert_eq!(chord.shift, ch.is_ascii_uppercase());
            assert!(!chord.ctrl);
            assert_eq!(mapping.resolve(ch.to_ascii_lowercase()).unwrap().key, chord.key);
        }
    }

    #[test]
    fn key_mapping_resolves_symbols() {
        let mapping = KeyMapping::new();
        assert_eq!(mapping.resolve(' '), Some(KeyChord::plain(KeyCoord::SPACE)));
        assert_eq!(mapping.resolve('5'), Some(KeyChord::plain(KeyCoord::new(1, 2))));
        assert_eq!(mapping.resolve('-'), Some(KeyChord::plain(KeyCoord::MINUS)));
        assert_eq!(mapping.resolve('!'), Some(KeyChord::shifted(KeyCoord::new(6, 4))));
        assert_eq!(mapping.resolve('='), Some(KeyChord::shifted(KeyCoord::MINUS)));
        assert_eq!(mapping.resolve('?'), Some(KeyChord::shifted(KeyCoord::new(6, 1))));
        assert_eq!(mapping.resolve('\\'), Some(KeyChord::with_ctrl(KeyCoord::new(6, 1))));
        assert_eq!(mapping.resolve('|'), Some(KeyChord::with_shift_ctrl(KeyCoord::new(6, 1))));
        assert_eq!(mapping.resolve('`'), Some(KeyChord::with_shift_ctrl(KeyCoord::AT)));
        assert_eq!(mapping.resolve('\u{7f}'), None);
        assert_eq!(mapping.resolve('é'), None);
        assert_eq!(mapping.key_cap('['), Some(KeyCoord::new(6, 6)));
        assert_eq!(mapping.key_cap('é'), None);
    }

    #[test]
    fn key_mapping_resolves_controls() {
        let mapping = KeyMapping::new();
        assert_eq!(mapping.resolve('\r'), Some(KeyChord::plain(KeyCoord::ENTER)));
        assert_eq!(mapping.resolve('\n'), Some(KeyChord::plain(KeyCoord::ENTER)));
        assert_eq!(mapping.resolve('\u{8}'), Some(KeyChord::plain(KeyCoord::BACKSPACE)));
        assert_eq!(mapping.resolve('\u{0}'), Some(KeyChord::with_ctrl(KeyCoord::AT)));
        assert_eq!(mapping.resolve('\u{3}'), Some(KeyChord::with_ctrl(KeyCoord::new(7, 3))));
        assert_eq!(mapping.resolve('\u{1b}'), Some(KeyChord::with_ctrl(KeyCoord::new(6, 6))));
        assert_eq!(mapping.resolve('\u{1d}'), Some(KeyChord::with_ctrl(KeyCoord::new(7, 6))));
        assert_eq!(mapping.resolve('\u{1c}'), None);
        assert_eq!(mapping.resolve('\u{1f}'), None);
        let resolved = (0u8..0x20).filter(|&c| mapping.resolve(c as char).is_some()).count();
        assert_eq!(resolved, 29);
    }

    #[test]
    fn remap_tables_are_disjoint() {
        let mapping = KeyMapping::new();
        for code in 0x20..ASCII_LEN {
            let upper = (code as u8).to_ascii_uppercase() as usize;
            let hits = [mapping.caps[upper], mapping.shifted[code], mapping.ctrl[code], mapping.shift_ctrl[code]]
                       .iter().filter(|k| k.is_some()).count();
            assert!(hits <= 1, "character {:?} is mapped more than once", code as u8 as char);
        }
        for &(_, cap) in SHIFT_REMAP.iter().chain(CTRL_REMAP).chain(SHIFT_CTRL_REMAP) {
            assert!(mapping.caps[cap as usize].is_some());
        }
    }
}
