/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The NASCOM-2 keyboard matrix.
//!
//! ```text
//!          col 0   col 1   col 2   col 3   col 4   col 5   col 6
//! row 0      -     ENTER    BS     CTRL   SHIFT     @
//! row 1      H       B       5       F       X       T      UP
//! row 2      J       N       6       D       Z       Y     LEFT
//! row 3      K       M       7       E       S       U     DOWN
//! row 4      L       ,       8       W       A       I     RIGHT
//! row 5      ;       .       9       3       Q       O     GRAPH
//! row 6      :       /       0       2       1       P       [
//! row 7      G       V       4       C       R     SPACE     ]
//! ```
//!
//! A set bit in a row byte marks a pressed key. The guest reads the inverted value.
//!
//! The matrix state is split in two:
//!
//! * the live state mutated by the host through a [KeyboardHandle], possibly from
//!   another thread,
//! * the [KeyMatrix] scan state owned by the emulation thread, holding a snapshot of the
//!   live state taken on each scan reset and a row cursor.
//!
//! Chords, e.g. a letter together with `SHIFT`, are applied to the live state as a unit.
//! A snapshot never observes a partially applied chord: if a chord is being applied while
//! the snapshot is taken, the previous snapshot is kept.
use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

mod layout;
pub use layout::*;

/// The number of matrix rows.
pub const MATRIX_ROWS: usize = 8;
/// The number of matrix columns.
pub const MATRIX_COLS: u8 = 8;

/// A key position in the keyboard matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct KeyCoord {
    row: u8,
    col: u8,
}

impl KeyCoord {
    pub const MINUS:     KeyCoord = KeyCoord::new(0, 0);
    pub const ENTER:     KeyCoord = KeyCoord::new(0, 1);
    pub const BACKSPACE: KeyCoord = KeyCoord::new(0, 2);
    pub const CTRL:      KeyCoord = KeyCoord::new(0, 3);
    pub const SHIFT:     KeyCoord = KeyCoord::new(0, 4);
    pub const AT:        KeyCoord = KeyCoord::new(0, 5);
    pub const UP:        KeyCoord = KeyCoord::new(1, 6);
    pub const LEFT:      KeyCoord = KeyCoord::new(2, 6);
    pub const DOWN:      KeyCoord = KeyCoord::new(3, 6);
    pub const RIGHT:     KeyCoord = KeyCoord::new(4, 6);
    pub const GRAPH:     KeyCoord = KeyCoord::new(5, 6);
    pub const SPACE:     KeyCoord = KeyCoord::new(7, 5);

    /// # Panics
    /// Panics if `row` or `col` is outside of the matrix.
    pub const fn new(row: u8, col: u8) -> Self {
        assert!((row as usize) < MATRIX_ROWS && col < MATRIX_COLS, "key coordinates out of range");
        KeyCoord { row, col }
    }
    /// Returns `None` if `row` or `col` is outside of the matrix.
    pub const fn try_new(row: u8, col: u8) -> Option<Self> {
        if (row as usize) < MATRIX_ROWS && col < MATRIX_COLS {
            Some(KeyCoord { row, col })
        }
        else {
            None
        }
    }
    #[inline]
    pub const fn row(self) -> u8 {
        self.row
    }
    #[inline]
    pub const fn col(self) -> u8 {
        self.col
    }
    /// Returns the bit mask of this key in its row byte.
    #[inline]
    pub const fn mask(self) -> u8 {
        1 << self.col
    }
}

impl fmt::Display for KeyCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

bitflags! {
    /// Modifier keys of the NASCOM keyboard.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0000_0001;
        const CTRL  = 0b0000_0010;
    }
}

/// A base key together with the modifiers required to produce a character.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct KeyChord {
    pub key: KeyCoord,
    pub shift: bool,
    pub ctrl: bool,
}

impl KeyChord {
    #[inline]
    pub const fn plain(key: KeyCoord) -> Self {
        KeyChord { key, shift: false, ctrl: false }
    }
    #[inline]
    pub const fn shifted(key: KeyCoord) -> Self {
        KeyChord { key, shift: true, ctrl: false }
    }
    #[inline]
    pub const fn with_ctrl(key: KeyCoord) -> Self {
        KeyChord { key, shift: false, ctrl: true }
    }
    #[inline]
    pub const fn with_shift_ctrl(key: KeyCoord) -> Self {
        KeyChord { key, shift: true, ctrl: true }
    }
    /// Returns the modifiers required by this chord.
    pub fn modifiers(self) -> Modifiers {
        let mut modifiers = Modifiers::empty();
        modifiers.set(Modifiers::SHIFT, self.shift);
        modifiers.set(Modifiers::CTRL, self.ctrl);
        modifiers
    }
}

#[derive(Debug, Default)]
struct LiveMatrix {
    rows: [AtomicU8; MATRIX_ROWS],
    chords_pending: AtomicU32,
    chord_generation: AtomicU32,
}

impl LiveMatrix {
    #[inline]
    fn set_key(&self, key: KeyCoord, pressed: bool) {
        let row = &self.rows[key.row as usize];
        if pressed {
            row.fetch_or(key.mask(), Ordering::SeqCst);
        }
        else {
            row.fetch_and(!key.mask(), Ordering::SeqCst);
        }
    }

    fn load_rows(&self) -> [u8; MATRIX_ROWS] {
        let mut rows = [0u8; MATRIX_ROWS];
        for (row, live) in rows.iter_mut().zip(self.rows.iter()) {
            *row = live.load(Ordering::SeqCst);
        }
        rows
    }
    /// Returns the rows only if no chord was in flight while they were being read.
    fn capture(&self) -> Option<[u8; MATRIX_ROWS]> {
        let generation = self.chord_generation.load(Ordering::SeqCst);
        if self.chords_pending.load(Ordering::SeqCst) != 0 {
            return None
        }
        let rows = self.load_rows();
        if self.chords_pending.load(Ordering::SeqCst) != 0 ||
           self.chord_generation.load(Ordering::SeqCst) != generation {
            return None
        }
        Some(rows)
    }

    fn begin_chord(&self) -> ChordGuard<'_> {
        self.chords_pending.fetch_add(1, Ordering::SeqCst);
        ChordGuard(self)
    }
}

/// Marks a chord in flight for as long as it lives.
struct ChordGuard<'a>(&'a LiveMatrix);

impl Drop for ChordGuard<'_> {
    fn drop(&mut self) {
        self.0.chord_generation.fetch_add(1, Ordering::SeqCst);
        self.0.chords_pending.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A cloneable handle to the live keyboard state.
///
/// Handles can be sent to other threads, e.g. to a host event loop.
#[derive(Clone, Debug, Default)]
pub struct KeyboardHandle {
    live: Arc<LiveMatrix>,
}

impl KeyboardHandle {
    /// Presses or releases a single key.
    pub fn set_key(&self, key: KeyCoord, pressed: bool) {
        self.live.set_key(key, pressed);
    }
    /// Applies a chord as a unit.
    ///
    /// When pressed, sets the base key and makes `SHIFT` and `CTRL` reflect exactly the
    /// modifiers required by the chord. When released, clears the base key and only the
    /// modifiers the chord required.
    pub fn apply_chord(&self, chord: KeyChord, pressed: bool) {
        let _guard = self.live.begin_chord();
        if pressed {
            self.live.set_key(chord.key, true);
            self.live.set_key(KeyCoord::SHIFT, chord.shift);
            self.live.set_key(KeyCoord::CTRL, chord.ctrl);
        }
        else {
            self.live.set_key(chord.key, false);
            if chord.shift {
                self.live.set_key(KeyCoord::SHIFT, false);
            }
            if chord.ctrl {
                self.live.set_key(KeyCoord::CTRL, false);
            }
        }
    }
    /// Presses or releases a non-character key, e.g. a cursor key, as a unit.
    ///
    /// The `SHIFT` and `CTRL` keys mirror `modifiers` whether the key is pressed or released.
    pub fn apply_directional(&self, key: KeyCoord, modifiers: Modifiers, pressed: bool) {
        let _guard = self.live.begin_chord();
        self.live.set_key(key, pressed);
        self.live.set_key(KeyCoord::SHIFT, modifiers.contains(Modifiers::SHIFT));
        self.live.set_key(KeyCoord::CTRL, modifiers.contains(Modifiers::CTRL));
    }
    /// Releases all keys.
    pub fn release_all(&self) {
        let _guard = self.live.begin_chord();
        for row in self.live.rows.iter() {
            row.store(0, Ordering::SeqCst);
        }
    }
    /// Returns `true` if the given key is pressed in the live state.
    pub fn is_pressed(&self, key: KeyCoord) -> bool {
        self.live.rows[key.row as usize].load(Ordering::SeqCst) & key.mask() != 0
    }
    /// Returns the current live state of all rows.
    ///
    /// The returned rows may reflect a partially applied chord.
    pub fn live_rows(&self) -> [u8; MATRIX_ROWS] {
        self.live.load_rows()
    }
}

/// The keyboard scan state seen by the guest.
///
/// The guest resets the scan, then advances it row by row, reading each row in turn.
/// All rows read between two resets come from one consistent snapshot.
#[derive(Clone, Default)]
pub struct KeyMatrix {
    handle: KeyboardHandle,
    snapshot: [u8; MATRIX_ROWS],
    cursor: u8,
}

impl fmt::Debug for KeyMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMatrix")
         .field("snapshot", &self.snapshot)
         .field("cursor", &self.cursor)
         .finish()
    }
}

impl KeyMatrix {
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns a new handle to the live keyboard state.
    pub fn handle(&self) -> KeyboardHandle {
        self.handle.clone()
    }
    /// Applies a chord to the live state. See [KeyboardHandle::apply_chord].
    pub fn apply_chord(&self, chord: KeyChord, pressed: bool) {
        self.handle.apply_chord(chord, pressed)
    }
    /// Applies a directional key to the live state. See [KeyboardHandle::apply_directional].
    pub fn apply_directional(&self, key: KeyCoord, modifiers: Modifiers, pressed: bool) {
        self.handle.apply_directional(key, modifiers, pressed)
    }
    /// Restarts the scan from row `0` and takes a new snapshot of the live state.
    ///
    /// If a chord is being applied concurrently, the previous snapshot is retained.
    pub fn reset_scan(&mut self) {
        self.cursor = 0;
        match self.handle.live.capture() {
            Some(rows) => self.snapshot = rows,
            None => trace!("keyboard snapshot retained, chord in flight")
        }
    }
    /// Moves the scan cursor to the next row, wrapping after the last row.
    pub fn advance_scan(&mut self) {
        self.cursor = (self.cursor + 1) % MATRIX_ROWS as u8;
    }
    /// Returns the snapshot byte of the current row, a set bit means a pressed key.
    #[inline]
    pub fn current_byte(&self) -> u8 {
        self.snapshot[self.cursor as usize]
    }
    /// Returns the current row cursor.
    #[inline]
    pub fn cursor(&self) -> u8 {
        self.cursor
    }
    /// Returns the rows captured by the last scan reset.
    #[inline]
    pub fn snapshot(&self) -> &[u8; MATRIX_ROWS] {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use rand::{Rng, SeedableRng, rngs::SmallRng};

    const KEY_A: KeyCoord = KeyCoord::new(4, 4);
    const KEY_B: KeyCoord = KeyCoord::new(1, 1);

    fn scan_all(matrix: &mut KeyMatrix) -> [u8; MATRIX_ROWS] {
        let mut rows = [0; MATRIX_ROWS];
        matrix.reset_scan();
        for row in rows.iter_mut() {
            *row = matrix.current_byte();
            matrix.advance_scan();
        }
        rows
    }

    #[test]
    fn key_coord_works() {
        assert_eq!(KEY_A.row(), 4);
        assert_eq!(KEY_A.col(), 4);
        assert_eq!(KEY_A.mask(), 0x10);
        assert_eq!(KeyCoord::try_new(8, 0), None);
        assert_eq!(KeyCoord::try_new(0, 8), None);
        assert_eq!(KeyCoord::try_new(7, 7), Some(KeyCoord::new(7, 7)));
        assert_eq!(KeyCoord::SPACE.to_string(), "(7,5)");
        assert_eq!(KeyChord::with_shift_ctrl(KEY_A).modifiers(), Modifiers::all());
        assert_eq!(KeyChord::plain(KEY_A).modifiers(), Modifiers::empty());
    }

    #[test]
    fn chord_sets_modifiers_exactly() {
        let matrix = KeyMatrix::new();
        let handle = matrix.handle();
        handle.set_key(KeyCoord::CTRL, true);
        handle.apply_chord(KeyChord::shifted(KEY_A), true);
        assert!(handle.is_pressed(KEY_A));
        assert!(handle.is_pressed(KeyCoord::SHIFT));
        assert!(!handle.is_pressed(KeyCoord::CTRL));
        handle.apply_chord(KeyChord::plain(KEY_B), true);
        assert!(!handle.is_pressed(KeyCoord::SHIFT));
        handle.apply_chord(KeyChord::with_ctrl(KEY_B), false);
        assert!(!handle.is_pressed(KEY_B));
        assert!(handle.is_pressed(KEY_A));
        handle.set_key(KeyCoord::SHIFT, true);
        handle.apply_chord(KeyChord::plain(KEY_A), false);
        assert!(handle.is_pressed(KeyCoord::SHIFT));
        handle.apply_chord(KeyChord::shifted(KEY_A), false);
        assert_eq!(handle.live_rows(), [0; MATRIX_ROWS]);
    }

    #[test]
    fn directional_mirrors_modifiers() {
        let handle = KeyboardHandle::default();
        handle.apply_directional(KeyCoord::UP, Modifiers::SHIFT, true);
        assert!(handle.is_pressed(KeyCoord::UP));
        assert!(handle.is_pressed(KeyCoord::SHIFT));
        assert!(!handle.is_pressed(KeyCoord::CTRL));
        handle.apply_directional(KeyCoord::UP, Modifiers::CTRL, false);
        assert!(!handle.is_pressed(KeyCoord::UP));
        assert!(!handle.is_pressed(KeyCoord::SHIFT));
        assert!(handle.is_pressed(KeyCoord::CTRL));
        handle.release_all();
        assert_eq!(handle.live_rows(), [0; MATRIX_ROWS]);
    }

    #[test]
    fn scan_cursor_wraps() {
        let mut matrix = KeyMatrix::new();
        matrix.reset_scan();
        for n in 1..=MATRIX_ROWS {
            matrix.advance_scan();
            assert_eq!(matrix.cursor() as usize, n % MATRIX_ROWS);
        }
        matrix.advance_scan();
        matrix.reset_scan();
        assert_eq!(matrix.cursor(), 0);
    }

    #[test]
    fn scan_reads_snapshot() {
        let mut matrix = KeyMatrix::new();
        let handle = matrix.handle();
        handle.apply_chord(KeyChord::shifted(KEY_A), true);
        matrix.reset_scan();
        handle.apply_chord(KeyChord::shifted(KEY_A), false);
        handle.set_key(KeyCoord::SPACE, true);
        let mut expected = [0; MATRIX_ROWS];
        expected[0] = KeyCoord::SHIFT.mask();
        expected[4] = KEY_A.mask();
        for row in expected.iter() {
            assert_eq!(matrix.current_byte(), *row);
            matrix.advance_scan();
        }
        let mut expected = [0; MATRIX_ROWS];
        expected[7] = KeyCoord::SPACE.mask();
        assert_eq!(scan_all(&mut matrix), expected);
    }

    #[test]
    fn scan_is_stable_between_resets() {
        let mut rng = SmallRng::seed_from_u64(0x4e41_5343);
        let mut matrix = KeyMatrix::new();
        let handle = matrix.handle();
        for _ in 0..200 {
            matrix.reset_scan();
            let expected = handle.live_rows();
            let mut rows = [0; MATRIX_ROWS];
            for row in rows.iter_mut() {
                let key = KeyCoord::new(rng.gen_range(0..8), rng.gen_range(0..7));
                handle.set_key(key, rng.gen());
                *row = matrix.current_byte();
                matrix.advance_scan();
            }
            assert_eq!(rows, expected);
        }
    }

    #[test]
    fn snapshot_never_splits_a_chord() {
        let mut matrix = KeyMatrix::new();
        let handle = matrix.handle();
        let stop = Arc::new(AtomicBool::new(false));
        let typist = {
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut strokes = 0u32;
                while !stop.load(Ordering::SeqCst) {
                    handle.apply_chord(KeyChord::shifted(KEY_A), true);
                    handle.apply_chord(KeyChord::shifted(KEY_A), false);
                    strokes += 1;
                }
                strokes
            })
        };
        for _ in 0..100_000 {
            matrix.reset_scan();
            let snapshot = matrix.snapshot();
            let shift = snapshot[0] & KeyCoord::SHIFT.mask() != 0;
            let key = snapshot[4] & KEY_A.mask() != 0;
            assert_eq!(shift, key, "partial chord observed: {:?}", snapshot);
        }
        stop.store(true, Ordering::SeqCst);
        let strokes = typist.join().unwrap();
        assert!(strokes > 0);
    }
}
