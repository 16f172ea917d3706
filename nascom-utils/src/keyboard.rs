/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Keyboard related utilities.
//!
//! A [KeyEventHandler] translates host keyboard events into NASCOM keyboard matrix changes.
//! It owns a [KeyboardHandle], so it can be moved to the thread running the host event loop
//! or turned into a closure with [KeyEventHandler::into_callback].
#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use nascom::peripherals::keyboard::{KeyboardHandle, KeyCoord, KeyChord, KeyMapping, Modifiers};

/// Host keys that are not described by a character.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpecialKey {
    Up,
    Down,
    Left,
    Right,
    Graph,
    Enter,
    Backspace,
    Space,
}

impl SpecialKey {
    /// Returns the position of the key in the NASCOM keyboard matrix.
    pub fn key_coord(self) -> KeyCoord {
        match self {
            SpecialKey::Up        => KeyCoord::UP,
            SpecialKey::Down      => KeyCoord::DOWN,
            SpecialKey::Left      => KeyCoord::LEFT,
            SpecialKey::Right     => KeyCoord::RIGHT,
            SpecialKey::Graph     => KeyCoord::GRAPH,
            SpecialKey::Enter     => KeyCoord::ENTER,
            SpecialKey::Backspace => KeyCoord::BACKSPACE,
            SpecialKey::Space     => KeyCoord::SPACE,
        }
    }
}

/// A host key event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyEvent {
    Char(char),
    Special(SpecialKey, Modifiers),
}

/// Applies host key events to the keyboard matrix.
#[derive(Clone, Debug, Default)]
pub struct KeyEventHandler {
    handle: KeyboardHandle,
    mapping: KeyMapping,
}

impl KeyEventHandler {
    pub fn new(handle: KeyboardHandle) -> Self {
        KeyEventHandler { handle, mapping: KeyMapping::default() }
    }
    pub fn handle(&self) -> &KeyboardHandle {
        &self.handle
    }
    /// Returns the chord that would be applied for `ch`.
    pub fn resolve(&self, ch: char) -> Option<KeyChord> {
        self.mapping.resolve(ch)
    }
    /// Presses or releases the keys producing `ch`.
    ///
    /// Returns `false` and leaves the matrix unchanged if `ch` can not be typed.
    pub fn char_event(&self, ch: char, pressed: bool) -> bool {
        match self.mapping.resolve(ch) {
            Some(chord) => {
                self.handle.apply_chord(chord, pressed);
                true
            }
            None => {
                trace!("no key for {:?}", ch);
                false
            }
        }
    }
    /// Presses or releases a non-character key while the given host modifiers are held.
    pub fn special_event(&self, key: SpecialKey, modifiers: Modifiers, pressed: bool) -> bool {
        self.handle.apply_directional(key.key_coord(), modifiers, pressed);
        true
    }
    /// Dispatches a host key event. Returns `true` if the matrix was updated.
    pub fn key_event(&self, event: KeyEvent, pressed: bool) -> bool {
        match event {
            KeyEvent::Char(ch) => self.char_event(ch, pressed),
            KeyEvent::Special(key, modifiers) => self.special_event(key, modifiers, pressed)
        }
    }
    /// Releases all keys, e.g. when the host window loses focus.
    pub fn release_all(&self) {
        self.handle.release_all();
    }
    /// Converts the handler into a closure that can be registered with an input driver.
    pub fn into_callback(self) -> impl FnMut(KeyEvent, bool) -> bool + Send + 'static {
        move |event, pressed| self.key_event(event, pressed)
    }
}
