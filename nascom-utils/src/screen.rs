/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! A text mode display sink for headless hosts and tests.
use core::fmt;

use nascom::video::{CharCellDisplay, LEFT_MARGIN, TOP_MARGIN, VIDEO_COLUMNS, VIDEO_ROWS};

/// The width of the screen in characters, including the margins.
pub const SCREEN_WIDTH: usize = VIDEO_COLUMNS + 2 * LEFT_MARGIN as usize;
/// The height of the screen in lines, including the margins.
pub const SCREEN_HEIGHT: usize = VIDEO_ROWS + 2 * TOP_MARGIN as usize;

/// A grid of character codes drawn by the renderer.
///
/// Characters outside of the printable ASCII range are shown as `' '` by the [fmt::Display]
/// implementation and [TextScreen::line].
#[derive(Clone)]
pub struct TextScreen {
    cells: [[u8; SCREEN_WIDTH]; SCREEN_HEIGHT],
    draws: usize,
}

impl Default for TextScreen {
    fn default() -> Self {
        TextScreen { cells: [[b' '; SCREEN_WIDTH]; SCREEN_HEIGHT], draws: 0 }
    }
}

impl fmt::Debug for TextScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextScreen")
         .field("draws", &self.draws)
         .finish_non_exhaustive()
    }
}

impl CharCellDisplay for TextScreen {
    fn draw_char_at(&mut self, x: u32, y: u32, ch: u8) {
        if let Some(cell) = self.cells.get_mut(y as usize)
                                      .and_then(|line| line.get_mut(x as usize)) {
            *cell = ch;
        }
        self.draws += 1;
    }
}

impl TextScreen {
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns the number of draw calls since creation or the last [TextScreen::clear].
    pub fn draw_count(&self) -> usize {
        self.draws
    }
    /// Returns the character code at the given screen position.
    pub fn char_at(&self, x: usize, y: usize) -> Option<u8> {
        self.cells.get(y).and_then(|line| line.get(x)).copied()
    }
    /// Returns a screen line with trailing spaces removed.
    ///
    /// # Panics
    /// Panics if `y` is not below [SCREEN_HEIGHT].
    pub fn line(&self, y: usize) -> String {
        let line: String = self.cells[y].iter().map(|&ch| printable(ch)).collect();
        line.trim_end().to_string()
    }
    /// Returns an iterator of all screen lines.
    pub fn lines(&self) -> impl Iterator<Item=String> + '_ {
        (0..SCREEN_HEIGHT).map(move |y| self.line(y))
    }
    /// Blanks the screen and zeroes the draw counter.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for TextScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

fn printable(ch: u8) -> char {
    if ch.is_ascii_graphic() { ch as char } else { ' ' }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_screen_works() {
        let mut screen = TextScreen::new();
        assert_eq!(SCREEN_WIDTH, 50);
        assert_eq!(SCREEN_HEIGHT, 18);
        screen.draw_char_at(1, 1, b'O');
        screen.draw_char_at(2, 1, b'K');
        screen.draw_char_at(3, 1, 0x0D);
        screen.draw_char_at(48, 16, b'>');
        screen.draw_char_at(50, 20, b'X');
        assert_eq!(screen.draw_count(), 5);
        assert_eq!(screen.line(1), " OK");
        assert_eq!(screen.line(16), format!("{:>49}", ">"));
        assert_eq!(screen.char_at(3, 1), Some(0x0D));
        assert_eq!(screen.char_at(50, 1), None);
        assert_eq!(screen.lines().count(), SCREEN_HEIGHT);
        assert!(screen.to_string().starts_with("\n OK\n"));
        screen.clear();
        assert_eq!(screen.draw_count(), 0);
        assert!(screen.lines().all(|line| line.is_empty()));
    }
}
