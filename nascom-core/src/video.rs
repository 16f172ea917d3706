/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The NASCOM-2 character video window geometry and the host display interface.
//!
//! The video RAM starts at `0x0800` and consists of 16 rows, 64 bytes each. Only 48 bytes
//! of each row, starting at offset 10, are visible. The first visible line on the screen is
//! the last row in memory, the remaining rows follow from the first one.
//!
//! ```text
//!  logical row 0   -> 0x0BCA..0x0BFA
//!  logical row 1   -> 0x080A..0x083A
//!  logical row 15  -> 0x0B8A..0x0BBA
//! ```
use core::iter::FusedIterator;

/// The first address of the video RAM.
pub const VIDEO_RAM_START: u16 = 0x0800;
/// The number of bytes in each video RAM row.
pub const VIDEO_ROW_STRIDE: u16 = 64;
/// The offset of the first visible character in each video RAM row.
pub const VIDEO_ROW_OFFSET: u16 = 10;
/// The number of visible character columns.
pub const VIDEO_COLUMNS: usize = 48;
/// The number of visible character rows.
pub const VIDEO_ROWS: usize = 16;
/// The number of visible character cells.
pub const VIDEO_CELLS: usize = VIDEO_COLUMNS * VIDEO_ROWS;
/// The horizontal offset in character cells of the rendered window on the host display.
pub const LEFT_MARGIN: u32 = 1;
/// The vertical offset in character cells of the rendered window on the host display.
pub const TOP_MARGIN: u32 = 1;

/// Coordinates of a visible character cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CellCoords {
    /// A column in the range `[0, VIDEO_COLUMNS)`.
    pub column: u8,
    /// A logical row in the range `[0, VIDEO_ROWS)`, counting from the top of the screen.
    pub row: u8,
}

impl CellCoords {
    #[inline]
    pub const fn new(column: u8, row: u8) -> Self {
        CellCoords { column, row }
    }
    /// Returns the guest memory address of this cell.
    ///
    /// # Panics
    /// Panics if coordinates are outside of the visible window.
    #[inline]
    pub fn address(self) -> u16 {
        assert!((self.column as usize) < VIDEO_COLUMNS && (self.row as usize) < VIDEO_ROWS,
                "cell coordinates out of range");
        let hw_row = (self.row as u16 + VIDEO_ROWS as u16 - 1) % VIDEO_ROWS as u16;
        VIDEO_RAM_START + hw_row * VIDEO_ROW_STRIDE + VIDEO_ROW_OFFSET + self.column as u16
    }
    /// Returns the host display coordinates of this cell, with margins applied.
    #[inline]
    pub fn display_position(self) -> (u32, u32) {
        (self.column as u32 + LEFT_MARGIN, self.row as u32 + TOP_MARGIN)
    }
    /// Returns the index of this cell in a row-major array of visible cells.
    #[inline]
    pub fn index(self) -> usize {
        self.row as usize * VIDEO_COLUMNS + self.column as usize
    }
}

/// Returns an iterator over all visible cells in row-major order, together with their addresses.
pub fn visible_cells() -> VisibleCells {
    VisibleCells { index: 0 }
}

/// An iterator returned by [visible_cells].
#[derive(Clone, Debug)]
pub struct VisibleCells {
    index: usize
}

impl Iterator for VisibleCells {
    type Item = (CellCoords, u16);

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= VIDEO_CELLS {
            return None
        }
        let coords = CellCoords::new((self.index % VIDEO_COLUMNS) as u8,
                                     (self.index / VIDEO_COLUMNS) as u8);
        self.index += 1;
        Some((coords, coords.address()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = VIDEO_CELLS.saturating_sub(self.index);
        (len, Some(len))
    }
}

impl ExactSizeIterator for VisibleCells {}
impl FusedIterator for VisibleCells {}

/// An interface to the host character-cell display.
///
/// Positions passed to [CharCellDisplay::draw_char_at] already include the margins.
pub trait CharCellDisplay {
    /// Draws a character code `ch` at the host cell `(x, y)`.
    fn draw_char_at(&mut self, x: u32, y: u32, ch: u8);
}

impl<D: CharCellDisplay + ?Sized> CharCellDisplay for &mut D {
    #[inline]
    fn draw_char_at(&mut self, x: u32, y: u32, ch: u8) {
        (**self).draw_char_at(x, y, ch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_address_works() {
        assert_eq!(CellCoords::new(0, 0).address(), 0x0BCA);
        assert_eq!(CellCoords::new(47, 0).address(), 0x0BF9);
        assert_eq!(CellCoords::new(0, 1).address(), 0x080A);
        assert_eq!(CellCoords::new(5, 2).address(), 0x084F);
        assert_eq!(CellCoords::new(0, 15).address(), 0x0B8A);
        assert_eq!(CellCoords::new(3, 4).display_position(), (4, 5));
    }

    #[test]
    fn visible_cells_cover_window() {
        let cells: Vec<_> = visible_cells().collect();
        assert_eq!(cells.len(), VIDEO_CELLS);
        assert_eq!(visible_cells().len(), VIDEO_CELLS);
        for (index, (coords, addr)) in cells.iter().enumerate() {
            assert_eq!(coords.index(), index);
            assert!((0x0800..0x0C00).contains(addr));
            assert!((VIDEO_ROW_OFFSET..VIDEO_ROW_OFFSET + VIDEO_COLUMNS as u16)
                    .contains(&(addr % VIDEO_ROW_STRIDE)));
        }
        let mut addresses: Vec<u16> = cells.iter().map(|&(_, addr)| addr).collect();
        addresses.sort_unstable();
        addresses.dedup();
        assert_eq!(addresses.len(), VIDEO_CELLS);
    }

    #[test]
    #[should_panic]
    fn cell_address_panics_out_of_window() {
        CellCoords::new(48, 0).address();
    }
}
