/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The NASCOM-2 character video window and its dirty-cell renderer.
use core::fmt;

pub use nascom_core::video::*;
use crate::memory::NascomMemory;

/// Renders the video window of guest memory to a [CharCellDisplay], drawing only the cells
/// that changed since the previous pass.
///
/// The first pass after creation or after [DisplayRenderer::invalidate_cache] only records the
/// window contents and draws nothing. Hosts that clear their display should follow it with
/// [DisplayRenderer::redraw_all].
#[derive(Clone)]
pub struct DisplayRenderer {
    cache: [u8; VIDEO_CELLS],
    primed: bool,
}

impl Default for DisplayRenderer {
    fn default() -> Self {
        DisplayRenderer { cache: [0; VIDEO_CELLS], primed: false }
    }
}

impl fmt::Debug for DisplayRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayRenderer")
         .field("primed", &self.primed)
         .finish_non_exhaustive()
    }
}

impl DisplayRenderer {
    pub fn new() -> Self {
        Self::default()
    }
    /// Performs a single rendering pass. Returns the number of cells drawn.
    pub fn render_frame<M, D>(&mut self, memory: &M, display: &mut D) -> usize
        where M: NascomMemory + ?Sized,
              D: CharCellDisplay + ?Sized
    {
        if !self.primed {
            for (coords, addr) in visible_cells() {
                self.cache[coords.index()] = memory.read(addr);
            }
            self.primed = true;
            return 0
        }
        let mut draws = 0;
        for (coords, addr) in visible_cells() {
            let ch = memory.read(addr);
            let cached = &mut self.cache[coords.index()];
            if *cached != ch {
                *cached = ch;
                let (x, y) = coords.display_position();
                display.draw_char_at(x, y, ch);
                draws += 1;
            }
        }
        draws
    }
    /// Draws every cell of the window and primes the cache. Returns the number of cells drawn.
    pub fn redraw_all<M, D>(&mut self, memory: &M, display: &mut D) -> usize
        where M: NascomMemory + ?Sized,
              D: CharCellDisplay + ?Sized
    {
        for (coords, addr) in visible_cells() {
            let ch = memory.read(addr);
            self.cache[coords.index()] = ch;
            let (x, y) = coords.display_position();
            display.draw_char_at(x, y, ch);
        }
        self.primed = true;
        VIDEO_CELLS
    }
    /// Forces the next pass to re-prime the cache without drawing.
    pub fn invalidate_cache(&mut self) {
        self.primed = false;
    }
    #[inline]
    pub fn is_primed(&self) -> bool {
        self.primed
    }
    /// Returns the last recorded character of a cell.
    ///
    /// Returns `None` if the cache is not primed or `coords` lie outside of the visible window.
    pub fn cached(&self, coords: CellCoords) -> Option<u8> {
        if !self.primed || coords.column as usize >= VIDEO_COLUMNS {
            return None
        }
        self.cache.get(coords.index()).copied()
    }
}
