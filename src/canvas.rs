//! CellCanvas adapter (component A): a curses-like cell grid over a shared
//! screen buffer, blitted to the real terminal through crossterm.
//!
//! `TermScreen` owns one flat `Vec<Cell>` for the whole physical terminal.
//! `TermWindow` is a view into a rectangle of that buffer — derived windows
//! (`derwin`) share the parent's storage exactly like curses subwindows, so
//! writes through a pane are visible to anything else looking at the same
//! cells.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetColors, Colors};
use ratatui::style::{Color as RColor, Modifier};

use crate::attrs::{Attrs, ColorPairs};

pub const BLANK: u8 = b' ';
/// Sentinel glyph standing in for curses' `ACS_HLINE` / vertical-rule glyph.
pub const VLINE: u8 = b'|';
pub const HLINE: u8 = b'-';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub glyph: u8,
    pub attrs: Attrs,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            glyph: BLANK,
            attrs: Attrs::default(),
        }
    }
}

/// The shared physical backing store plus everything needed to blit it.
struct Screen {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    /// What was last written to the terminal, to diff against on refresh.
    last_flushed: Vec<Cell>,
    pairs: ColorPairs,
    cursor: (u16, u16),
}

impl Screen {
    fn new(width: usize, height: usize) -> Self {
        let cells = vec![Cell::default(); width * height];
        Screen {
            last_flushed: cells.clone(),
            width,
            height,
            cells,
            pairs: ColorPairs::init(),
            cursor: (0, 0),
        }
    }

    fn idx(&self, y: usize, x: usize) -> usize {
        y * self.width + x
    }

    fn resize(&mut self, width: usize, height: usize) {
        let mut cells = vec![Cell::default(); width * height];
        for y in 0..height.min(self.height) {
            for x in 0..width.min(self.width) {
                cells[y * width + x] = self.cells[self.idx(y, x)];
            }
        }
        self.cells = cells.clone();
        self.last_flushed = vec![Cell::default(); width * height];
        self.width = width;
        self.height = height;
    }

    /// Flush every cell that changed since the last flush, then place the
    /// hardware cursor. Mirrors how ratatui's own crossterm backend diffs
    /// a `Buffer` before writing, adapted to a flat curses-style grid.
    fn flush(&mut self, out: &mut impl Write) -> io::Result<()> {
        let mut last_attrs: Option<Attrs> = None;
        for y in 0..self.height {
            for x in 0..self.width {
                let i = self.idx(y, x);
                let cell = self.cells[i];
                if cell == self.last_flushed[i] {
                    continue;
                }
                if last_attrs != Some(cell.attrs) {
                    write_style(out, &self.pairs, cell.attrs)?;
                    last_attrs = Some(cell.attrs);
                }
                queue!(out, MoveTo(x as u16, y as u16))?;
                queue!(out, Print((cell.glyph as char).to_string()))?;
            }
        }
        self.last_flushed.copy_from_slice(&self.cells);
        queue!(out, ResetColor)?;
        queue!(out, MoveTo(self.cursor.0, self.cursor.1))?;
        out.flush()
    }
}

fn write_style(out: &mut impl Write, pairs: &ColorPairs, attrs: Attrs) -> io::Result<()> {
    queue!(out, SetAttribute(Attribute::Reset))?;
    let style = attrs.style(pairs);
    if attrs.modifier().contains(Modifier::BOLD) {
        queue!(out, SetAttribute(Attribute::Bold))?;
    }
    if attrs.modifier().contains(Modifier::UNDERLINED) {
        queue!(out, SetAttribute(Attribute::Underlined))?;
    }
    if attrs.modifier().contains(Modifier::SLOW_BLINK) {
        queue!(out, SetAttribute(Attribute::SlowBlink))?;
    }
    if attrs.modifier().contains(Modifier::REVERSED) {
        queue!(out, SetAttribute(Attribute::Reverse))?;
    }
    if attrs.modifier().contains(Modifier::HIDDEN) {
        queue!(out, SetAttribute(Attribute::Hidden))?;
    }
    let fg = style.fg.map(to_crossterm_color);
    let bg = style.bg.map(to_crossterm_color);
    if fg.is_some() || bg.is_some() {
        queue!(
            out,
            SetColors(Colors::new(
                fg.unwrap_or(Color::Reset),
                bg.unwrap_or(Color::Reset)
            ))
        )?;
    }
    Ok(())
}

fn to_crossterm_color(c: RColor) -> Color {
    match c {
        RColor::Black => Color::Black,
        RColor::Red => Color::DarkRed,
        RColor::Green => Color::DarkGreen,
        RColor::Yellow => Color::DarkYellow,
        RColor::Blue => Color::DarkBlue,
        RColor::Magenta => Color::DarkMagenta,
        RColor::Cyan => Color::DarkCyan,
        RColor::White => Color::Grey,
        _ => Color::Reset,
    }
}

/// A rectangular view onto a shared `Screen`. `derwin` produces another
/// `TermWindow` pointed at the same `Rc<RefCell<Screen>>`.
#[derive(Clone)]
pub struct TermWindow {
    screen: Rc<RefCell<Screen>>,
    x0: usize,
    y0: usize,
    width: usize,
    height: usize,
    cy: usize,
    cx: usize,
    attrs: Attrs,
    scrollok: bool,
}

impl TermWindow {
    pub fn new_root(width: usize, height: usize) -> Self {
        TermWindow {
            screen: Rc::new(RefCell::new(Screen::new(width, height))),
            x0: 0,
            y0: 0,
            width,
            height,
            cy: 0,
            cx: 0,
            attrs: Attrs::default(),
            scrollok: true,
        }
    }

    pub fn resize_root(&mut self, width: usize, height: usize) {
        self.screen.borrow_mut().resize(width, height);
        self.width = width;
        self.height = height;
        self.cy = self.cy.min(height.saturating_sub(1));
        self.cx = self.cx.min(width.saturating_sub(1));
    }

    fn abs(&self, y: usize, x: usize) -> (usize, usize) {
        (self.y0 + y, self.x0 + x)
    }

    pub fn getmaxyx(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn getyx(&self) -> (usize, usize) {
        (self.cy, self.cx)
    }

    pub fn mv(&mut self, y: usize, x: usize) {
        self.cy = y.min(self.height.saturating_sub(1));
        self.cx = x.min(self.width.saturating_sub(1));
    }

    pub fn scrollok(&mut self, on: bool) {
        self.scrollok = on;
    }

    /// Write `glyph` at the cursor with current attrs, then advance the
    /// cursor one column (no wrap — wrap is a Grid-level policy).
    pub fn addch(&mut self, glyph: u8) {
        self.set_cell(self.cy, self.cx, glyph, self.attrs);
        if self.cx + 1 < self.width {
            self.cx += 1;
        }
    }

    /// Insert `glyph` at the cursor, shifting the rest of the row right by
    /// one; the rightmost cell is dropped. Cursor does not move.
    pub fn insch(&mut self, glyph: u8) {
        let row = self.cy;
        for x in (self.cx + 1..self.width).rev() {
            let c = self.get_cell(row, x - 1);
            self.set_raw(row, x, c);
        }
        self.set_cell(row, self.cx, glyph, self.attrs);
    }

    pub fn delch(&mut self) {
        let row = self.cy;
        for x in self.cx..self.width.saturating_sub(1) {
            let c = self.get_cell(row, x + 1);
            self.set_raw(row, x, c);
        }
        if self.width > 0 {
            self.set_cell(row, self.width - 1, BLANK, Attrs::default());
        }
    }

    pub fn inch(&self) -> Cell {
        self.get_cell(self.cy, self.cx)
    }

    /// Direct indexed read, independent of the cursor (curses `inch(y,x)`).
    pub fn get_cell_at(&self, y: usize, x: usize) -> Cell {
        self.get_cell(y, x)
    }

    /// Write a whole cell (glyph + its original attrs) at the cursor and
    /// advance, without going through the window's own current attrs.
    /// Used by the spill primitives to carry attributes across panes.
    pub fn addch_cell(&mut self, cell: Cell) {
        self.set_raw(self.cy, self.cx, cell);
        if self.cx + 1 < self.width {
            self.cx += 1;
        }
    }

    /// Insert a whole cell at the cursor, shifting the row right by one.
    /// Cursor does not move.
    pub fn insch_cell(&mut self, cell: Cell) {
        let row = self.cy;
        for x in (self.cx + 1..self.width).rev() {
            let c = self.get_cell(row, x - 1);
            self.set_raw(row, x, c);
        }
        self.set_raw(row, self.cx, cell);
    }

    /// Scroll this window's own rectangle by one line. `dir` > 0 scrolls
    /// up (content moves up, blank line appears at bottom); `dir` < 0
    /// scrolls down.
    pub fn scroll(&mut self, dir: i32) {
        if dir >= 0 {
            for y in 0..self.height.saturating_sub(1) {
                for x in 0..self.width {
                    let c = self.get_cell(y + 1, x);
                    self.set_raw(y, x, c);
                }
            }
            self.clear_row(self.height.saturating_sub(1));
        } else {
            for y in (1..self.height).rev() {
                for x in 0..self.width {
                    let c = self.get_cell(y - 1, x);
                    self.set_raw(y, x, c);
                }
            }
            self.clear_row(0);
        }
    }

    pub fn clear(&mut self) {
        for y in 0..self.height {
            self.clear_row(y);
        }
    }

    pub fn clrtobot(&mut self) {
        for x in self.cx..self.width {
            self.set_cell(self.cy, x, BLANK, Attrs::default());
        }
        for y in self.cy + 1..self.height {
            self.clear_row(y);
        }
    }

    pub fn clrtoeol(&mut self) {
        for x in self.cx..self.width {
            self.set_cell(self.cy, x, BLANK, Attrs::default());
        }
    }

    pub fn deleteln(&mut self) {
        for y in self.cy..self.height.saturating_sub(1) {
            for x in 0..self.width {
                let c = self.get_cell(y + 1, x);
                self.set_raw(y, x, c);
            }
        }
        self.clear_row(self.height.saturating_sub(1));
    }

    pub fn insertln(&mut self) {
        for y in (self.cy + 1..self.height).rev() {
            for x in 0..self.width {
                let c = self.get_cell(y - 1, x);
                self.set_raw(y, x, c);
            }
        }
        self.clear_row(self.cy);
    }

    pub fn attron(&mut self, mask: Attrs) {
        self.attrs.attron(mask);
    }

    pub fn attrset(&mut self, mask: Attrs) {
        self.attrs.attrset(mask);
    }

    /// Draw a vertical rule of `len` cells starting at (y, x) in the
    /// coordinate space of this window (used on the root window to draw
    /// pane separators, which live outside any pane's own storage).
    pub fn vline(&mut self, x: usize, y: usize, len: usize) {
        for row in y..(y + len).min(self.height) {
            self.set_raw(row, x, Cell { glyph: VLINE, attrs: Attrs::default() });
        }
    }

    pub fn beep(&self) {
        // Terminal bell; best-effort, never fatal.
        let _ = write!(io::stdout(), "\x07");
    }

    /// Flush the shared screen and place the hardware cursor at this
    /// window's current position. Matches curses' `wrefresh`: the cursor
    /// shown is whichever window refreshed last.
    pub fn refresh(&self) {
        let (ay, ax) = self.abs(self.cy, self.cx);
        let mut screen = self.screen.borrow_mut();
        screen.cursor = (ax as u16, ay as u16);
        let mut out = io::stdout();
        let _ = screen.flush(&mut out);
    }

    /// Create a sub-window sharing this window's backing storage, at an
    /// offset relative to this window (curses `derwin`).
    pub fn derwin(&self, rows: usize, cols: usize, y: usize, x: usize) -> TermWindow {
        let (ay, ax) = self.abs(y, x);
        TermWindow {
            screen: Rc::clone(&self.screen),
            x0: ax,
            y0: ay,
            width: cols,
            height: rows,
            cy: 0,
            cx: 0,
            attrs: Attrs::default(),
            scrollok: true,
        }
    }

    fn get_cell(&self, y: usize, x: usize) -> Cell {
        let (ay, ax) = self.abs(y, x);
        let screen = self.screen.borrow();
        let i = screen.idx(ay, ax);
        screen.cells[i]
    }

    fn set_raw(&self, y: usize, x: usize, cell: Cell) {
        let (ay, ax) = self.abs(y, x);
        let mut screen = self.screen.borrow_mut();
        let i = screen.idx(ay, ax);
        screen.cells[i] = cell;
    }

    fn set_cell(&self, y: usize, x: usize, glyph: u8, attrs: Attrs) {
        self.set_raw(y, x, Cell { glyph, attrs });
    }

    fn clear_row(&self, y: usize) {
        for x in 0..self.width {
            self.set_cell(y, x, BLANK, Attrs::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addch_writes_and_advances_cursor() {
        let mut w = TermWindow::new_root(10, 5);
        w.addch(b'A');
        assert_eq!(w.getyx(), (0, 1));
        w.mv(0, 0);
        assert_eq!(w.inch().glyph, b'A');
    }

    #[test]
    fn addch_at_last_column_does_not_advance_past_edge() {
        let mut w = TermWindow::new_root(3, 2);
        w.mv(0, 2);
        w.addch(b'Z');
        assert_eq!(w.getyx(), (0, 2));
    }

    #[test]
    fn insch_shifts_row_right_and_drops_last() {
        let mut w = TermWindow::new_root(4, 1);
        w.addch(b'a');
        w.addch(b'b');
        w.addch(b'c');
        w.mv(0, 0);
        w.insch(b'X');
        w.mv(0, 0);
        assert_eq!(w.inch().glyph, b'X');
        w.mv(0, 1);
        assert_eq!(w.inch().glyph, b'a');
        w.mv(0, 3);
        assert_eq!(w.inch().glyph, b'b');
    }

    #[test]
    fn scroll_up_discards_top_and_blanks_bottom() {
        let mut w = TermWindow::new_root(2, 2);
        w.mv(0, 0);
        w.addch(b'1');
        w.mv(1, 0);
        w.addch(b'2');
        w.scroll(1);
        w.mv(0, 0);
        assert_eq!(w.inch().glyph, b'2');
        w.mv(1, 0);
        assert_eq!(w.inch().glyph, BLANK);
    }

    #[test]
    fn derwin_shares_storage_with_parent() {
        let root = TermWindow::new_root(10, 4);
        let mut sub = root.derwin(2, 3, 1, 1);
        sub.mv(0, 0);
        sub.addch(b'Q');
        assert_eq!(root.get_cell(1, 1).glyph, b'Q');
    }

    #[test]
    fn clrtobot_blanks_from_cursor_to_end() {
        let mut w = TermWindow::new_root(3, 2);
        for _ in 0..6 {
            w.addch(b'x');
        }
        w.mv(1, 1);
        w.clrtobot();
        w.mv(0, 0);
        assert_eq!(w.inch().glyph, b'x');
        w.mv(1, 1);
        assert_eq!(w.inch().glyph, BLANK);
        w.mv(1, 0);
        assert_eq!(w.inch().glyph, b'x');
    }
}
