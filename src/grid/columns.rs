//! Columns grid (component C): N logical panes striped across the
//! physical canvas, acting as one `height * num_columns` tall logical
//! screen via the spill algorithm (§4.2).

use crate::attrs::Attrs;
use crate::canvas::{Cell, TermWindow};
use crate::error::TcvtError;

use super::{clamp, Grid};

pub struct Columns {
    parent: TermWindow,
    panes: Vec<TermWindow>,
    height: usize,
    num_columns: usize,
    column_width: usize,
    y_log: usize,
    x_log: usize,
    attrs: Attrs,
}

impl Columns {
    /// Builds N sub-panes from `parent`'s full rectangle. Reproduces the
    /// original's guard verbatim: it rejects `num_columns < 1` even though
    /// its error text says "need at least two columns" (see DESIGN.md).
    pub fn new(parent: TermWindow, num_columns: usize) -> Result<Self, TcvtError> {
        if num_columns < 1 {
            return Err(TcvtError::BadWidth("need at least two columns"));
        }
        let (height, width) = parent.getmaxyx();
        let column_width = width
            .checked_sub(num_columns - 1)
            .map(|w| w / num_columns)
            .unwrap_or(0);
        if column_width == 0 {
            return Err(TcvtError::BadWidth("resulting column width too small"));
        }

        let mut panes = Vec::with_capacity(num_columns);
        for i in 0..num_columns {
            let mut pane = parent.derwin(height, column_width, 0, i * (column_width + 1));
            pane.scrollok(true);
            panes.push(pane);
        }

        let mut parent = parent;
        for i in 1..num_columns {
            parent.vline(i * (column_width + 1) - 1, 0, height);
        }

        Ok(Columns {
            parent,
            panes,
            height,
            num_columns,
            column_width,
            y_log: 0,
            x_log: 0,
            attrs: Attrs::default(),
        })
    }

    fn active_index(&self) -> usize {
        self.y_log / self.height
    }

    fn sync_pane_cursor(&mut self) {
        let k = self.active_index();
        let local_y = self.y_log % self.height;
        self.panes[k].mv(local_y, self.x_log);
    }

    /// Copy pane `index`'s first row onto pane `index - 1`'s last row,
    /// then scroll pane `index` up. The last column is written with
    /// `insch` so it never triggers a wrap inside the sub-pane.
    fn spill_up(&mut self, index: usize) {
        assert!(index > 0);
        self.panes[index - 1].mv(self.height - 1, 0);
        for x in 0..self.column_width.saturating_sub(1) {
            let cell = self.panes[index].get_cell_at(0, x);
            self.panes[index - 1].addch_cell(cell);
        }
        let last = self.panes[index].get_cell_at(0, self.column_width - 1);
        self.panes[index - 1].insch_cell(last);
        self.sync_pane_cursor();
        self.panes[index].scroll(1);
    }

    /// Scroll pane `index` down, then copy pane `index - 1`'s last row
    /// onto pane `index`'s now-blank first row.
    fn spill_down(&mut self, index: usize) {
        assert!(index > 0);
        self.panes[index].scroll(-1);
        self.panes[index].mv(0, 0);
        for x in 0..self.column_width.saturating_sub(1) {
            let cell = self.panes[index - 1].get_cell_at(self.height - 1, x);
            self.panes[index].addch_cell(cell);
        }
        let last = self.panes[index - 1].get_cell_at(self.height - 1, self.column_width - 1);
        self.panes[index].insch_cell(last);
        self.sync_pane_cursor();
    }
}

impl Grid for Columns {
    fn max_yx(&self) -> (usize, usize) {
        (self.height * self.num_columns, self.column_width)
    }

    fn yx(&self) -> (usize, usize) {
        (self.y_log, self.x_log)
    }

    fn move_to(&mut self, y: i64, x: i64) {
        let (rows, cols) = self.max_yx();
        self.y_log = clamp(y, rows);
        self.x_log = clamp(x, cols);
        self.sync_pane_cursor();
    }

    fn addch(&mut self, glyph: u8) {
        let k = self.active_index();
        self.panes[k].attrset(self.attrs);
        if self.x_log == self.column_width.saturating_sub(1) {
            self.panes[k].insch(glyph);
            if self.y_log + 1 == self.height * self.num_columns {
                self.scroll();
                self.move_to((self.height * self.num_columns - 1) as i64, 0);
            } else {
                self.move_to((self.y_log + 1) as i64, 0);
            }
        } else {
            self.panes[k].addch(glyph);
            self.x_log += 1;
        }
    }

    fn insch(&mut self, glyph: u8) {
        let k = self.active_index();
        self.panes[k].attrset(self.attrs);
        self.panes[k].insch(glyph);
    }

    fn delch(&mut self) {
        let k = self.active_index();
        self.panes[k].delch();
    }

    fn inch(&self) -> Cell {
        self.panes[self.active_index()].inch()
    }

    fn scroll(&mut self) {
        self.panes[0].scroll(1);
        for i in 1..self.num_columns {
            self.spill_up(i);
        }
    }

    fn clrtobot(&mut self) {
        let k = self.active_index();
        for i in k + 1..self.num_columns {
            self.panes[i].clear();
        }
        self.panes[k].clrtobot();
    }

    fn clrtoeol(&mut self) {
        let k = self.active_index();
        self.panes[k].clrtoeol();
    }

    fn insertln(&mut self) {
        let k = self.active_index();
        for i in (k + 1..self.num_columns).rev() {
            self.spill_down(i);
        }
        self.panes[k].insertln();
    }

    fn deleteln(&mut self) {
        let k = self.active_index();
        self.panes[k].deleteln();
        for i in k + 1..self.num_columns {
            self.spill_up(i);
        }
    }

    fn attron(&mut self, mask: Attrs) {
        self.attrs.attron(mask);
    }

    fn attrset(&mut self, mask: Attrs) {
        self.attrs.attrset(mask);
    }

    fn refresh(&mut self) {
        self.parent.refresh();
        let k = self.active_index();
        for (i, pane) in self.panes.iter().enumerate() {
            if i != k {
                pane.refresh();
            }
        }
        self.panes[k].refresh();
    }

    fn beep(&self) {
        self.panes[self.active_index()].beep();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: usize, phys_width: usize, n: usize) -> Columns {
        let root = TermWindow::new_root(phys_width, rows);
        Columns::new(root, n).unwrap()
    }

    fn feed(g: &mut Columns, bytes: &[u8]) {
        for b in bytes {
            g.addch(*b);
        }
    }

    #[test]
    fn construction_rejects_zero_columns() {
        let root = TermWindow::new_root(10, 4);
        let err = Columns::new(root, 0).unwrap_err();
        assert_eq!(err.to_string(), "need at least two columns");
    }

    #[test]
    fn construction_rejects_too_narrow_width() {
        let root = TermWindow::new_root(1, 4);
        let err = Columns::new(root, 4).unwrap_err();
        assert_eq!(err.to_string(), "resulting column width too small");
    }

    #[test]
    fn construction_allows_one_column_degenerate_case() {
        let root = TermWindow::new_root(10, 4);
        assert!(Columns::new(root, 1).is_ok());
    }

    #[test]
    fn plain_text_fills_first_logical_row_then_wraps() {
        // H=24, N=2, W_col=40 -> physical width = 40*2+1 = 81
        let mut g = grid(24, 81, 2);
        for _ in 0..40 {
            g.addch(b'A');
        }
        g.addch(b'B');
        assert_eq!(g.yx(), (1, 1));
        g.move_to(0, 0);
        assert_eq!(g.inch().glyph, b'A');
    }

    #[test]
    fn overflow_spills_into_right_pane() {
        // H=2, N=2, W_col=4 -> physical width = 4*2+1 = 9
        let mut g = grid(2, 9, 2);
        feed(&mut g, b"aaaaXXXXbbbbYYYY");
        g.move_to(3, 3);
        assert_eq!(g.inch().glyph, b'Y');
    }

    #[test]
    fn scroll_propagates_rows_from_right_to_left() {
        let mut g = grid(2, 9, 2);
        feed(&mut g, b"aaaaXXXXbbbbYYYY");
        g.addch(b'z');
        assert_eq!(g.yx(), (3, 1));
        g.move_to(0, 0);
        assert_eq!(g.inch().glyph, b'X');
        g.move_to(2, 0);
        assert_eq!(g.inch().glyph, b'b');
        g.move_to(3, 0);
        assert_eq!(g.inch().glyph, b'z');
    }

    #[test]
    fn clrtobot_clears_current_pane_tail_and_later_panes() {
        let mut g = grid(2, 9, 2);
        feed(&mut g, b"aaaaXXXXbbbbYYYY");
        g.move_to(0, 1);
        g.clrtobot();
        g.move_to(0, 0);
        assert_eq!(g.inch().glyph, b'a');
        g.move_to(0, 1);
        assert_eq!(g.inch().glyph, b' ');
        g.move_to(2, 0);
        assert_eq!(g.inch().glyph, b' ');
    }

    #[test]
    fn insertln_then_deleteln_is_idempotent_on_blank_bottom() {
        let mut g = grid(4, 9, 2);
        g.move_to(0, 0);
        feed(&mut g, b"abc");
        g.move_to(0, 0);
        g.insertln();
        g.deleteln();
        g.move_to(0, 0);
        assert_eq!(g.inch().glyph, b'a');
        g.move_to(0, 1);
        assert_eq!(g.inch().glyph, b'b');
    }
}
