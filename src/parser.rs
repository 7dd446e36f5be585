//! Input parser (component E): a byte-fed state machine that turns the
//! subset of ANSI/VT control sequences the hosted programs emit into
//! operations on the active `Grid`.

use std::collections::HashMap;

use crate::attrs::{pair_index, Attrs};
use crate::error::TcvtError;
use crate::grid::Grid;

/// Side effects the caller must perform that aren't grid operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserEvent {
    None,
    Bell,
}

fn is_printable(byte: u8) -> bool {
    matches!(byte,
        b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9'
        | b'@' | b':' | b'~' | b'$' | b' ' | b'.' | b'#' | b'!' | b'/' | b'_'
        | b'(' | b')' | b',' | b'[' | b']' | b'=' | b'-' | b'+' | b'*' | b'\''
        | b'"' | b'|' | b'<' | b'>' | b'%' | b'&' | b'\\' | b'?' | b';' | b'`'
        | b'^' | b'{' | b'}'
        | 0xb4 | 0xb6 | 0xb7 | 0xc3 | 0xc4 | 0xd6 | 0xdc | 0xe4 | 0xe9 | 0xfc | 0xf6
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Simple,
    Graphics,
    Esc,
    CsiInitial,
    /// Accumulating `0-9;` bytes (the original's `prev` buffer).
    CsiParams(Vec<u8>),
}

pub struct Parser {
    state: State,
    graphics_font: bool,
    last_char: u8,
    fg: u8,
    bg: u8,
    acs_map: HashMap<u8, u8>,
}

impl Parser {
    pub fn new(acs_map: HashMap<u8, u8>) -> Self {
        Parser {
            state: State::Simple,
            graphics_font: false,
            last_char: b' ',
            fg: 0,
            bg: 0,
            acs_map,
        }
    }

    /// Reset to the start state for the current font mode. Invoked after
    /// every completed escape sequence, and on a `ParseError` when
    /// `TCVT_DEVEL` is unset (§7).
    pub fn reset(&mut self) {
        self.state = if self.graphics_font {
            State::Graphics
        } else {
            State::Simple
        };
    }

    fn addch(&mut self, grid: &mut dyn Grid, glyph: u8) {
        self.last_char = glyph;
        grid.addch(glyph);
    }

    pub fn feed(&mut self, byte: u8, grid: &mut dyn Grid) -> Result<ParserEvent, TcvtError> {
        let state = std::mem::replace(&mut self.state, State::Simple);
        match state {
            State::Simple => self.feed_simple(byte, grid),
            State::Graphics => self.feed_graphics(byte, grid),
            State::Esc => self.feed_esc(byte),
            State::CsiInitial => self.feed_csi_initial(byte, grid),
            State::CsiParams(prev) => self.feed_csi_params(byte, prev, grid),
        }
    }

    fn feed_simple(&mut self, byte: u8, grid: &mut dyn Grid) -> Result<ParserEvent, TcvtError> {
        match byte {
            0x07 => {
                self.state = State::Simple;
                return Ok(ParserEvent::Bell);
            }
            b'\n' => self.do_ind(grid),
            b'\r' => self.do_cr(grid),
            b'\t' => self.do_ht(grid),
            0x1b => {
                self.state = State::Esc;
                return Ok(ParserEvent::None);
            }
            0x08 => grid.relmove(0, -1),
            _ if is_printable(byte) => self.addch(grid, byte),
            _ => return Err(TcvtError::ParseError(byte)),
        }
        self.state = State::Simple;
        Ok(ParserEvent::None)
    }

    fn feed_graphics(&mut self, byte: u8, grid: &mut dyn Grid) -> Result<ParserEvent, TcvtError> {
        match byte {
            0x1b => {
                self.state = State::Esc;
                return Ok(ParserEvent::None);
            }
            _ if self.acs_map.contains_key(&byte) => {
                let mapped = self.acs_map[&byte];
                self.addch(grid, mapped);
            }
            b'q' => self.addch(grid, crate::canvas::HLINE),
            _ => return Err(TcvtError::ParseError(byte)),
        }
        self.state = State::Graphics;
        Ok(ParserEvent::None)
    }

    fn feed_esc(&mut self, byte: u8) -> Result<ParserEvent, TcvtError> {
        if byte == b'[' {
            self.state = State::CsiInitial;
            Ok(ParserEvent::None)
        } else {
            self.reset();
            Err(TcvtError::ParseError(byte))
        }
    }

    fn feed_csi_initial(
        &mut self,
        byte: u8,
        grid: &mut dyn Grid,
    ) -> Result<ParserEvent, TcvtError> {
        match byte {
            b'A' => grid.relmove(-1, 0),
            b'B' => grid.relmove(1, 0),
            b'C' => grid.relmove(0, 1),
            b'D' => grid.relmove(0, -1),
            b'H' => grid.move_to(0, 0),
            b'J' => grid.clrtobot(),
            b'K' => grid.clrtoeol(),
            b'L' => grid.insertln(),
            b'M' => grid.deleteln(),
            b'P' => grid.delch(),
            b'm' => self.feed_sgr(&[0], grid)?,
            b'0'..=b'9' => {
                self.state = State::CsiParams(vec![byte]);
                return Ok(ParserEvent::None);
            }
            _ => {
                self.reset();
                return Err(TcvtError::ParseError(byte));
            }
        }
        self.reset();
        Ok(ParserEvent::None)
    }

    fn feed_csi_params(
        &mut self,
        byte: u8,
        mut prev: Vec<u8>,
        grid: &mut dyn Grid,
    ) -> Result<ParserEvent, TcvtError> {
        let as_int = || -> Option<i64> {
            std::str::from_utf8(&prev).ok()?.parse::<i64>().ok()
        };

        match byte {
            b'0'..=b'9' | b';' => {
                prev.push(byte);
                self.state = State::CsiParams(prev);
                return Ok(ParserEvent::None);
            }
            b'm' => {
                let codes: Result<Vec<i64>, _> = prev
                    .split(|b| *b == b';')
                    .map(|p| std::str::from_utf8(p).unwrap_or("").parse::<i64>())
                    .collect();
                match codes {
                    Ok(codes) => {
                        self.feed_sgr(&codes, grid)?;
                    }
                    Err(_) => {
                        self.reset();
                        return Err(TcvtError::ParseError(byte));
                    }
                }
            }
            b'H' => {
                let parts: Vec<&[u8]> = prev.split(|b| *b == b';').collect();
                if parts.len() != 2 {
                    self.reset();
                    return Err(TcvtError::ParseError(byte));
                }
                let row = std::str::from_utf8(parts[0]).ok().and_then(|s| s.parse::<i64>().ok());
                let col = std::str::from_utf8(parts[1]).ok().and_then(|s| s.parse::<i64>().ok());
                match (row, col) {
                    (Some(r), Some(c)) => grid.move_to(r - 1, c - 1),
                    _ => {
                        self.reset();
                        return Err(TcvtError::ParseError(byte));
                    }
                }
            }
            b'J' if prev == b"2" => {
                grid.move_to(0, 0);
                grid.clrtobot();
            }
            b'A' if as_int().is_some() => {
                grid.relmove(-as_int().unwrap(), 0);
            }
            b'B' if as_int().is_some() => {
                grid.relmove(as_int().unwrap(), 0);
            }
            b'C' if as_int().is_some() => {
                grid.relmove(0, as_int().unwrap());
            }
            b'D' if as_int().is_some() => {
                grid.relmove(0, -as_int().unwrap());
            }
            b'L' if as_int().is_some() => {
                for _ in 0..as_int().unwrap() {
                    grid.insertln();
                }
            }
            b'M' if as_int().is_some() => {
                for _ in 0..as_int().unwrap() {
                    grid.deleteln();
                }
            }
            b'P' if as_int().is_some() => {
                for _ in 0..as_int().unwrap() {
                    grid.delch();
                }
            }
            b'X' if as_int().is_some() => {
                for _ in 0..as_int().unwrap() {
                    self.addch(grid, b' ');
                }
            }
            b'@' if as_int().is_some() => {
                for _ in 0..as_int().unwrap() {
                    grid.insch(b' ');
                }
            }
            b'G' if as_int().is_some() => {
                self.do_hpa(grid, as_int().unwrap() - 1);
            }
            b'd' if as_int().is_some() => {
                self.do_vpa(grid, as_int().unwrap() - 1);
            }
            b'b' if as_int().is_some() => {
                for _ in 0..as_int().unwrap() {
                    self.addch(grid, self.last_char);
                }
            }
            b'K' if prev == b"1" => self.do_el1(grid),
            _ => {
                self.reset();
                return Err(TcvtError::ParseError(byte));
            }
        }
        self.reset();
        Ok(ParserEvent::None)
    }

    fn feed_sgr(&mut self, codes: &[i64], grid: &mut dyn Grid) -> Result<ParserEvent, TcvtError> {
        for &code in codes {
            match code {
                1 => grid.attron(Attrs::with_bold()),
                4 => grid.attron(Attrs::with_underline()),
                5 => grid.attron(Attrs::with_blink()),
                8 => grid.attron(Attrs::with_invis()),
                0 => {
                    self.fg = 0;
                    self.bg = 0;
                    grid.attrset(Attrs::default());
                }
                7 => grid.attron(Attrs::with_reverse()),
                10 => {
                    self.graphics_font = false;
                    self.reset();
                }
                11 => {
                    self.graphics_font = true;
                    self.reset();
                }
                30..=37 => {
                    self.fg = (code - 30) as u8;
                    grid.attron(Attrs::with_pair(pair_index(self.fg, self.bg)));
                }
                39 => {
                    self.fg = 7;
                    grid.attron(Attrs::with_pair(pair_index(self.fg, self.bg)));
                }
                40..=47 => {
                    self.bg = (code - 40) as u8;
                    grid.attron(Attrs::with_pair(pair_index(self.fg, self.bg)));
                }
                49 => {
                    self.bg = 0;
                    grid.attron(Attrs::with_pair(pair_index(self.fg, self.bg)));
                }
                _ => return Err(TcvtError::ParseError(code as u8)),
            }
        }
        Ok(ParserEvent::None)
    }

    // -- do_* helpers, named after the symbolic capabilities they implement --

    fn do_ind(&mut self, grid: &mut dyn Grid) {
        let (y, _) = grid.yx();
        let (ym, _) = grid.max_yx();
        if y + 1 == ym {
            grid.scroll();
            grid.move_to(y as i64, 0);
        } else {
            grid.move_to(y as i64 + 1, 0);
        }
    }

    fn do_cr(&mut self, grid: &mut dyn Grid) {
        grid.relmove(0, -9999);
    }

    fn do_ht(&mut self, grid: &mut dyn Grid) {
        let (y, x) = grid.yx();
        let (_, xm) = grid.max_yx();
        let next = x + 8 - x % 8;
        grid.move_to(y as i64, next.min(xm - 1) as i64);
    }

    fn do_hpa(&mut self, grid: &mut dyn Grid, n: i64) {
        let (y, _) = grid.yx();
        grid.move_to(y as i64, n);
    }

    fn do_vpa(&mut self, grid: &mut dyn Grid, n: i64) {
        let (_, x) = grid.yx();
        grid.move_to(n, x as i64);
    }

    fn do_el1(&mut self, grid: &mut dyn Grid) {
        let (y, x) = grid.yx();
        grid.move_to(y as i64, 0);
        for _ in 0..x {
            self.addch(grid, b' ');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::TermWindow;
    use crate::grid::Simple;

    fn feed_str(p: &mut Parser, g: &mut dyn Grid, s: &[u8]) {
        for &b in s {
            p.feed(b, g).unwrap();
        }
    }

    fn simple_grid(rows: usize, cols: usize) -> Simple {
        Simple::new(TermWindow::new_root(cols, rows))
    }

    #[test]
    fn printable_bytes_advance_cursor_and_set_last_char() {
        let mut p = Parser::new(HashMap::new());
        let mut g = simple_grid(5, 10);
        feed_str(&mut p, &mut g, b"hi");
        assert_eq!(g.yx(), (0, 2));
    }

    #[test]
    fn csi_home_and_erase_blanks_everything() {
        let mut p = Parser::new(HashMap::new());
        let mut g = simple_grid(3, 4);
        feed_str(&mut p, &mut g, b"abcd");
        feed_str(&mut p, &mut g, b"\x1b[2J\x1b[H");
        assert_eq!(g.yx(), (0, 0));
        assert_eq!(g.inch().glyph, crate::canvas::BLANK);
    }

    #[test]
    fn sgr_compound_sets_bold_and_color_pair() {
        let mut p = Parser::new(HashMap::new());
        let mut g = simple_grid(3, 10);
        feed_str(&mut p, &mut g, b"\x1b[1;31;44m");
        g.addch(b'X');
        g.move_to(0, 0);
        let cell = g.inch();
        assert_eq!(cell.attrs.pair(), pair_index(1, 4));
        assert!(cell.attrs.modifier().contains(ratatui::style::Modifier::BOLD));
    }

    #[test]
    fn graphics_round_trip_falls_back_to_plain_q() {
        let mut map = HashMap::new();
        map.insert(b'q', crate::canvas::HLINE);
        let mut p = Parser::new(map);
        let mut g = simple_grid(3, 10);
        feed_str(&mut p, &mut g, b"\x1b[11mq\x1b[10mq");
        g.move_to(0, 0);
        assert_eq!(g.inch().glyph, crate::canvas::HLINE);
        g.move_to(0, 1);
        assert_eq!(g.inch().glyph, b'q');
    }

    #[test]
    fn lf_not_at_bottom_resets_column_to_zero() {
        // Reproduces the original's LF/index quirk verbatim (§9): moving
        // down a row also resets the column, conflating LF with CRLF.
        let mut p = Parser::new(HashMap::new());
        let mut g = simple_grid(5, 10);
        feed_str(&mut p, &mut g, b"abc\n");
        assert_eq!(g.yx(), (1, 0));
    }

    #[test]
    fn unmapped_byte_yields_parse_error() {
        let mut p = Parser::new(HashMap::new());
        let mut g = simple_grid(3, 10);
        let err = p.feed(0x01, &mut g).unwrap_err();
        assert!(matches!(err, TcvtError::ParseError(0x01)));
    }
}
