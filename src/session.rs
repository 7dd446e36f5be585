//! PTY session & event loop (component G): spawns the child under a PTY,
//! bridges its output into the parser, forwards keyboard input, and
//! coalesces refreshes (§4.4).

use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::{debug, info, warn};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use crate::canvas::TermWindow;
use crate::error::TcvtError;
use crate::grid::{ActiveGrid, Columns, Grid, Simple};
use crate::keymap::{Keymap, SpecialKey};
use crate::parser::{Parser, ParserEvent};

const REFRESH_COALESCE: Duration = Duration::from_millis(100);
/// Reserved mode-toggle key. The distilled source reserves curses keycode
/// `0xb3` for this without naming a physical key; this session binds it
/// to F12, the least likely key to collide with a hosted program's own
/// bindings (see DESIGN.md).
const MODE_TOGGLE_KEY: KeyCode = KeyCode::F(12);

enum LoopEvent {
    Key(KeyCode),
    PtyData(Vec<u8>),
    PtyClosed,
    PtyError(std::io::Error),
}

/// PTY master fd, child handle, active grid, and the pending-refresh
/// deadline — the `Session` owns every resource this process holds open.
pub struct Session {
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    grid: ActiveGrid,
    parser: Parser,
    keymap: Keymap,
    devel: bool,
    num_columns: usize,
    refresh_deadline: Option<Instant>,
}

impl Session {
    pub fn spawn(argv: &[String], num_columns: usize) -> Result<Self> {
        let keymap = Keymap::bootstrap().context("resolving terminfo under TERM=ansi")?;

        let pty_system = native_pty_system();
        let (rows, cols) = crossterm::terminal::size()
            .map(|(c, r)| (r as u16, c as u16))
            .unwrap_or((24, 80));
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("opening PTY")?;

        let mut cmd = if let Some(program) = argv.first() {
            let mut cmd = CommandBuilder::new(program);
            cmd.args(&argv[1..]);
            cmd
        } else {
            let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
            CommandBuilder::new(shell)
        };
        cmd.env("TERM", "ansi");

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| TcvtError::ChildExecFailed(e.to_string()))
            .context("spawning child under PTY")?;
        drop(pair.slave);

        let writer = pair.master.take_writer().context("taking PTY writer")?;

        let root = TermWindow::new_root(cols as usize, rows as usize);
        // BadWidth at startup is fatal per §7 — only resize/mode-toggle
        // fall back to Simple (`build_grid`, used in `resized`/`switch_mode`).
        let grid = ActiveGrid::Columns(Columns::new(root, num_columns)?);
        let (max_rows, max_cols) = grid.max_yx();
        let _ = pair.master.resize(PtySize {
            rows: max_rows as u16,
            cols: max_cols as u16,
            pixel_width: 0,
            pixel_height: 0,
        });

        let devel = std::env::var("TCVT_DEVEL").is_ok();

        info!("spawned child under pty, columns={num_columns}");

        Ok(Session {
            master: pair.master,
            child,
            writer,
            grid,
            parser: Parser::new(keymap.acs_map.clone()),
            keymap,
            devel,
            num_columns,
            refresh_deadline: None,
        })
    }

    /// Runs until the child exits or the PTY read side errors out.
    /// Restores cooked mode on every exit path via the guard in `main`.
    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode().context("entering raw mode")?;
        let result = self.run_inner();
        let _ = disable_raw_mode();
        result
    }

    fn run_inner(&mut self) -> Result<()> {
        let (tx, rx) = mpsc::channel();
        let reader = self
            .master
            .try_clone_reader()
            .context("cloning PTY reader")?;
        spawn_pty_reader(tx, reader);

        self.grid.refresh();

        loop {
            let timeout = self.next_timeout();
            match self.poll_next(&rx, timeout)? {
                Some(LoopEvent::Key(code)) => {
                    if !self.handle_key(code)? {
                        break;
                    }
                }
                Some(LoopEvent::PtyData(bytes)) => {
                    self.feed_bytes(&bytes);
                    if self.refresh_deadline.is_none() {
                        self.refresh_deadline = Some(Instant::now() + REFRESH_COALESCE);
                    }
                }
                Some(LoopEvent::PtyClosed) => {
                    debug!("pty closed, child gone");
                    break;
                }
                Some(LoopEvent::PtyError(err)) => {
                    warn!("pty read error: {err}");
                    break;
                }
                None => {
                    self.grid.refresh();
                    self.refresh_deadline = None;
                }
            }
            if let Some(deadline) = self.refresh_deadline {
                if Instant::now() >= deadline {
                    self.grid.refresh();
                    self.refresh_deadline = None;
                }
            }
        }
        let _ = self.child.wait();
        Ok(())
    }

    fn next_timeout(&self) -> Duration {
        match self.refresh_deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => Duration::from_millis(250),
        }
    }

    fn poll_next(
        &mut self,
        rx: &Receiver<LoopEvent>,
        timeout: Duration,
    ) -> Result<Option<LoopEvent>> {
        if event::poll(timeout).context("polling keyboard")? {
            match event::read().context("reading event")? {
                Event::Key(key)
                    if key.kind == KeyEventKind::Press || key.kind == KeyEventKind::Repeat =>
                {
                    return Ok(Some(LoopEvent::Key(key.code)));
                }
                Event::Resize(cols, rows) => self.resized(rows, cols),
                _ => {}
            }
            return Ok(None);
        }
        match rx.try_recv() {
            Ok(ev) => Ok(Some(ev)),
            Err(mpsc::TryRecvError::Empty) => Ok(None),
            Err(mpsc::TryRecvError::Disconnected) => Ok(Some(LoopEvent::PtyClosed)),
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        if code == MODE_TOGGLE_KEY {
            self.switch_mode()?;
            return Ok(true);
        }
        if let Some(special) = classify_special_key(code) {
            if let Some(seq) = self.keymap.sequences.get(&special) {
                let seq = seq.clone();
                let _ = self.writer.write_all(&seq);
            }
            return Ok(true);
        }
        if let KeyCode::Char(ch) = code {
            let mut buf = [0u8; 4];
            let bytes = ch.encode_utf8(&mut buf).as_bytes();
            if bytes.len() == 1 {
                let _ = self.writer.write_all(bytes);
            } else if self.devel {
                anyhow::bail!("getch returned non-ASCII char {ch:?}");
            }
            return Ok(true);
        }
        if code == KeyCode::Enter {
            let _ = self.writer.write_all(b"\r");
        }
        Ok(true)
    }

    fn feed_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            match self.parser.feed(byte, &mut self.grid) {
                Ok(ParserEvent::Bell) => {
                    self.grid.beep();
                }
                Ok(ParserEvent::None) => {}
                Err(TcvtError::ParseError(bad)) => {
                    if self.devel {
                        panic!("unhandled byte 0x{bad:02x} in parser");
                    }
                    self.parser.reset();
                }
                Err(_) => self.parser.reset(),
            }
        }
    }

    fn switch_mode(&mut self) -> Result<()> {
        let (rows, cols) = self.grid.max_yx();
        let toggled_to_simple = matches!(self.grid, ActiveGrid::Columns(_));
        let (phys_rows, phys_cols) = crossterm::terminal::size()
            .map(|(c, r)| (r as usize, c as usize))
            .unwrap_or((rows, cols));
        let root = TermWindow::new_root(phys_cols, phys_rows);
        self.grid = if toggled_to_simple {
            ActiveGrid::Simple(Simple::new(root))
        } else {
            build_grid(root, self.num_columns)
        };
        self.push_size()
    }

    fn resized(&mut self, rows: u16, cols: u16) {
        let root = TermWindow::new_root(cols as usize, rows as usize);
        self.grid = build_grid(root, self.num_columns);
        let _ = self.push_size();
    }

    fn push_size(&mut self) -> Result<()> {
        let (rows, cols) = self.grid.max_yx();
        self.master
            .resize(PtySize {
                rows: rows as u16,
                cols: cols as u16,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("pushing new pty size")
    }
}

/// Rebuild the active grid at a new size, falling back to `Simple` if the
/// requested column count no longer fits (§7, §9): used for resize and
/// mode-toggle, never for the fatal startup path.
fn build_grid(root: TermWindow, num_columns: usize) -> ActiveGrid {
    match Columns::new(root.clone(), num_columns) {
        Ok(columns) => ActiveGrid::Columns(columns),
        Err(_) => ActiveGrid::Simple(Simple::new(root)),
    }
}

fn classify_special_key(code: KeyCode) -> Option<SpecialKey> {
    match code {
        KeyCode::Left => Some(SpecialKey::Left),
        KeyCode::Down => Some(SpecialKey::Down),
        KeyCode::Right => Some(SpecialKey::Right),
        KeyCode::Up => Some(SpecialKey::Up),
        KeyCode::Home => Some(SpecialKey::Home),
        KeyCode::Insert => Some(SpecialKey::Insert),
        KeyCode::Backspace => Some(SpecialKey::Backspace),
        KeyCode::PageUp => Some(SpecialKey::PageUp),
        KeyCode::PageDown => Some(SpecialKey::PageDown),
        KeyCode::F(1) => Some(SpecialKey::F1),
        KeyCode::F(2) => Some(SpecialKey::F2),
        KeyCode::F(3) => Some(SpecialKey::F3),
        KeyCode::F(4) => Some(SpecialKey::F4),
        KeyCode::F(5) => Some(SpecialKey::F5),
        KeyCode::F(6) => Some(SpecialKey::F6),
        KeyCode::F(7) => Some(SpecialKey::F7),
        KeyCode::F(8) => Some(SpecialKey::F8),
        KeyCode::F(9) => Some(SpecialKey::F9),
        _ => None,
    }
}

/// Bridges the PTY master's blocking reads into the single-threaded
/// event loop over a channel (see SPEC_FULL.md §4.4 item 4 for why this
/// one thread exists in an otherwise single-threaded loop).
fn spawn_pty_reader(tx: Sender<LoopEvent>, mut reader: Box<dyn Read + Send>) {
    thread::spawn(move || {
        let mut buf = [0u8; 1024];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    let _ = tx.send(LoopEvent::PtyClosed);
                    break;
                }
                Ok(n) => {
                    if tx.send(LoopEvent::PtyData(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = tx.send(LoopEvent::PtyError(err));
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_special_key_maps_arrows() {
        assert_eq!(classify_special_key(KeyCode::Left), Some(SpecialKey::Left));
        assert_eq!(classify_special_key(KeyCode::Char('a')), None);
    }
}
