//! The interactive line editor: raw single-key input with history browsing
//! and tab completion.
//!
//! Editing state lives for a single `read_line` call; history is borrowed
//! from the REPL. When standard input is not a terminal the editor degrades
//! to plain line reads so the shell stays usable behind a pipe.

use crate::completion;
use crate::history::History;
use anyhow::Result;
use crossterm::cursor::MoveToColumn;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use std::io::{self, BufRead, IsTerminal, Write};

const PROMPT: &str = "$ ";
const BELL: char = '\u{7}';

/// Re-enables cooked mode when dropped, so every exit path restores the
/// terminal.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<RawModeGuard> {
        terminal::enable_raw_mode()?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

pub struct LineEditor<'a> {
    history: &'a History,
}

impl<'a> LineEditor<'a> {
    pub fn new(history: &'a History) -> Self {
        LineEditor { history }
    }

    /// Print the prompt and read one line. `None` means end of input.
    pub fn read_line(&self) -> Result<Option<String>> {
        if !io::stdin().is_terminal() {
            return Ok(read_plain_line()?);
        }

        let mut out = io::stdout();
        write!(out, "{}", PROMPT)?;
        out.flush()?;

        let _guard = RawModeGuard::enable()?;
        let mut state = EditState::new(self.history);
        loop {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match state.on_key(key, &mut out)? {
                    Some(Outcome::Line(line)) => return Ok(Some(line)),
                    Some(Outcome::Eof) => return Ok(None),
                    None => {}
                }
            }
        }
    }
}

/// Line reading without a terminal: no echo, no completion, no history
/// browsing.
fn read_plain_line() -> io::Result<Option<String>> {
    let mut out = io::stdout();
    write!(out, "{}", PROMPT)?;
    out.flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}

enum Outcome {
    Line(String),
    Eof,
}

struct EditState<'a> {
    history: &'a History,
    buffer: String,
    /// History browsing position; `history.len()` is the live line.
    cursor: usize,
    /// The live line, saved when browsing away from it.
    snapshot: String,
    /// Set after a bell for an ambiguous prefix; the next Tab lists.
    tab_primed: bool,
}

impl<'a> EditState<'a> {
    fn new(history: &'a History) -> Self {
        EditState {
            history,
            buffer: String::new(),
            cursor: history.len(),
            snapshot: String::new(),
            tab_primed: false,
        }
    }

    fn on_key<W: Write>(&mut self, key: KeyEvent, out: &mut W) -> Result<Option<Outcome>> {
        let is_tab = key.code == KeyCode::Tab;
        match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('d')) => {
                if self.buffer.is_empty() {
                    write!(out, "\r\n")?;
                    out.flush()?;
                    return Ok(Some(Outcome::Eof));
                }
            }
            (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                write!(out, "^C\r\n")?;
                out.flush()?;
                return Ok(Some(Outcome::Line(String::new())));
            }
            (_, KeyCode::Enter) => {
                write!(out, "\r\n")?;
                out.flush()?;
                return Ok(Some(Outcome::Line(std::mem::take(&mut self.buffer))));
            }
            (_, KeyCode::Backspace) => {
                if self.buffer.pop().is_some() {
                    write!(out, "\x08 \x08")?;
                    out.flush()?;
                }
            }
            (_, KeyCode::Up) => self.history_up(out)?,
            (_, KeyCode::Down) => self.history_down(out)?,
            (_, KeyCode::Tab) => self.complete(out)?,
            (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(ch)) => {
                self.buffer.push(ch);
                write!(out, "{}", ch)?;
                out.flush()?;
            }
            _ => {}
        }
        if !is_tab {
            self.tab_primed = false;
        }
        Ok(None)
    }

    fn history_up<W: Write>(&mut self, out: &mut W) -> Result<()> {
        if self.cursor == 0 {
            return Ok(());
        }
        if self.cursor == self.history.len() {
            self.snapshot = self.buffer.clone();
        }
        self.cursor -= 1;
        self.buffer = self.history.entry(self.cursor).unwrap_or("").to_string();
        self.redraw(out)
    }

    fn history_down<W: Write>(&mut self, out: &mut W) -> Result<()> {
        if self.cursor >= self.history.len() {
            return Ok(());
        }
        self.cursor += 1;
        self.buffer = if self.cursor == self.history.len() {
            self.snapshot.clone()
        } else {
            self.history.entry(self.cursor).unwrap_or("").to_string()
        };
        self.redraw(out)
    }

    /// Completion applies only while the first token is being typed.
    fn complete<W: Write>(&mut self, out: &mut W) -> Result<()> {
        if self.buffer.contains(' ') {
            return Ok(());
        }
        let matches = completion::candidates(&self.buffer);
        if matches.is_empty() {
            ring_bell(out)?;
            return Ok(());
        }
        if matches.len() == 1 {
            self.buffer = format!("{} ", matches[0]);
            self.tab_primed = false;
            return self.redraw(out);
        }

        let prefix = completion::longest_common_prefix(&matches);
        if prefix.len() > self.buffer.len() {
            self.buffer = prefix;
            self.tab_primed = false;
            return self.redraw(out);
        }

        if self.tab_primed {
            self.tab_primed = false;
            write!(out, "\r\n{}\r\n", matches.join("  "))?;
            write!(out, "{}{}", PROMPT, self.buffer)?;
            out.flush()?;
        } else {
            self.tab_primed = true;
            ring_bell(out)?;
        }
        Ok(())
    }

    /// Clear the current line and reprint the prompt and buffer.
    fn redraw<W: Write>(&self, out: &mut W) -> Result<()> {
        queue!(
            out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(PROMPT),
            Print(&self.buffer)
        )?;
        out.flush()?;
        Ok(())
    }
}

fn ring_bell<W: Write>(out: &mut W) -> Result<()> {
    write!(out, "{}", BELL)?;
    out.flush()?;
    Ok(())
}
