//! Terminal IO devices.
use std::io::{self, Stdout, Write};

use chip8::{constants::*, Buzzer, Screen};
use crossterm::{
    cursor,
    event::{
        KeyCode as TermKey, KeyEvent, KeyEventKind, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute, queue,
    style::Print,
    terminal::{self, ClearType},
};

use crate::inputmap::HostKey;

/// Puts the terminal into raw mode on an alternate screen, and
/// restores it when dropped.
pub struct TerminalGuard {
    enhanced: bool,
}

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide)?;

        // Key release events are only reported with the keyboard enhancement protocol.
        let enhanced = matches!(terminal::supports_keyboard_enhancement(), Ok(true));
        if enhanced {
            execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }
        log::info!("terminal key release events: {enhanced}");

        Ok(Self { enhanced })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        if self.enhanced {
            let _ = execute!(stdout, PopKeyboardEnhancementFlags);
        }
        let _ = execute!(stdout, cursor::Show, terminal::LeaveAlternateScreen);
        if let Err(err) = terminal::disable_raw_mode() {
            log::error!("failed to restore terminal: {err}");
        }
    }
}

/// Translate a terminal key event into a host key and pressed state.
pub fn translate_key(event: &KeyEvent) -> Option<(HostKey, bool)> {
    let key = match event.code {
        TermKey::Char(' ') => HostKey::Space,
        TermKey::Char(c) => HostKey::Char(c.to_ascii_lowercase()),
        TermKey::Esc => HostKey::Esc,
        TermKey::Enter => HostKey::Enter,
        TermKey::Tab => HostKey::Tab,
        TermKey::Backspace => HostKey::Backspace,
        _ => return None,
    };
    let pressed = !matches!(event.kind, KeyEventKind::Release);
    Some((key, pressed))
}

/// Renders the Chip8 display with half-block glyphs,
/// two pixel rows per terminal line.
pub struct TerminalScreen {
    width: usize,
    height: usize,
    frame: Box<[u8]>,
    dirty: bool,
    status: String,
    out: Stdout,
}

impl TerminalScreen {
    pub fn new() -> Self {
        Self::with_size(DISPLAY_WIDTH, DISPLAY_HEIGHT)
    }

    pub fn with_size(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            frame: vec![0; width * height].into_boxed_slice(),
            dirty: true,
            status: String::new(),
            out: io::stdout(),
        }
    }

    /// Write the last drawn frame and a status line to the terminal,
    /// if either changed.
    pub fn render(&mut self, status: &str) -> io::Result<()> {
        if !self.dirty && self.status == status {
            return Ok(());
        }

        let lines = frame_lines(&self.frame, self.width, self.height);
        queue!(self.out, cursor::MoveTo(0, 0))?;
        for (row, line) in lines.iter().enumerate() {
            queue!(self.out, cursor::MoveTo(0, row as u16), Print(line))?;
        }
        queue!(
            self.out,
            cursor::MoveTo(0, lines.len() as u16),
            terminal::Clear(ClearType::CurrentLine),
            Print(status)
        )?;
        self.out.flush()?;

        self.dirty = false;
        self.status.clear();
        self.status.push_str(status);
        Ok(())
    }
}

impl Default for TerminalScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen for TerminalScreen {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn draw(&mut self, display: &[u8]) {
        self.frame.copy_from_slice(display);
        self.dirty = true;
    }
}

/// Convert a framebuffer into text, combining each pair of pixel rows
/// into one line of half-block characters.
pub fn frame_lines(frame: &[u8], width: usize, height: usize) -> Vec<String> {
    (0..height)
        .step_by(2)
        .map(|y| {
            (0..width)
                .map(|x| {
                    let top = frame[x + y * width] != 0;
                    let bottom = y + 1 < height && frame[x + (y + 1) * width] != 0;
                    match (top, bottom) {
                        (true, true) => '█',
                        (true, false) => '▀',
                        (false, true) => '▄',
                        (false, false) => ' ',
                    }
                })
                .collect()
        })
        .collect()
}

/// Rings the terminal bell when the tone starts.
///
/// A terminal cannot hold a continuous tone, so stopping is silent.
#[derive(Debug, Default)]
pub struct TerminalBell {
    ringing: bool,
}

impl TerminalBell {
    pub fn is_ringing(&self) -> bool {
        self.ringing
    }
}

impl Buzzer for TerminalBell {
    fn start(&mut self) {
        self.ringing = true;
        let mut stdout = io::stdout();
        if let Err(err) = stdout.write_all(b"\x07").and_then(|_| stdout.flush()) {
            log::warn!("bell: {err}");
        }
    }

    fn stop(&mut self) {
        self.ringing = false;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crossterm::event::KeyModifiers;

    #[test]
    fn test_frame_lines() {
        let (width, height) = (3, 3);
        #[rustfmt::skip]
        let frame = [
            1, 0, 1,
            1, 0, 0,
            0, 1, 1,
        ];
        let lines = frame_lines(&frame, width, height);
        assert_eq!(lines, vec!["█ ▀".to_string(), " ▀▀".to_string()]);
    }

    #[test]
    fn test_draw_marks_dirty() {
        let mut screen = TerminalScreen::with_size(4, 2);
        screen.dirty = false;
        screen.draw(&[1, 0, 0, 1, 0, 0, 0, 0]);
        assert!(screen.dirty);
        assert_eq!(&screen.frame[..], &[1, 0, 0, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_translate_key() {
        let press = KeyEvent::new(TermKey::Char('Q'), KeyModifiers::SHIFT);
        assert_eq!(translate_key(&press), Some((HostKey::Char('q'), true)));

        let mut release = KeyEvent::new(TermKey::Esc, KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(translate_key(&release), Some((HostKey::Esc, false)));

        let other = KeyEvent::new(TermKey::F(1), KeyModifiers::NONE);
        assert_eq!(translate_key(&other), None);
    }
}
