use crate::error::{Result, TermiError};
use crate::signal::INTERRUPTS;
use crate::types::{RiskLevel, SafetyVerdict, Step};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    style::{Color, ContentStyle, Stylize},
    terminal,
};
use std::io::{self, BufRead, IsTerminal, Write};
use std::time::Duration;

pub const THEMES: &[&str] = &["monokai", "dracula", "minimal"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Command,
    Warning,
    Error,
    Success,
    Info,
    Muted,
    Header,
    Step,
    Thought,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Theme {
    Monokai,
    Dracula,
    Minimal,
}

impl Theme {
    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "monokai" => Some(Theme::Monokai),
            "dracula" => Some(Theme::Dracula),
            "minimal" => Some(Theme::Minimal),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Theme::Monokai => "monokai",
            Theme::Dracula => "dracula",
            Theme::Minimal => "minimal",
        }
    }

    fn style(&self, tone: Tone) -> ContentStyle {
        let s = ContentStyle::new();
        match self {
            Theme::Monokai => match tone {
                Tone::Success => s.green().bold(),
                Tone::Command => s.cyan().bold(),
                Tone::Warning | Tone::Step => s.yellow().bold(),
                Tone::Error => s.red().bold(),
                Tone::Info => s.white().dim(),
                Tone::Muted => s.dim(),
                Tone::Header => s.cyan().bold().underlined(),
                Tone::Thought => s.italic().dim(),
            },
            Theme::Dracula => {
                let rgb = |r, g, b| Color::Rgb { r, g, b };
                let comment = rgb(0x62, 0x72, 0xa4);
                match tone {
                    Tone::Success => s.with(rgb(0x50, 0xfa, 0x7b)).bold(),
                    Tone::Command => s.with(rgb(0x8b, 0xe9, 0xfd)).bold(),
                    Tone::Warning => s.with(rgb(0xf1, 0xfa, 0x8c)).bold(),
                    Tone::Error => s.with(rgb(0xff, 0x55, 0x55)).bold(),
                    Tone::Info | Tone::Muted => s.with(comment),
                    Tone::Header => s.with(rgb(0xff, 0x79, 0xc6)).bold().underlined(),
                    Tone::Step => s.with(rgb(0xff, 0xb8, 0x6c)).bold(),
                    Tone::Thought => s.with(comment).italic(),
                }
            }
            Theme::Minimal => match tone {
                Tone::Command => s.white().bold(),
                Tone::Warning => s.yellow(),
                Tone::Error => s.red(),
                Tone::Success => s.green(),
                Tone::Info | Tone::Muted => s.dim(),
                Tone::Step => s.bold(),
                Tone::Header => s.bold().underlined(),
                Tone::Thought => s.italic().dim(),
            },
        }
    }
}

pub struct Console {
    out: Box<dyn Write>,
    theme: Theme,
    colored: bool,
    status_len: usize,
}

impl Console {
    pub fn new(theme: &str) -> Self {
        let colored = io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Self::with_writer(Box::new(io::stdout()), theme, colored)
    }

    pub fn with_writer(out: Box<dyn Write>, theme: &str, colored: bool) -> Self {
        Self {
            out,
            theme: Theme::parse(theme).unwrap_or(Theme::Monokai),
            colored,
            status_len: 0,
        }
    }

    pub fn theme_name(&self) -> &'static str {
        self.theme.name()
    }

    pub fn set_theme(&mut self, name: &str) -> bool {
        match Theme::parse(name) {
            Some(theme) => {
                self.theme = theme;
                true
            }
            None => false,
        }
    }

    fn paint(&self, tone: Tone, text: &str) -> String {
        if self.colored {
            self.theme.style(tone).apply(text).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn line(&mut self, text: &str) {
        writeln!(self.out, "{}", text).ok();
    }

    pub fn say(&mut self, tone: Tone, text: &str) {
        let painted = self.paint(tone, text);
        writeln!(self.out, "{}", painted).ok();
    }

    pub fn blank(&mut self) {
        writeln!(self.out).ok();
    }

    pub fn status(&mut self, text: &str) {
        if self.colored {
            eprint!("{}", text);
            io::stderr().flush().ok();
            self.status_len = text.len();
        }
    }

    pub fn clear_status(&mut self) {
        if self.status_len > 0 {
            eprint!("\r{:width$}\r", "", width = self.status_len);
            io::stderr().flush().ok();
            self.status_len = 0;
        }
    }

    pub fn fragment(&mut self, text: &str) {
        write!(self.out, "{}", text).ok();
        self.out.flush().ok();
    }

    pub fn show_command(&mut self, command: &str) {
        self.blank();
        let painted = self.paint(Tone::Command, command);
        writeln!(self.out, "  {}", painted).ok();
        self.blank();
    }

    pub fn show_verdict(&mut self, verdict: &SafetyVerdict) {
        if verdict.is_safe() {
            return;
        }
        let tone = match verdict.level {
            RiskLevel::Critical | RiskLevel::Dangerous => Tone::Error,
            _ => Tone::Warning,
        };
        let header = format!("{} RISK", verdict.level.as_str().to_uppercase());
        self.say(tone, &header);
        for reason in &verdict.reasons {
            writeln!(self.out, "  {}", reason).ok();
        }
        if let Some(suggestion) = verdict.suggestion {
            self.say(Tone::Info, suggestion);
        }
    }

    pub fn show_plan(&mut self, steps: &[Step], notes: Option<&str>) {
        self.blank();
        self.say(Tone::Header, "Execution plan");
        for (i, step) in steps.iter().enumerate() {
            let thought = if step.thought.is_empty() {
                "-"
            } else {
                step.thought.as_str()
            };
            let number = self.paint(Tone::Step, &format!("{:>2}.", i + 1));
            let thought = self.paint(Tone::Thought, thought);
            let cmd = self.paint(Tone::Command, &step.cmd);
            writeln!(self.out, "  {} {}", number, thought).ok();
            writeln!(self.out, "      {}", cmd).ok();
        }
        if let Some(notes) = notes.filter(|n| !n.is_empty()) {
            self.say(Tone::Info, &format!("Notes: {}", notes));
        }
        self.blank();
    }
}

pub trait Prompter {
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool>;
}

#[derive(Default)]
pub struct TerminalPrompter;

struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        terminal::disable_raw_mode().ok();
    }
}

fn read_key(default: bool) -> Result<bool> {
    let _raw = RawMode::enable()?;
    loop {
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        if let Event::Key(k) = event::read()? {
            if k.kind != KeyEventKind::Press {
                continue;
            }
            match k.code {
                KeyCode::Char('c') if k.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Err(TermiError::Interrupted)
                }
                KeyCode::Char('d') if k.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(false)
                }
                KeyCode::Enter => return Ok(default),
                KeyCode::Char('y') | KeyCode::Char('Y') => return Ok(true),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => return Ok(false),
                _ => {}
            }
        }
    }
}

pub fn read_answer<R: BufRead>(input: &mut R, default: bool) -> Result<bool> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(false);
    }
    let answer = line.trim().to_lowercase();
    if answer.is_empty() {
        return Ok(default);
    }
    Ok(matches!(answer.as_str(), "y" | "yes"))
}

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let suffix = if default { "[Y/n]" } else { "[y/N]" };
        eprint!("{} {} ", question, suffix);
        io::stderr().flush().ok();

        let answer = if io::stdin().is_terminal() {
            read_key(default)
        } else {
            INTERRUPTS.take();
            let answer = read_answer(&mut io::stdin().lock(), default);
            if INTERRUPTS.take() {
                Err(TermiError::Interrupted)
            } else {
                answer
            }
        };
        eprintln!();
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Captured(Rc<RefCell<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).to_string()
        }
    }

    #[test]
    fn plain_console_has_no_escapes() {
        let buf = Captured::default();
        let mut console = Console::with_writer(Box::new(buf.clone()), "dracula", false);
        console.show_command("ls -la");
        assert_eq!(buf.text(), "\n  ls -la\n\n");
    }

    #[test]
    fn colored_console_emits_escapes() {
        let buf = Captured::default();
        let mut console = Console::with_writer(Box::new(buf.clone()), "monokai", true);
        console.say(Tone::Error, "boom");
        assert!(buf.text().contains('\u{1b}'));
        assert!(buf.text().contains("boom"));
    }

    #[test]
    fn verdict_rendering() {
        let buf = Captured::default();
        let mut console = Console::with_writer(Box::new(buf.clone()), "minimal", false);
        console.show_verdict(&SafetyVerdict::safe());
        assert_eq!(buf.text(), "");

        console.show_verdict(&crate::safety::classify("rm -rf /"));
        let text = buf.text();
        assert!(text.starts_with("CRITICAL RISK\n"));
        assert!(text.contains("  CRITICAL: "));
        assert!(text.contains("reconsider"));
    }

    #[test]
    fn theme_switching() {
        let mut console = Console::with_writer(Box::new(io::sink()), "nope", false);
        assert_eq!(console.theme_name(), "monokai");
        assert!(console.set_theme("Dracula"));
        assert_eq!(console.theme_name(), "dracula");
        assert!(!console.set_theme("solarized"));
        assert_eq!(console.theme_name(), "dracula");
    }

    #[test]
    fn line_answers() {
        assert!(read_answer(&mut Cursor::new("\n"), true).unwrap());
        assert!(!read_answer(&mut Cursor::new("\n"), false).unwrap());
        assert!(read_answer(&mut Cursor::new("Yes\n"), false).unwrap());
        assert!(!read_answer(&mut Cursor::new("nope\n"), true).unwrap());
        assert!(!read_answer(&mut Cursor::new(""), true).unwrap());
    }
}
