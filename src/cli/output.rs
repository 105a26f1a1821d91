//! Operator-facing terminal output.

use cyrup_termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use std::io::{self, IsTerminal, Write};

const RULE_WIDTH: usize = 70;

/// Kind of status line, which decides its marker and colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Progress,
    Success,
    Warn,
    Error,
}

impl Tone {
    fn marker(self) -> &'static str {
        match self {
            Tone::Progress => "🔍",
            Tone::Success => "✅",
            Tone::Warn => "⚠️ ",
            Tone::Error => "❌",
        }
    }

    fn spec(self) -> ColorSpec {
        let mut spec = ColorSpec::new();
        match self {
            Tone::Progress => spec.set_fg(Some(Color::Blue)),
            Tone::Success => spec.set_fg(Some(Color::Green)).set_bold(true),
            Tone::Warn => spec.set_fg(Some(Color::Yellow)).set_bold(true),
            Tone::Error => spec.set_fg(Some(Color::Red)).set_bold(true),
        };
        spec
    }
}

/// Prints progress, results and warnings in a consistent layout.
///
/// Diagnostic detail goes through `log`; this is only what the operator
/// reads while the deployment runs. Colour is used when the stream is a
/// terminal.
#[derive(Debug, Clone)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
}

impl OutputManager {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    fn stdout(&self) -> StandardStream {
        let choice = if io::stdout().is_terminal() {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        StandardStream::stdout(choice)
    }

    fn stderr(&self) -> StandardStream {
        let choice = if io::stderr().is_terminal() {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        StandardStream::stderr(choice)
    }

    fn status(&self, tone: Tone, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        write_status(&mut self.stdout(), tone, message)
    }

    fn plain(&self, message: &str) -> io::Result<()> {
        let mut stdout = self.stdout();
        writeln!(stdout, "{message}")?;
        stdout.flush()
    }

    /// Print detail only shown in verbose mode
    pub fn verbose(&self, message: &str) -> io::Result<()> {
        if self.verbose && !self.quiet {
            self.plain(message)?;
        }
        Ok(())
    }

    pub fn progress(&self, message: &str) -> io::Result<()> {
        self.status(Tone::Progress, message)
    }

    pub fn success(&self, message: &str) -> io::Result<()> {
        self.status(Tone::Success, message)
    }

    pub fn warn(&self, message: &str) -> io::Result<()> {
        self.status(Tone::Warn, message)
    }

    /// Errors are printed even in quiet mode, on stderr
    pub fn error(&self, message: &str) -> io::Result<()> {
        write_status(&mut self.stderr(), Tone::Error, message)
    }

    /// Boxed section header
    pub fn section(&self, title: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        write_section(&mut self.stdout(), title)
    }

    pub fn indent(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.plain(&format!("   {message}"))
    }

    pub fn blank(&self) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.plain("")
    }
}

fn write_status<W: WriteColor>(out: &mut W, tone: Tone, message: &str) -> io::Result<()> {
    out.set_color(&tone.spec())?;
    write!(out, "{}", tone.marker())?;
    out.reset()?;
    writeln!(out, " {message}")?;
    out.flush()
}

fn write_section<W: WriteColor>(out: &mut W, title: &str) -> io::Result<()> {
    let rule = "=".repeat(RULE_WIDTH);
    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
    write!(out, "\n{rule}\n  {title}\n{rule}")?;
    out.reset()?;
    writeln!(out)?;
    out.flush()
}
