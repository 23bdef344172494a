use std::io::{self, BufRead, Write};

use tracing::{debug, error, info, trace, warn};

pub const RULE_WIDTH: usize = 70;

/// Line-oriented operator terminal.
///
/// Everything the sessions print or ask goes through here, so tests can
/// drive a session with scripted answers and inspect what was printed.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn line(&mut self, text: impl std::fmt::Display) -> io::Result<()> {
        writeln!(self.output, "{}", text)
    }

    pub fn blank(&mut self) -> io::Result<()> {
        writeln!(self.output)
    }

    pub fn rule(&mut self) -> io::Result<()> {
        writeln!(self.output, "{}", "=".repeat(RULE_WIDTH))
    }

    /// Title between two rules, preceded by a blank line.
    pub fn banner(&mut self, title: impl std::fmt::Display) -> io::Result<()> {
        self.blank()?;
        self.rule()?;
        self.line(title)?;
        self.rule()
    }

    /// Prints `prompt` without a newline and reads one line of input.
    ///
    /// A closed input stream is an error, there is nothing sensible to
    /// default to.
    pub fn ask(&mut self, prompt: &str) -> io::Result<String> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed while waiting for an answer",
            ));
        }
        let answer = answer.trim().to_string();
        trace!("answer to {:?}: {:?}", prompt.trim(), answer);
        Ok(answer)
    }

    /// Yes only for `y` or `Y`.
    pub fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        Ok(self.ask(prompt)?.eq_ignore_ascii_case("y"))
    }

    /// Blocks until the operator presses Enter.
    pub fn pause(&mut self, prompt: &str) -> io::Result<()> {
        self.ask(prompt).map(|_| ())
    }

    pub fn output(&self) -> &W {
        &self.output
    }
}

#[cfg(test)]
pub(crate) fn scripted(answers: &str) -> Console<io::Cursor<Vec<u8>>, Vec<u8>> {
    Console::new(io::Cursor::new(answers.as_bytes().to_vec()), Vec::new())
}

#[cfg(test)]
pub(crate) fn printed(console: &Console<io::Cursor<Vec<u8>>, Vec<u8>>) -> String {
    String::from_utf8_lossy(console.output()).to_string()
}
