//! Operator prompts.
//!
//! The workflow asks questions through [`Prompter`] so a run can be driven
//! from the terminal, answered automatically (`--yes`) or scripted in tests.

use std::collections::VecDeque;
use std::future::Future;
use std::io::{self, BufRead, Write};
use std::sync::Mutex;

/// Source of operator answers.
pub trait Prompter: Send + Sync {
    /// Ask for a line of free text; the answer is trimmed.
    fn ask(&self, question: &str) -> impl Future<Output = io::Result<String>> + Send;

    /// Ask a yes/no question; anything but `y`/`yes` is a no.
    fn confirm(&self, question: &str) -> impl Future<Output = io::Result<bool>> + Send {
        let question = format!("{question} (y/n): ");
        async move {
            let answer = self.ask(&question).await?;
            Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
        }
    }
}

impl<T: Prompter> Prompter for &T {
    fn ask(&self, question: &str) -> impl Future<Output = io::Result<String>> + Send {
        (**self).ask(question)
    }

    fn confirm(&self, question: &str) -> impl Future<Output = io::Result<bool>> + Send {
        (**self).confirm(question)
    }
}

/// Reads answers from stdin.
///
/// Reading happens on a blocking thread so Ctrl-C stays responsive while a
/// question is pending.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePrompter {
    assume_yes: bool,
}

impl ConsolePrompter {
    /// `assume_yes` answers every confirmation without reading stdin
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Prompter for ConsolePrompter {
    async fn ask(&self, question: &str) -> io::Result<String> {
        let question = question.to_string();
        tokio::task::spawn_blocking(move || {
            let mut stdout = io::stdout().lock();
            write!(stdout, "{question}")?;
            stdout.flush()?;

            let mut answer = String::new();
            let read = io::stdin().lock().read_line(&mut answer)?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stdin closed while waiting for an answer",
                ));
            }
            Ok(answer.trim().to_string())
        })
        .await
        .map_err(io::Error::other)?
    }

    async fn confirm(&self, question: &str) -> io::Result<bool> {
        if self.assume_yes {
            println!("{question} (y/n): y");
            return Ok(true);
        }
        let answer = self.ask(&format!("{question} (y/n): ")).await?;
        Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
    }
}

/// Answers questions from a fixed script and records what was asked.
///
/// Running out of answers is reported as `UnexpectedEof`, the same way a
/// closed stdin would be.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Questions asked so far, in order
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|asked| asked.clone()).unwrap_or_default()
    }
}

impl Prompter for ScriptedPrompter {
    async fn ask(&self, question: &str) -> io::Result<String> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(question.to_string());
        }
        let next = self
            .answers
            .lock()
            .map_err(|_| io::Error::other("answer script poisoned"))?
            .pop_front();
        next.map(|answer| answer.trim().to_string()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("no scripted answer for: {question}"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_answers_in_order() {
        let prompter = ScriptedPrompter::new([" 1.2.0 ", "7"]);

        assert_eq!(prompter.ask("Version: ").await.unwrap(), "1.2.0");
        assert_eq!(prompter.ask("Build: ").await.unwrap(), "7");
        assert_eq!(prompter.asked(), vec!["Version: ", "Build: "]);
    }

    #[tokio::test]
    async fn confirm_accepts_y_and_yes_only() {
        let prompter = ScriptedPrompter::new(["Y", "yes", "n", "sure"]);

        assert!(prompter.confirm("Attach?").await.unwrap());
        assert!(prompter.confirm("Attach?").await.unwrap());
        assert!(!prompter.confirm("Attach?").await.unwrap());
        assert!(!prompter.confirm("Attach?").await.unwrap());
    }

    #[tokio::test]
    async fn exhausted_script_is_eof() {
        let prompter = ScriptedPrompter::new(Vec::<String>::new());
        let err = prompter.ask("Version: ").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn console_assume_yes_skips_stdin() {
        let prompter = ConsolePrompter::new(true);
        assert!(prompter.confirm("Submit for review?").await.unwrap());
    }
}
