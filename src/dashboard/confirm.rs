use crate::Result;
use anyhow::Context;
use std::io::{BufRead, Write};

/// Asks the user a yes/no question.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> Result<bool>;
}

/// Asks on the terminal. Anything other than `y` or `yes` is a no.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        let mut stderr = std::io::stderr();
        write!(stderr, "{question} [y/N] ").context("Unable to write the prompt")?;
        stderr.flush().context("Unable to write the prompt")?;
        let mut answer = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("Unable to read the answer")?;
        Ok(is_yes(&answer))
    }
}

/// Gives the same answer every time, e.g. for `--yes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Answer(pub bool);

impl Confirm for Answer {
    fn confirm(&mut self, _: &str) -> Result<bool> {
        Ok(self.0)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
