//! Confirmation prompt used before overwriting cached data

use async_trait::async_trait;
use std::io::{stdin, stdout, BufRead, IsTerminal, Write};
use tracing::warn;

/// Yes/no question asked of the operator
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, question: &str) -> bool;
}

/// Interactive prompt on the terminal; gives the default when stdin is not a TTY
#[derive(Debug, Default)]
pub struct StdinConfirm {
    pub default: bool,
}

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, question: &str) -> bool {
        if !stdin().is_terminal() {
            return self.default;
        }

        let question = question.to_string();
        let default = self.default;
        let answer = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            let hint = if default { "Y/n" } else { "y/N" };
            print!("? {} ({}) ", question, hint);
            stdout().flush()?;
            let mut input = String::new();
            stdin().lock().read_line(&mut input)?;
            Ok(input)
        })
        .await;

        match answer {
            Ok(Ok(input)) => parse_answer(&input, default),
            Ok(Err(e)) => {
                warn!("[Prompt] Failed to read answer: {}", e);
                default
            }
            Err(e) => {
                warn!("[Prompt] Prompt task failed: {}", e);
                default
            }
        }
    }
}

/// Always declines; used with `--non-interactive`
pub struct AlwaysDecline;

#[async_trait]
impl Confirm for AlwaysDecline {
    async fn confirm(&self, _question: &str) -> bool {
        false
    }
}

/// Interpret a typed answer; blank input (or EOF) takes the default
pub fn parse_answer(input: &str, default: bool) -> bool {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert!(parse_answer("y\n", false));
        assert!(parse_answer("YES", false));
        assert!(!parse_answer("n", true));
        assert!(!parse_answer("", false));
        assert!(parse_answer("", true));
        assert!(!parse_answer("maybe", false));
    }

    #[tokio::test]
    async fn test_always_decline() {
        assert!(!AlwaysDecline.confirm("Overwrite?").await);
    }
}
