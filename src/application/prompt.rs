//! Operator input for the verification challenge
//!
//! When the site interposes a visual challenge during sign-in there is no
//! automated way through it; the run blocks until a human reads the image
//! and types the characters.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Failed to read operator input: {0}")]
    Io(String),
}

/// Blocking source of a challenge response.
#[async_trait]
pub trait ChallengePrompt: Send + Sync {
    async fn read_challenge_response(
        &self,
        image_path: Option<&Path>,
    ) -> Result<String, PromptError>;
}

/// Reads the response from the controlling terminal.
pub struct TerminalPrompt;

#[async_trait]
impl ChallengePrompt for TerminalPrompt {
    async fn read_challenge_response(
        &self,
        image_path: Option<&Path>,
    ) -> Result<String, PromptError> {
        match image_path {
            Some(path) => println!(
                "Verification challenge detected. Open {} and enter the characters.",
                path.display()
            ),
            None => println!(
                "Verification challenge detected. Check the latest page snapshot and enter the characters."
            ),
        }
        print!("Enter challenge response: ");
        use std::io::Write;
        std::io::stdout()
            .flush()
            .map_err(|e| PromptError::Io(e.to_string()))?;

        // Deliberately blocking: the whole run waits on the operator.
        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin()
                .read_line(&mut line)
                .map(|_| line)
        })
        .await
        .map_err(|e| PromptError::Io(e.to_string()))?
        .map_err(|e| PromptError::Io(e.to_string()))?;

        Ok(line.trim().to_string())
    }
}
