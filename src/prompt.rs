//! Interactive prompts for connection details.
//!
//! Asks for whatever the CLI, config file and environment left unset.

use crate::config::validate_sync_url;
use crate::error::{AhtiError, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

/// Line-oriented prompter over an async reader/writer pair.
pub struct Prompter<R, W> {
    reader: R,
    writer: W,
}

impl Prompter<BufReader<Stdin>, Stdout> {
    /// Prompter bound to the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> Prompter<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Writes `"{label}: "` and returns the answered line without its newline.
    pub async fn ask(&mut self, label: &str) -> Result<String> {
        self.write_prompt(&format!("{label}: ")).await?;
        self.read_answer(label).await
    }

    /// Like [`ask`](Self::ask), but an empty answer yields `default`.
    pub async fn ask_with_default(&mut self, label: &str, default: &str) -> Result<String> {
        self.write_prompt(&format!("{label} [{default}]: ")).await?;
        let answer = self.read_answer(label).await?;
        if answer.trim().is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer.trim().to_string())
        }
    }

    /// Asks for the sync URL and validates it.
    pub async fn sync_url(&mut self, default: &str) -> Result<String> {
        let url = self.ask_with_default("url", default).await?;
        validate_sync_url(&url)?;
        Ok(url)
    }

    /// Asks for the auth token. An empty answer means no auth.
    pub async fn auth_token(&mut self) -> Result<String> {
        Ok(self.ask("token").await?.trim().to_string())
    }

    async fn write_prompt(&mut self, text: &str) -> Result<()> {
        self.writer
            .write_all(text.as_bytes())
            .await
            .map_err(|e| AhtiError::input(format!("Failed to write prompt: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| AhtiError::input(format!("Failed to write prompt: {e}")))
    }

    async fn read_answer(&mut self, label: &str) -> Result<String> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| AhtiError::input(format!("Failed to read {label}: {e}")))?;

        if read == 0 {
            return Err(AhtiError::input(format!(
                "No {label} given (input closed)"
            )));
        }

        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}
