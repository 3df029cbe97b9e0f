use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

const PROMPT: &str = ">>> ";

pub struct PromptReader {
    lines: Lines<BufReader<Stdin>>,
}

impl PromptReader {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// `None` once stdin is closed.
    pub async fn read_user_input(&mut self) -> Result<Option<String>> {
        let mut output = tokio::io::stdout();
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;
        Ok(self.lines.next_line().await?)
    }
}
