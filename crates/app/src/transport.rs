//! Line-delimited JSON over any async reader/writer pair.
use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

impl LineTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Next non-blank line, or `None` at EOF.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .await
                .context("failed to read line")?;
            if read == 0 {
                return Ok(None);
            }

            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }

    pub async fn write_message<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    #[cfg(test)]
    pub fn into_writer(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::LineTransport;
    use serde_json::json;

    #[tokio::test]
    async fn skips_blank_lines_and_stops_at_eof() -> anyhow::Result<()> {
        let input: &[u8] = b"\n  \n{\"a\":1}\n\n{\"b\":2}";
        let mut transport = LineTransport::new(input, Vec::new());

        assert_eq!(transport.read_line().await?.as_deref(), Some("{\"a\":1}"));
        assert_eq!(transport.read_line().await?.as_deref(), Some("{\"b\":2}"));
        assert_eq!(transport.read_line().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn writes_one_json_object_per_line() -> anyhow::Result<()> {
        let mut transport = LineTransport::new(&b""[..], Vec::new());
        transport.write_message(&json!({"id": 1})).await?;
        transport.write_message(&json!({"id": 2})).await?;

        let written = String::from_utf8(transport.into_writer())?;
        assert_eq!(written, "{\"id\":1}\n{\"id\":2}\n");
        Ok(())
    }
}
