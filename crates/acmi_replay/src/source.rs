use anyhow::Context;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

pub type StreamReader = Box<dyn AsyncBufRead + Unpin + Send>;

/// Open a recorded stream, or stdin when `path` is `None`.
pub async fn open(path: Option<&Path>) -> anyhow::Result<StreamReader> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open stream '{}'", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
    }
}

/// Groups a line stream into chunks of complete, newline-terminated lines.
pub struct ChunkReader<R> {
    lines: Lines<R>,
    chunk_lines: usize,
}

impl<R: AsyncBufRead + Unpin> ChunkReader<R> {
    pub fn new(reader: R, chunk_lines: usize) -> Self {
        Self {
            lines: reader.lines(),
            chunk_lines: chunk_lines.max(1),
        }
    }

    /// Next chunk, or `None` at end of stream. The last chunk may be short.
    pub async fn next_chunk(&mut self) -> std::io::Result<Option<String>> {
        let mut chunk = String::new();
        let mut count = 0;

        while count < self.chunk_lines {
            let Some(line) = self.lines.next_line().await? else {
                break;
            };
            chunk.push_str(line.trim_end_matches('\r'));
            chunk.push('\n');
            count += 1;
        }

        Ok((count > 0).then_some(chunk))
    }
}
