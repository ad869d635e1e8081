//! Server-Sent Events (SSE) streaming parser.
//!
//! Both OpenAI endpoint generations stream completions as SSE `data:`
//! lines and terminate the stream with a literal `[DONE]` payload. This
//! module parses the raw byte stream line by line and hands each data
//! payload to the caller.

use futures_util::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::io::StreamReader;

use crate::ChatError;

/// Parse an SSE stream from a reqwest response, calling `on_data` for each
/// `data:` payload. Returning `false` from the callback ends the stream
/// early (used for the `[DONE]` sentinel).
pub async fn parse_sse_stream(
    response: reqwest::Response,
    on_data: impl FnMut(&str) -> bool,
) -> Result<(), ChatError> {
    let byte_stream = response
        .bytes_stream()
        .map(|result| result.map_err(std::io::Error::other));
    let reader = tokio::io::BufReader::new(StreamReader::new(byte_stream));
    drain_sse_lines(reader, on_data).await
}

async fn drain_sse_lines<R: AsyncBufRead + Unpin>(
    reader: R,
    mut on_data: impl FnMut(&str) -> bool,
) -> Result<(), ChatError> {
    let mut lines = reader.lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| ChatError::Network(e.to_string()))?
    {
        if let Some(data) = line.strip_prefix("data: ") {
            if !on_data(data) {
                return Ok(());
            }
        }
        // Ignore blank separators and other fields (event:, id:, retry:)
    }

    Ok(())
}
