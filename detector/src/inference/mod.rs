//! Client for the inference task servers. One fresh connection per request:
//! ASCII size header, `ACK`, raw little-endian samples, then a decimal score
//! read until the server closes the stream.

use crate::errors::InferenceError;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[derive(Debug, Clone)]
pub struct InferenceClient {
    host: String,
    base_port: u16,
    timeout: Duration,
}

impl InferenceClient {
    pub fn new(host: impl Into<String>, base_port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            base_port,
            timeout,
        }
    }

    /// Sends one mono block to the task server behind `base_port + slot` and
    /// returns its score.
    #[tracing::instrument(skip_all, fields(slot = slot))]
    pub async fn score(
        &self,
        slot: u16,
        sample_rate: u32,
        samples: &[f32],
    ) -> Result<f32, InferenceError> {
        let addr = format!("{}:{}", self.host, self.base_port.saturating_add(slot));
        let mut stream = match tokio::time::timeout(self.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(InferenceError::Unreachable { addr, source }),
            Err(_) => return Err(InferenceError::Timeout(self.timeout)),
        };

        let mut payload = Vec::with_capacity(samples.len() * 4);
        for sample in samples {
            payload.extend_from_slice(&sample.to_le_bytes());
        }
        let header = format!(
            "{},{},{}",
            sample_rate,
            payload.len(),
            std::mem::size_of::<f32>()
        );

        self.io_step(stream.write_all(header.as_bytes()), "send header")
            .await?;

        let mut ack = [0u8; 3];
        self.io_step(stream.read_exact(&mut ack), "read ack").await?;
        if &ack != b"ACK" {
            return Err(InferenceError::Protocol(format!(
                "expected ACK, got {:?}",
                String::from_utf8_lossy(&ack)
            )));
        }

        self.io_step(stream.write_all(&payload), "send samples").await?;

        let mut reply = Vec::new();
        self.io_step(stream.read_to_end(&mut reply), "read score")
            .await?;
        parse_score(&reply)
    }

    async fn io_step<T>(
        &self,
        fut: impl std::future::Future<Output = std::io::Result<T>>,
        what: &str,
    ) -> Result<T, InferenceError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(InferenceError::Protocol(format!("failed to {what}: {source}"))),
            Err(_) => Err(InferenceError::Timeout(self.timeout)),
        }
    }
}

/// The reply is a decimal float, possibly wrapped in square brackets and
/// trailed by a newline.
fn parse_score(reply: &[u8]) -> Result<f32, InferenceError> {
    let text = std::str::from_utf8(reply)
        .map_err(|_| InferenceError::Parse(String::from_utf8_lossy(reply).into_owned()))?;
    let trimmed = text
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim();
    trimmed
        .parse()
        .map_err(|_| InferenceError::Parse(text.trim().to_string()))
}
