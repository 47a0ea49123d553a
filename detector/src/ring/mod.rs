//! Client for the ring-buffer audio server: a line-command protocol followed
//! by a raw dump of float32 interleaved stereo frames.

use crate::errors::RingError;
use delfi_types::audio::StereoBlock;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Upper bound on a single dump, guarding against a corrupt length reply.
const MAX_DUMP_BYTES: u64 = 1 << 30;

const SIZE_OF_FLOAT: u64 = 4;
const CHANNELS: u64 = 2;

#[derive(Debug, Clone)]
pub struct RingClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl RingClient {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reachability check used at startup; opens and drops one connection.
    pub async fn probe(&self) -> Result<(), RingError> {
        self.connect().await.map(drop)
    }

    async fn connect(&self) -> Result<TcpStream, RingError> {
        let addr = self.addr();
        match tokio::time::timeout(self.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(RingError::Unreachable { addr, source }),
            Err(_) => Err(RingError::Timeout(self.timeout)),
        }
    }

    /// Fetches one stereo block.
    ///
    /// The exchange asks for the frame count per block, the block count and
    /// the sample rate, round-trips the `seconds` command for wire
    /// compatibility (the reply is defined as unused), then reads the framed
    /// dump of exactly `blocks * frames * 2` float32 samples.
    #[tracing::instrument(skip_all)]
    pub async fn fetch(&self) -> Result<StereoBlock, RingError> {
        let stream = self.connect().await?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let nframes = self.command_u64(&mut reader, &mut write_half, "nframes").await?;
        if nframes == 0 {
            return Err(RingError::Protocol("server reported zero frames".into()));
        }
        let nblocks = self.command_u64(&mut reader, &mut write_half, "len").await?;
        let sample_rate = self.command_u64(&mut reader, &mut write_half, "rate").await?;
        let sample_rate = u32::try_from(sample_rate)
            .map_err(|_| RingError::Protocol(format!("implausible sample rate {sample_rate}")))?;
        if sample_rate == 0 {
            return Err(RingError::Protocol("server reported zero sample rate".into()));
        }
        // reply content is unused but the round-trip is part of the contract;
        // numeric or junk content are both tolerated
        let _ = self.command_line(&mut reader, &mut write_half, "seconds").await?;

        let dump_bytes = nblocks
            .checked_mul(SIZE_OF_FLOAT)
            .and_then(|bytes| bytes.checked_mul(nframes))
            .and_then(|bytes| bytes.checked_mul(CHANNELS))
            .filter(|&bytes| bytes > 0 && bytes <= MAX_DUMP_BYTES)
            .ok_or_else(|| {
                RingError::Protocol(format!(
                    "implausible dump size ({nblocks} blocks x {nframes} frames)"
                ))
            })?;

        self.write_command(&mut write_half, "dump").await?;
        let mut raw = vec![0u8; dump_bytes as usize];
        match tokio::time::timeout(self.timeout, reader.read_exact(&mut raw)).await {
            Ok(Ok(_)) => {}
            Ok(Err(source)) => {
                return Err(RingError::Protocol(format!("short dump read: {source}")));
            }
            Err(_) => return Err(RingError::Timeout(self.timeout)),
        }

        let frames = (nblocks * nframes) as usize;
        let mut left = Vec::with_capacity(frames);
        let mut right = Vec::with_capacity(frames);
        for frame in raw.chunks_exact(2 * SIZE_OF_FLOAT as usize) {
            left.push(f32::from_le_bytes(frame[0..4].try_into().expect("4-byte chunk")));
            right.push(f32::from_le_bytes(frame[4..8].try_into().expect("4-byte chunk")));
        }
        Ok(StereoBlock::new(sample_rate, left, right))
    }

    async fn write_command(
        &self,
        writer: &mut OwnedWriteHalf,
        command: &str,
    ) -> Result<(), RingError> {
        let line = format!("{command}\n");
        match tokio::time::timeout(self.timeout, writer.write_all(line.as_bytes())).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(RingError::Protocol(format!(
                "failed to send {command}: {source}"
            ))),
            Err(_) => Err(RingError::Timeout(self.timeout)),
        }
    }

    async fn command_line(
        &self,
        reader: &mut BufReader<OwnedReadHalf>,
        writer: &mut OwnedWriteHalf,
        command: &str,
    ) -> Result<String, RingError> {
        self.write_command(writer, command).await?;
        let mut line = String::new();
        match tokio::time::timeout(self.timeout, reader.read_line(&mut line)).await {
            Ok(Ok(0)) => Err(RingError::Protocol(format!(
                "connection closed while waiting for {command} reply"
            ))),
            Ok(Ok(_)) => Ok(line),
            Ok(Err(source)) => Err(RingError::Protocol(format!(
                "failed to read {command} reply: {source}"
            ))),
            Err(_) => Err(RingError::Timeout(self.timeout)),
        }
    }

    async fn command_u64(
        &self,
        reader: &mut BufReader<OwnedReadHalf>,
        writer: &mut OwnedWriteHalf,
        command: &str,
    ) -> Result<u64, RingError> {
        let line = self.command_line(reader, writer, command).await?;
        line.trim().parse().map_err(|_| {
            RingError::Protocol(format!("malformed {command} reply {:?}", line.trim()))
        })
    }
}
