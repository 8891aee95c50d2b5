//! DBGp transport layer: null-terminated message framing.
//!
//! Engine → client messages are `<decimal-length>\0<payload>\0`.
//! Client → engine commands are a single null-terminated line.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::DbgpError;

/// Maximum amount of data read from the socket at once.
const READ_SIZE: usize = 1024;

/// Encode a payload into an engine-style frame.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let header = payload.len().to_string();
    let mut buf = Vec::with_capacity(header.len() + payload.len() + 2);
    buf.extend_from_slice(header.as_bytes());
    buf.push(0);
    buf.extend_from_slice(payload);
    buf.push(0);
    buf
}

/// Decode one frame from the front of `data`.
///
/// Returns `Ok(None)` while the frame is still incomplete, otherwise the
/// payload and the number of bytes consumed.
pub fn decode_frame(data: &[u8]) -> Result<Option<(Vec<u8>, usize)>, DbgpError> {
    match split_frame(data) {
        Some((length, payload, consumed)) => {
            check_length(length, payload)?;
            Ok(Some((payload.to_vec(), consumed)))
        }
        None => Ok(None),
    }
}

/// Split the two null-terminated segments off the front of `data`.
fn split_frame(data: &[u8]) -> Option<(&[u8], &[u8], usize)> {
    let first = data.iter().position(|&b| b == 0)?;
    let rest = &data[first + 1..];
    let second = rest.iter().position(|&b| b == 0)?;
    Some((&data[..first], &rest[..second], first + second + 2))
}

/// Verify the declared length against the raw payload byte count.
fn check_length(length: &[u8], payload: &[u8]) -> Result<(), DbgpError> {
    let text = String::from_utf8_lossy(length);
    let declared: usize = text
        .trim()
        .parse()
        .map_err(|_| DbgpError::Protocol(format!("invalid length header '{text}'")))?;
    if declared != payload.len() {
        return Err(DbgpError::Protocol(format!(
            "length mismatch: header declares {declared} bytes, payload has {}",
            payload.len()
        )));
    }
    Ok(())
}

/// Framed reader/writer over a byte stream.
///
/// Bytes received beyond the current frame stay buffered for the next read.
#[derive(Debug)]
pub struct Transport<S> {
    stream: S,
    buffer: Vec<u8>,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
        }
    }

    /// Read one complete frame and return its payload.
    ///
    /// A frame whose length does not match is consumed from the buffer
    /// before the error is returned, so the next read starts clean.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, DbgpError> {
        loop {
            if let Some((length, payload, consumed)) = split_frame(&self.buffer) {
                let result = check_length(length, payload).map(|()| payload.to_vec());
                self.buffer.drain(..consumed);
                return result;
            }

            let mut chunk = [0u8; READ_SIZE];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(DbgpError::ConnectionClosed);
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    /// Write a command line followed by the null terminator.
    pub async fn write_command(&mut self, command: &[u8]) -> Result<(), DbgpError> {
        let mut data = Vec::with_capacity(command.len() + 1);
        data.extend_from_slice(command);
        data.push(0);
        self.stream.write_all(&data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Bytes received but not yet consumed by a frame.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }
}
