use std::{error::Error, fmt, io};

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{LEN_TYPE_SIZE, LenType, MAX_FRAME_SIZE, msg::Msg};

/// A frame header announced more bytes than a receiver accepts.
///
/// The payload is left unread, so the stream can't be resynchronized afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTooLarge {
    pub len: usize,
}

impl fmt::Display for FrameTooLarge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Received a frame of {} bytes, the limit is {MAX_FRAME_SIZE}",
            self.len
        )
    }
}

impl Error for FrameTooLarge {}

impl FrameTooLarge {
    /// Whether `err` was raised because of an oversized frame.
    pub fn is(err: &io::Error) -> bool {
        err.get_ref().is_some_and(|inner| inner.is::<FrameTooLarge>())
    }
}

/// The receiving end handle of the communication.
pub struct OnoReceiver<R: AsyncRead + Unpin> {
    rx: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> OnoReceiver<R> {
    /// Creates a new `OnoReceiver` instance.
    ///
    /// # Arguments
    /// * `rx` - The underlying reader.
    pub(super) fn new(rx: R) -> Self {
        Self {
            rx,
            buf: Vec::new(),
        }
    }

    /// Waits to receive a new message from the inner receiver.
    ///
    /// # Returns
    /// The received message, `None` if the other end closed the connection
    /// in between frames or an `io::Error` on failure. A payload that isn't a valid
    /// message is reported as `InvalidData`, the stream stays usable in that case.
    pub async fn recv(&mut self) -> io::Result<Option<Msg>> {
        let mut size_buf = [0; LEN_TYPE_SIZE];

        match self.rx.read_exact(&mut size_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }

        let len = LenType::from_be_bytes(size_buf) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                FrameTooLarge { len },
            ));
        }

        self.buf.resize(len, 0);
        self.rx.read_exact(&mut self.buf).await?;

        let msg = serde_json::from_slice(&self.buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        Ok(Some(msg))
    }
}
