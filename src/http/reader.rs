use crate::{errors::ErrorKind, limits::ReqLimits};
use memchr::memchr;
use std::time::Duration;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    time::sleep,
};

/// Byte buffer that yields `\n`-terminated lines and fixed-length slices.
///
/// Holds no I/O; [`FrameReader`] refills it from the socket.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FrameBuffer {
    buffer: Vec<u8>,
    max_line_length: usize,
    // The last successful take was a body, so the message before it is over.
    after_body: bool,
}

impl FrameBuffer {
    #[inline(always)]
    pub(crate) fn new(max_line_length: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line_length,
            after_body: true,
        }
    }

    #[inline(always)]
    pub(crate) fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    #[inline(always)]
    pub(crate) fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drops what is left of a message that failed to parse and reports
    /// whether the next byte starts a new message.
    ///
    /// After a body nothing is dropped: the buffer already holds the next
    /// message. Otherwise the buffered bytes are dropped, and they only end
    /// the message when they end with an empty line.
    pub(crate) fn skip_message(&mut self) -> bool {
        if self.after_body {
            return true;
        }

        let boundary = match self.buffer.as_slice() {
            [] => false,
            b"\n" | b"\r\n" => true,
            rest => rest.ends_with(b"\n\n") || rest.ends_with(b"\n\r\n"),
        };

        self.buffer.clear();
        self.after_body = true;
        boundary
    }

    /// Takes the next line without its terminator (`\n` or `\r\n`).
    ///
    /// `Ok(None)` means more bytes are needed. The window for an unterminated
    /// line is `max_line_length + 1` so that a line of exactly the maximum
    /// length can still wait for its `\r\n`.
    pub(crate) fn take_line(&mut self) -> Result<Option<String>, ErrorKind> {
        self.after_body = false;

        let Some(end) = memchr(b'\n', &self.buffer) else {
            if self.buffer.len() > self.max_line_length + 1 {
                return Err(ErrorKind::LineTooLong { unterminated: true });
            }
            return Ok(None);
        };

        let line = match &self.buffer[..end] {
            [line @ .., b'\r'] => line,
            line => line,
        };

        if line.len() > self.max_line_length {
            return Err(ErrorKind::LineTooLong {
                unterminated: false,
            });
        }

        let line = simdutf8::basic::from_utf8(line)
            .map(str::to_owned)
            .map_err(|_| ErrorKind::InvalidEncoding)?;

        self.buffer.drain(..=end);
        Ok(Some(line))
    }

    /// Takes exactly `len` bytes, or `None` if fewer are buffered.
    pub(crate) fn take_exact(&mut self, len: usize) -> Option<Vec<u8>> {
        if self.buffer.len() < len {
            return None;
        }

        let rest = self.buffer.split_off(len);
        self.after_body = true;
        Some(std::mem::replace(&mut self.buffer, rest))
    }
}

/// Buffer-owning reader over a byte stream.
///
/// Every refill is a single bounded read: it fails with
/// [`ErrorKind::ReadTimeout`] after the configured timeout and with
/// [`ErrorKind::UnexpectedEof`] when the peer has closed its side.
#[derive(Debug)]
pub(crate) struct FrameReader<R> {
    stream: R,
    frame: FrameBuffer,
    chunk: Box<[u8]>,
    timeout: Duration,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub(crate) fn new(stream: R, limits: &ReqLimits, timeout: Duration) -> Self {
        Self {
            stream,
            frame: FrameBuffer::new(limits.max_line_length),
            chunk: vec![0; limits.read_chunk.max(1)].into_boxed_slice(),
            timeout,
        }
    }

    /// Next line with `\r` stripped.
    pub(crate) async fn read_line(&mut self) -> Result<String, ErrorKind> {
        loop {
            if let Some(line) = self.frame.take_line()? {
                return Ok(line);
            }
            self.fill().await?;
        }
    }

    /// Exactly `len` bytes.
    pub(crate) async fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, ErrorKind> {
        loop {
            if let Some(data) = self.frame.take_exact(len) {
                return Ok(data);
            }
            self.fill().await?;
        }
    }

    /// Nothing of the next message has arrived yet.
    #[inline(always)]
    pub(crate) fn is_idle(&self) -> bool {
        self.frame.is_empty()
    }

    /// Waits until at least one byte of the next message is buffered.
    ///
    /// Errors here mean the connection went quiet between messages, not that
    /// a message was cut short.
    pub(crate) async fn ready(&mut self) -> Result<(), ErrorKind> {
        if self.is_idle() {
            self.fill().await?;
        }
        Ok(())
    }

    /// Drops the buffered remainder of a message that failed to parse.
    ///
    /// `false` when the stream may still carry bytes of that message, see
    /// [`FrameBuffer::skip_message`].
    #[inline(always)]
    pub(crate) fn discard(&mut self) -> bool {
        self.frame.skip_message()
    }

    #[inline(always)]
    pub(crate) fn get_mut(&mut self) -> &mut R {
        &mut self.stream
    }

    #[inline]
    async fn fill(&mut self) -> Result<usize, ErrorKind> {
        let n = tokio::select! {
            biased;

            read_result = self.stream.read(&mut self.chunk) => read_result?,
            _ = sleep(self.timeout) => return Err(ErrorKind::ReadTimeout),
        };

        if n == 0 {
            return Err(ErrorKind::UnexpectedEof);
        }

        self.frame.extend(&self.chunk[..n]);
        Ok(n)
    }
}
