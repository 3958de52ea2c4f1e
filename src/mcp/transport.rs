//! Line-delimited transports for the MCP server.
//!
//! Every transport frames messages the same way:
//!
//! - Messages are UTF-8 encoded JSON-RPC
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines
//!
//! Two channels are provided: stdio (stdin in, stdout out, stderr free for
//! logging) and a single TCP connection. Both are [`LineTransport`]s over
//! different halves, so the session loop never needs to know which one it
//! is driving.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

/// A bidirectional, ordered, frame-based channel.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Reads the next frame as raw bytes, without its terminator.
    ///
    /// Returns `None` once the peer has closed the channel. Frames are not
    /// decoded here, so a frame that is not UTF-8 still reaches the
    /// dispatcher.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    async fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Writes one frame and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    async fn write_frame(&mut self, frame: &str) -> io::Result<()>;
}

/// A newline-delimited transport over any buffered reader and writer.
#[derive(Debug)]
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a transport from a reader and a writer.
    pub const fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Splits the transport back into its reader and writer.
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R, W> Transport for LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let bytes_read = self.reader.read_until(b'\n', &mut line).await?;

        if bytes_read == 0 {
            return Ok(None);
        }

        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }

        Ok(Some(line))
    }

    async fn write_frame(&mut self, frame: &str) -> io::Result<()> {
        debug_assert!(
            !frame.contains('\n'),
            "JSON message must not contain embedded newlines"
        );

        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }
}

/// Transport over the process's stdin and stdout.
pub type StdioTransport = LineTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

impl StdioTransport {
    /// Creates a transport over stdin and stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

/// Transport over a single TCP connection.
pub type TcpTransport = LineTransport<BufReader<OwnedReadHalf>, OwnedWriteHalf>;

impl TcpTransport {
    /// Wraps an established connection.
    #[must_use]
    pub fn from_stream(stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Self::new(BufReader::new(read), write)
    }

    /// Binds `addr`, accepts exactly one connection and stops listening.
    ///
    /// # Errors
    ///
    /// Returns an error if binding or accepting fails.
    pub async fn accept_one(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(address = %listener.local_addr()?, "Waiting for a client connection");

        let (stream, peer) = listener.accept().await?;
        tracing::info!(peer = %peer, "Client connected");

        Ok(Self::from_stream(stream))
    }
}
