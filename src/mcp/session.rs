//! Drives a [`Dispatcher`] over a [`Transport`].
//!
//! The session reads one frame, hands it to the dispatcher, writes the reply
//! (if any) and only then reads the next frame. It ends when the peer closes
//! the channel, when a protocol error closes the dispatcher, or on a
//! shutdown signal.

use std::io;

use crate::error::ServerError;
use crate::mcp::dispatcher::Dispatcher;
use crate::mcp::protocol::OutgoingMessage;
use crate::mcp::transport::Transport;

/// A single client session.
#[derive(Debug)]
pub struct Session<T> {
    transport: T,
    dispatcher: Dispatcher,
}

impl<T: Transport> Session<T> {
    /// Creates a session over a transport.
    #[must_use]
    pub const fn new(transport: T, dispatcher: Dispatcher) -> Self {
        Self {
            transport,
            dispatcher,
        }
    }

    /// The dispatcher driven by this session.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Consumes the session, returning the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Serves frames until the channel closes.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the transport fails, or
    /// [`ServerError::Protocol`] if a protocol error closed the session. The
    /// error response has already been written in the latter case.
    pub async fn run(&mut self) -> Result<(), ServerError> {
        loop {
            let frame = self.transport.read_frame().await;
            if self.handle_read(frame).await? {
                return self.finish();
            }
        }
    }

    /// Like [`Session::run`], but also stops on SIGINT or SIGTERM.
    ///
    /// # Errors
    ///
    /// See [`Session::run`].
    #[cfg(unix)]
    pub async fn run_with_shutdown(&mut self) -> Result<(), ServerError> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, initiating graceful shutdown");
                    self.dispatcher.close();
                    return Ok(());
                }

                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    self.dispatcher.close();
                    return Ok(());
                }

                frame = self.transport.read_frame() => {
                    if self.handle_read(frame).await? {
                        return self.finish();
                    }
                }
            }
        }
    }

    /// Like [`Session::run`], but also stops on Ctrl+C.
    ///
    /// # Errors
    ///
    /// See [`Session::run`].
    #[cfg(windows)]
    pub async fn run_with_shutdown(&mut self) -> Result<(), ServerError> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                    self.dispatcher.close();
                    return Ok(());
                }

                frame = self.transport.read_frame() => {
                    if self.handle_read(frame).await? {
                        return self.finish();
                    }
                }
            }
        }
    }

    /// Handles the outcome of one read.
    ///
    /// Returns `true` once the session is over.
    async fn handle_read(&mut self, frame: io::Result<Option<Vec<u8>>>) -> io::Result<bool> {
        let Some(frame) = frame? else {
            tracing::debug!("peer closed the channel");
            self.dispatcher.close();
            return Ok(true);
        };

        if frame.iter().all(u8::is_ascii_whitespace) {
            return Ok(false);
        }

        if let Some(reply) = self.dispatcher.handle_bytes(&frame) {
            self.write(&reply).await?;
        }

        Ok(self.dispatcher.is_closed())
    }

    async fn write(&mut self, reply: &OutgoingMessage) -> io::Result<()> {
        let json = serde_json::to_string(reply)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.transport.write_frame(&json).await
    }

    fn finish(&self) -> Result<(), ServerError> {
        match self.dispatcher.fatal_error() {
            Some(error) => Err(ServerError::Protocol(error.clone())),
            None => Ok(()),
        }
    }
}
