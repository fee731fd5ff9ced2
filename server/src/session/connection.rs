//! Individual client session handling

use crate::command::RequestDispatcher;
use aeromatrix_shared::codec::{self, CodecError, FrameDecoder};
use aeromatrix_shared::{Envelope, FleetError, Payload, Response};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::SessionManager;

/// Server identity stamped on response headers
pub const SERVER_ID: &str = "aeromatrix-server";

/// Why a session ended abnormally
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session idle for more than {0:?}")]
    Idle(Duration),

    #[error("Frame decode failed: {0}")]
    Codec(#[from] CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write side of a client connection
pub struct SessionHandle {
    pub addr: SocketAddr,
    writer: WriteHalf<TcpStream>,
    max_frame_bytes: u32,
}

impl SessionHandle {
    /// Send an envelope to this client
    pub async fn send(&mut self, envelope: &Envelope) -> Result<(), SessionError> {
        let mut buf = BytesMut::new();
        codec::encode_into(envelope, &mut buf, self.max_frame_bytes)?;
        self.writer.write_all(&buf).await?;
        Ok(())
    }
}

/// Active client session
pub struct ClientSession {
    pub handle: SessionHandle,
    client_id: String,
    reader: ReadHalf<TcpStream>,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
    idle_timeout: Duration,
}

impl ClientSession {
    pub fn new(stream: TcpStream, addr: SocketAddr, idle_timeout: Duration, max_frame_bytes: u32) -> Self {
        let (reader, writer) = tokio::io::split(stream);

        let handle = SessionHandle {
            addr,
            writer,
            max_frame_bytes,
        };

        Self {
            handle,
            client_id: String::new(), // Set from the first header
            reader,
            decoder: FrameDecoder::with_max_len(max_frame_bytes),
            read_buf: vec![0u8; 4096],
            idle_timeout,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.handle.addr
    }

    /// Read the next envelope from this session.
    /// Returns `Ok(None)` once the peer has closed the connection.
    pub async fn recv(&mut self) -> Result<Option<Envelope>, SessionError> {
        loop {
            if let Some(envelope) = self.decoder.decode_next()? {
                if self.client_id.is_empty() {
                    self.client_id = envelope.header.client_id.clone();
                }
                return Ok(Some(envelope));
            }

            let read = tokio::time::timeout(self.idle_timeout, self.reader.read(&mut self.read_buf))
                .await
                .map_err(|_| SessionError::Idle(self.idle_timeout))??;

            if read == 0 {
                return Ok(None);
            }
            self.decoder.extend(&self.read_buf[..read]);
        }
    }

    /// Answer request frames until the peer leaves, idles out, sends garbage
    /// or the server stops. A request already being handled when the server
    /// stops still gets its response.
    pub async fn serve(
        mut self,
        dispatcher: RequestDispatcher,
        sessions: Arc<SessionManager>,
        mut stop: watch::Receiver<bool>,
    ) {
        let addr = self.addr();
        sessions.register(addr).await;

        loop {
            let next = tokio::select! {
                biased;
                next = self.recv() => next,
                _ = stop.changed() => {
                    info!(%addr, client_id = %self.client_id, "Server stopping, closing session");
                    break;
                }
            };

            let envelope = match next {
                Ok(Some(envelope)) => envelope,
                Ok(None) => {
                    info!(%addr, client_id = %self.client_id, "Client disconnected");
                    break;
                }
                Err(e) => {
                    warn!(%addr, client_id = %self.client_id, "Closing session: {}", e);
                    break;
                }
            };

            sessions.identify(addr, &self.client_id).await;
            let sequence_id = envelope.header.sequence_id;

            let response = match envelope.payload {
                Payload::Request(request) => {
                    debug!(%addr, sequence_id, ?request, "Request received");
                    dispatcher.dispatch(request).await
                }
                Payload::Response(_) => Response::from(FleetError::InvalidRequest(
                    "clients send requests, not responses".into(),
                )),
            };

            let reply = Envelope::response(SERVER_ID, sequence_id, response);
            if let Err(e) = self.handle.send(&reply).await {
                warn!(%addr, sequence_id, "Failed to send response: {}", e);
                break;
            }
        }

        sessions.unregister(addr).await;
    }
}
