//! Fleet client over any transport

use crate::transport::{TransportConnector, TransportStream};
use aeromatrix_shared::codec::{self, FrameDecoder};
use aeromatrix_shared::{net, Envelope, Payload, Request, Response};
use anyhow::{anyhow, bail, Result};
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    /// Extra connection attempts after the first
    pub retries: u32,
    /// Delay before the first retry, doubled after each failure
    pub reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    pub response_timeout: Duration,
    pub max_frame_bytes: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: "console-001".into(),
            retries: 3,
            reconnect_delay: Duration::from_millis(250),
            max_reconnect_delay: Duration::from_secs(5),
            response_timeout: Duration::from_millis(net::RESPONSE_TIMEOUT_MS),
            max_frame_bytes: codec::MAX_MESSAGE_SIZE,
        }
    }
}

/// One open connection to the server
pub struct FleetClient<S: TransportStream> {
    config: ClientConfig,
    stream: S,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
    sequence_id: u64,
}

impl<S: TransportStream> FleetClient<S> {
    /// Connect, retrying with exponential backoff
    pub async fn connect<C>(connector: &C, config: ClientConfig) -> Result<Self>
    where
        C: TransportConnector<Stream = S>,
    {
        let mut delay = config.reconnect_delay;
        let mut attempt = 0;

        let stream = loop {
            attempt += 1;
            match connector.connect().await {
                Ok(stream) => break stream,
                Err(e) if attempt <= config.retries => {
                    warn!(target_addr = %connector.target(), attempt, "Connect failed: {}", e);
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, config.max_reconnect_delay);
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "Giving up on {} after {} attempts",
                        connector.target(),
                        attempt
                    )))
                }
            }
        };

        info!(target_addr = %connector.target(), "Connected");
        Ok(Self::from_stream(stream, config))
    }

    pub fn from_stream(stream: S, config: ClientConfig) -> Self {
        Self {
            decoder: FrameDecoder::with_max_len(config.max_frame_bytes),
            config,
            stream,
            read_buf: vec![0u8; 4096],
            sequence_id: 0,
        }
    }

    fn next_sequence_id(&mut self) -> u64 {
        self.sequence_id += 1;
        self.sequence_id
    }

    /// Send one request and wait for the response carrying its sequence ID
    pub async fn call(&mut self, request: Request) -> Result<Response> {
        let seq = self.next_sequence_id();
        let envelope = Envelope::request(self.config.client_id.clone(), seq, request);

        let mut frame = BytesMut::new();
        codec::encode_into(&envelope, &mut frame, self.config.max_frame_bytes)?;
        self.stream.write_all(&frame).await?;
        debug!(sequence_id = seq, bytes = frame.len(), "Request sent");

        let wait = self.config.response_timeout;
        timeout(wait, self.await_response(seq))
            .await
            .map_err(|_| anyhow!("No response to request {} within {:?}", seq, wait))?
    }

    async fn await_response(&mut self, seq: u64) -> Result<Response> {
        loop {
            while let Some(envelope) = self.decoder.decode_next()? {
                if envelope.header.sequence_id != seq {
                    warn!(
                        expected = seq,
                        got = envelope.header.sequence_id,
                        "Dropping stale response"
                    );
                    continue;
                }
                return match envelope.payload {
                    Payload::Response(response) => Ok(response),
                    Payload::Request(_) => bail!("Server sent a request frame"),
                };
            }

            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                bail!("Server closed connection");
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream.close().await
    }
}
