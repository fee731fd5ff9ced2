//! Transport abstraction so the client can run over any byte stream

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// A byte stream the client can frame requests over
#[async_trait]
pub trait TransportStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Close the write side gracefully
    async fn close(&mut self) -> Result<()>;
}

/// Opens streams to a fleet server
#[async_trait]
pub trait TransportConnector: Send + Sync {
    type Stream: TransportStream;

    /// One connection attempt
    async fn connect(&self) -> Result<Self::Stream>;

    /// Where this connector points, for logs
    fn target(&self) -> String;
}
