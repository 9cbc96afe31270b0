use std::convert::Infallible;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use quagmire_common::{QuagmireError, QuagmireResult};
use tokio::sync::mpsc;

/// Destination of streamed output.
///
/// Writes may be buffered; only `flush` has to push data to the client.
#[async_trait]
pub trait ChunkSink: Send {
    async fn write(&mut self, data: &[u8]) -> QuagmireResult<()>;

    async fn flush(&mut self) -> QuagmireResult<()>;

    /// Whether `flush` actually delivers partial output.
    fn supports_flush(&self) -> bool;

    /// Write a complete fragment and flush it.
    async fn send(&mut self, data: &[u8]) -> QuagmireResult<()> {
        self.write(data).await?;
        self.flush().await
    }
}

/// Sink feeding an HTTP body through a bounded channel.
///
/// Each flush sends the buffered bytes as one body frame. A send that does
/// not complete within the write timeout, or whose receiver is gone, is
/// reported as [`QuagmireError::ClientDisconnected`].
pub struct ChannelSink {
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
    buf: BytesMut,
    write_timeout: Duration,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Result<Bytes, Infallible>>, write_timeout: Duration) -> Self {
        Self {
            tx,
            buf: BytesMut::new(),
            write_timeout,
        }
    }

    /// Resolves once the body receiver has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Handle that can watch for the receiver going away.
    pub fn sender(&self) -> mpsc::Sender<Result<Bytes, Infallible>> {
        self.tx.clone()
    }
}

#[async_trait]
impl ChunkSink for ChannelSink {
    async fn write(&mut self, data: &[u8]) -> QuagmireResult<()> {
        if self.tx.is_closed() {
            return Err(QuagmireError::ClientDisconnected);
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    async fn flush(&mut self) -> QuagmireResult<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let frame = self.buf.split().freeze();
        match tokio::time::timeout(self.write_timeout, self.tx.send(Ok(frame))).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) | Err(_) => Err(QuagmireError::ClientDisconnected),
        }
    }

    fn supports_flush(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flush_sends_one_frame() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut sink = ChannelSink::new(tx, Duration::from_secs(1));
        sink.write(b"hello ").await.unwrap();
        sink.write(b"world ").await.unwrap();
        sink.flush().await.unwrap();

        let frame = rx.recv().await.unwrap().unwrap();
        assert_eq!(&frame[..], b"hello world ");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_flush_sends_nothing() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut sink = ChannelSink::new(tx, Duration::from_secs(1));
        sink.flush().await.unwrap();
        drop(sink);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_disconnect() {
        let (tx, rx) = mpsc::channel(4);
        let mut sink = ChannelSink::new(tx, Duration::from_secs(1));
        drop(rx);
        assert!(sink.is_closed());
        let err = sink.write(b"x").await.unwrap_err();
        assert!(err.is_disconnect());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_reader_times_out() {
        let (tx, _rx) = mpsc::channel(1);
        let mut sink = ChannelSink::new(tx, Duration::from_secs(5));
        sink.send(b"first").await.unwrap();
        // Channel is full and nobody reads.
        let err = sink.send(b"second").await.unwrap_err();
        assert!(err.is_disconnect());
    }
}
