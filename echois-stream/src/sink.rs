//! Outbound event sink backed by the per-request SSE channel.

use crate::error::StreamError;
use crate::events::ChannelEvent;
use tokio::sync::mpsc;

/// Write half of the push channel.
///
/// Frames are delivered in exactly the order `emit` is called. A failed send
/// means the receiving side (the HTTP response body) is gone; the caller
/// must stop emitting and reading. The channel closes when the sink drops.
pub struct EventSink {
    tx: mpsc::Sender<String>,
}

impl EventSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn emit(&self, event: &ChannelEvent) -> Result<(), StreamError> {
        self.tx
            .send(event.to_frame())
            .await
            .map_err(|_| StreamError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_preserves_order() {
        let (sink, mut rx) = EventSink::channel(8);
        sink.emit(&ChannelEvent::message("a.", None)).await.unwrap();
        sink.emit(&ChannelEvent::message("b.", None)).await.unwrap();
        sink.emit(&ChannelEvent::End).await.unwrap();
        drop(sink);

        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            frames.push(frame);
        }
        assert_eq!(frames.len(), 3);
        assert!(frames[0].contains("\"text\":\"a.\""));
        assert!(frames[1].contains("\"text\":\"b.\""));
        assert!(frames[2].starts_with("event: end"));
    }

    #[tokio::test]
    async fn test_emit_after_receiver_dropped() {
        let (sink, rx) = EventSink::channel(1);
        drop(rx);
        let err = sink.emit(&ChannelEvent::End).await.unwrap_err();
        assert!(matches!(err, StreamError::ChannelClosed));
    }
}
