use quagmire_common::{escape_html, QuagmireError, QuagmireResult};
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::pacing::Pacing;
use crate::sink::ChunkSink;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamOutcome {
    pub words_written: usize,
    pub flushes: usize,
    /// The stream stopped early because the client went away or the
    /// token was cancelled.
    pub cancelled: bool,
}

/// Write `words` to `sink` in paced, flushed chunks.
///
/// Each chunk is the space-joined, HTML-escaped words followed by one
/// trailing space. Cancellation is checked before every chunk and raced
/// against every delay; once observed nothing more is written. A sink that
/// cannot flush is rejected before any output with
/// [`QuagmireError::TransportUnsupported`]. A disconnect reported by the
/// sink ends the stream as cancelled rather than as an error.
pub async fn stream_words<S, W, R>(
    sink: &mut S,
    cancel: &CancellationToken,
    words: &[W],
    pacing: &Pacing,
    rng: &mut R,
) -> QuagmireResult<StreamOutcome>
where
    S: ChunkSink + ?Sized,
    W: AsRef<str> + Sync,
    R: Rng + Send + ?Sized,
{
    if !sink.supports_flush() {
        return Err(QuagmireError::TransportUnsupported);
    }

    let mut outcome = StreamOutcome::default();
    let mut pos = 0;

    while pos < words.len() {
        if cancel.is_cancelled() {
            outcome.cancelled = true;
            break;
        }

        let size = pacing.chunk_size(rng, words.len() - pos);
        let chunk = words[pos..pos + size]
            .iter()
            .map(|w| w.as_ref())
            .collect::<Vec<&str>>()
            .join(" ");
        let mut payload = escape_html(&chunk);
        payload.push(' ');

        match sink.send(payload.as_bytes()).await {
            Ok(()) => {}
            Err(e) if e.is_disconnect() => {
                outcome.cancelled = true;
                break;
            }
            Err(e) => return Err(e),
        }
        pos += size;
        outcome.words_written += size;
        outcome.flushes += 1;

        if pos >= words.len() {
            break;
        }

        let delay = pacing.next_delay(rng);
        tokio::select! {
            _ = cancel.cancelled() => {
                outcome.cancelled = true;
                break;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!(
        words_written = outcome.words_written,
        flushes = outcome.flushes,
        cancelled = outcome.cancelled,
        "word stream finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Write(String),
        Flush,
    }

    /// Records every call; optionally cancels a token after N flushes.
    struct RecordingSink {
        events: Vec<Event>,
        flushable: bool,
        cancel_after: Option<(usize, CancellationToken)>,
        disconnect_after: Option<usize>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                events: Vec::new(),
                flushable: true,
                cancel_after: None,
                disconnect_after: None,
            }
        }

        fn flushes(&self) -> usize {
            self.events.iter().filter(|e| **e == Event::Flush).count()
        }

        fn text(&self) -> String {
            self.events
                .iter()
                .filter_map(|e| match e {
                    Event::Write(s) => Some(s.as_str()),
                    Event::Flush => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl ChunkSink for RecordingSink {
        async fn write(&mut self, data: &[u8]) -> QuagmireResult<()> {
            if let Some(limit) = self.disconnect_after {
                if self.flushes() >= limit {
                    return Err(QuagmireError::ClientDisconnected);
                }
            }
            self.events.push(Event::Write(String::from_utf8_lossy(data).into_owned()));
            Ok(())
        }

        async fn flush(&mut self) -> QuagmireResult<()> {
            self.events.push(Event::Flush);
            if let Some((n, token)) = &self.cancel_after {
                if self.flushes() >= *n {
                    token.cancel();
                }
            }
            Ok(())
        }

        fn supports_flush(&self) -> bool {
            self.flushable
        }
    }

    fn words(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("w{}", i)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_streams_every_word_in_order() {
        let mut sink = RecordingSink::new();
        let mut rng = StdRng::seed_from_u64(1);
        let words = words(23);

        let outcome = stream_words(&mut sink, &CancellationToken::new(), &words, &Pacing::default(), &mut rng)
            .await
            .unwrap();

        assert_eq!(outcome.words_written, 23);
        assert!(!outcome.cancelled);
        assert!(outcome.flushes >= 3);
        assert_eq!(sink.flushes(), outcome.flushes);
        assert_eq!(sink.text(), format!("{} ", words.join(" ")));
        assert_eq!(sink.events.last(), Some(&Event::Flush));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_write_is_followed_by_flush() {
        let mut sink = RecordingSink::new();
        let mut rng = StdRng::seed_from_u64(2);
        stream_words(&mut sink, &CancellationToken::new(), &words(40), &Pacing::default(), &mut rng)
            .await
            .unwrap();

        for pair in sink.events.chunks(2) {
            assert!(matches!(pair[0], Event::Write(_)));
            assert_eq!(pair[1], Event::Flush);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_escapes_chunks() {
        let mut sink = RecordingSink::new();
        let mut rng = StdRng::seed_from_u64(3);
        let words = vec!["<script>", "a&b"];
        stream_words(&mut sink, &CancellationToken::new(), &words, &Pacing::default(), &mut rng)
            .await
            .unwrap();
        assert_eq!(sink.text(), "&lt;script&gt; a&amp;b ");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_writes_after_cancellation() {
        let token = CancellationToken::new();
        let mut sink = RecordingSink::new();
        sink.cancel_after = Some((2, token.clone()));
        let mut rng = StdRng::seed_from_u64(4);

        let outcome = stream_words(&mut sink, &token, &words(100), &Pacing::default(), &mut rng)
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(sink.flushes(), 2);
        assert_eq!(sink.events.len(), 4);
        assert!(outcome.words_written < 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_delay() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let mut sink = RecordingSink::new();
        let mut rng = StdRng::seed_from_u64(5);
        let pacing = Pacing::fixed(1..=1, Duration::from_secs(10));
        let start = Instant::now();

        let outcome = stream_words(&mut sink, &token, &words(5), &pacing, &mut rng)
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.words_written, 1);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_after_last_chunk() {
        let mut sink = RecordingSink::new();
        let mut rng = StdRng::seed_from_u64(6);
        let pacing = Pacing::fixed(2..=2, Duration::from_millis(100));
        let start = Instant::now();

        let outcome = stream_words(&mut sink, &CancellationToken::new(), &words(10), &pacing, &mut rng)
            .await
            .unwrap();

        assert_eq!(outcome.flushes, 5);
        assert_eq!(start.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_unflushable_sink_rejected_before_output() {
        let mut sink = RecordingSink::new();
        sink.flushable = false;
        let mut rng = StdRng::seed_from_u64(7);

        let err = stream_words(&mut sink, &CancellationToken::new(), &words(5), &Pacing::default(), &mut rng)
            .await
            .unwrap_err();

        assert!(matches!(err, QuagmireError::TransportUnsupported));
        assert!(sink.events.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_ends_stream_quietly() {
        let mut sink = RecordingSink::new();
        sink.disconnect_after = Some(1);
        let mut rng = StdRng::seed_from_u64(8);

        let outcome = stream_words(&mut sink, &CancellationToken::new(), &words(50), &Pacing::fixed(5..=5, Duration::from_millis(10)), &mut rng)
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.words_written, 5);
        assert_eq!(sink.flushes(), 1);
    }

    #[tokio::test]
    async fn test_empty_word_list() {
        let mut sink = RecordingSink::new();
        let mut rng = StdRng::seed_from_u64(9);
        let empty: Vec<String> = Vec::new();
        let outcome = stream_words(&mut sink, &CancellationToken::new(), &empty, &Pacing::default(), &mut rng)
            .await
            .unwrap();
        assert_eq!(outcome, StreamOutcome::default());
        assert!(sink.events.is_empty());
    }
}
