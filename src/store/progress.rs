//! Upload progress indicator shared between the uploader and the dashboard.
use futures::Stream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const CHUNK_SIZE: usize = 64 * 1024;

/// Percentage 0..=100 while an upload is running, `None` when idle.
///
/// Transport progress is capped at 99 until the backend confirms the write;
/// [`finish`](Self::finish) jumps to 100 and clears after `clear_after`.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    tx: watch::Sender<Option<u8>>,
    generation: AtomicU64,
    clear_after: Duration,
}

impl ProgressTracker {
    pub fn new(clear_after: Duration) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                tx,
                generation: AtomicU64::new(0),
                clear_after,
            }),
        }
    }

    pub fn current(&self) -> Option<u8> {
        *self.inner.tx.borrow()
    }

    pub fn start(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.tx.send_replace(Some(0));
    }

    /// Record `sent` of `total` bytes handed to the transport.
    pub fn report(&self, sent: u64, total: u64) {
        if total == 0 {
            return;
        }
        let pct = ((sent.min(total) * 100) / total).min(99) as u8;
        self.inner.tx.send_if_modified(|cur| match cur {
            Some(prev) if *prev >= pct => false,
            _ => {
                *cur = Some(pct);
                true
            }
        });
    }

    pub fn finish(&self) {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.inner.tx.send_replace(Some(100));

        let inner = self.inner.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(inner.clear_after).await;
                    // A newer upload owns the indicator now.
                    if inner.generation.load(Ordering::SeqCst) == generation {
                        inner.tx.send_replace(None);
                    }
                });
            }
            Err(_) => {
                inner.tx.send_replace(None);
            }
        }
    }

    pub fn fail(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.tx.send_replace(None);
    }
}

/// Split `bytes` into a request body stream that reports progress as the
/// transport pulls each chunk.
pub fn counting_stream(
    bytes: Vec<u8>,
    tracker: ProgressTracker,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static {
    let total = bytes.len() as u64;
    let chunks: Vec<Vec<u8>> = bytes.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect();
    let mut sent = 0u64;
    futures::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        tracker.report(sent, total);
        Ok(chunk)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn report_is_capped_below_completion() {
        let t = ProgressTracker::new(Duration::from_millis(10));
        assert_eq!(t.current(), None);
        t.start();
        assert_eq!(t.current(), Some(0));
        t.report(50, 100);
        assert_eq!(t.current(), Some(50));
        t.report(100, 100);
        assert_eq!(t.current(), Some(99));
        // never goes backwards
        t.report(10, 100);
        assert_eq!(t.current(), Some(99));
    }

    #[tokio::test]
    async fn finish_jumps_to_100_then_clears() {
        let t = ProgressTracker::new(Duration::from_millis(20));
        t.start();
        t.finish();
        assert_eq!(t.current(), Some(100));
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(t.current(), None);
    }

    #[tokio::test]
    async fn new_upload_is_not_cleared_by_previous_timer() {
        let t = ProgressTracker::new(Duration::from_millis(20));
        t.start();
        t.finish();
        t.start();
        t.report(1, 4);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(t.current(), Some(25));
    }

    #[test]
    fn fail_clears_immediately() {
        let t = ProgressTracker::new(Duration::from_secs(5));
        t.start();
        t.report(3, 4);
        t.fail();
        assert_eq!(t.current(), None);
    }

    #[tokio::test]
    async fn counting_stream_reports_each_chunk() {
        let t = ProgressTracker::new(Duration::from_millis(10));
        t.start();
        let data = vec![7u8; CHUNK_SIZE * 2 + 10];
        let mut s = Box::pin(counting_stream(data.clone(), t.clone()));
        let first = s.next().await.unwrap().unwrap();
        assert_eq!(first.len(), CHUNK_SIZE);
        assert_eq!(t.current(), Some(49));
        let rest: Vec<_> = s.collect().await;
        let total: usize = first.len() + rest.into_iter().map(|c| c.unwrap().len()).sum::<usize>();
        assert_eq!(total, data.len());
        assert_eq!(t.current(), Some(99));
    }
}
