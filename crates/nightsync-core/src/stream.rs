// ── Reactive resource streams ──
//
// Subscription handle vended by resource stores. The value is `None`
// until the first successful fetch (or after a device switch).

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// A read-only subscription to one resource.
///
/// Dropping the stream is the unsubscribe.
pub struct ResourceStream<T: Send + Sync + 'static> {
    current: Option<Arc<T>>,
    receiver: watch::Receiver<Option<Arc<T>>>,
}

impl<T: Send + Sync + 'static> ResourceStream<T> {
    pub(crate) fn new(mut receiver: watch::Receiver<Option<Arc<T>>>) -> Self {
        let current = receiver.borrow_and_update().clone();
        Self { current, receiver }
    }

    /// Value captured at creation or at the last `changed()`.
    pub fn current(&self) -> Option<&Arc<T>> {
        self.current.as_ref()
    }

    /// Latest value held by the store.
    pub fn latest(&self) -> Option<Arc<T>> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publication.
    ///
    /// Returns `None` once the store is gone; the inner `Option` is the
    /// published value, `None` when the store was cleared.
    pub async fn changed(&mut self) -> Option<Option<Arc<T>>> {
        self.receiver.changed().await.ok()?;
        let value = self.receiver.borrow_and_update().clone();
        self.current.clone_from(&value);
        Some(value)
    }

    /// Wait for the next publication that carries a value.
    pub async fn next_value(&mut self) -> Option<Arc<T>> {
        loop {
            if let Some(value) = self.changed().await? {
                return Some(value);
            }
        }
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> ResourceWatchStream<T> {
        ResourceWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields the current value first, then every subsequent publication.
pub struct ResourceWatchStream<T: Send + Sync + 'static> {
    inner: WatchStream<Option<Arc<T>>>,
}

impl<T: Send + Sync + 'static> Stream for ResourceWatchStream<T> {
    type Item = Option<Arc<T>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures_util::StreamExt;
    use tokio_test::{assert_pending, assert_ready};

    use super::*;

    #[test]
    fn changed_pends_until_publication() {
        let (tx, rx) = watch::channel(None::<Arc<u32>>);
        let mut resource = ResourceStream::new(rx);
        assert!(resource.current().is_none());

        let mut changed = tokio_test::task::spawn(resource.changed());
        assert_pending!(changed.poll());
        tx.send_replace(Some(Arc::new(7)));
        assert!(changed.is_woken());
        assert_eq!(assert_ready!(changed.poll()), Some(Some(Arc::new(7))));
        drop(changed);

        assert_eq!(resource.current().map(|v| **v), Some(7));
    }

    #[tokio::test]
    async fn stream_yields_current_then_publications() {
        let (tx, rx) = watch::channel(Some(Arc::new(1_u32)));
        let mut stream = ResourceStream::new(rx).into_stream();

        assert_eq!(stream.next().await.unwrap().as_deref(), Some(&1));
        tx.send_replace(None);
        assert_eq!(stream.next().await.unwrap(), None);
        tx.send_replace(Some(Arc::new(2)));
        assert_eq!(stream.next().await.unwrap().as_deref(), Some(&2));

        drop(tx);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn next_value_skips_clears() {
        let (tx, rx) = watch::channel(None::<Arc<u32>>);
        let mut resource = ResourceStream::new(rx);
        let waiter = tokio::spawn(async move { resource.next_value().await });

        tx.send_replace(None);
        tokio::task::yield_now().await;
        tx.send_replace(Some(Arc::new(3)));
        assert_eq!(waiter.await.unwrap().as_deref(), Some(&3));
    }
}
