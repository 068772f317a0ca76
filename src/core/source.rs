//! Purpose: One pull protocol over synchronous iterators and asynchronous streams.
//! Exports: `PullSource`, `SequenceAdapter`, `StreamSource`, `TryStreamSource`.
//! Role: Upstream boundary for cursors; keeps the cursor code path source-agnostic.
//! Invariants: At most one item is held (`current`); nothing is buffered ahead.
//! Invariants: After `release` every advance reports exhaustion without touching upstream.

use std::error::Error as StdError;
use std::future::{self, Future};

use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::core::blocking::Blocker;
use crate::core::error::{Error, ErrorKind};

/// Pull-based item source: advance, then inspect `current`.
pub trait PullSource: Send {
    type Item;

    /// Move to the next item; `Ok(false)` once exhausted or released.
    fn advance<'a>(
        &'a mut self,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<bool, Error>> + Send + 'a;

    /// Blocking form of [`PullSource::advance`] with identical semantics.
    fn advance_blocking(&mut self) -> Result<bool, Error>;

    /// Item produced by the last successful advance.
    fn current(&self) -> Option<&Self::Item>;

    /// Drop upstream resources. Idempotent.
    fn release(&mut self);
}

/// Adapts a single-pass iterator to the pull protocol; advance never suspends.
pub struct SequenceAdapter<I: Iterator> {
    iter: Option<I>,
    current: Option<I::Item>,
}

impl<I: Iterator> SequenceAdapter<I> {
    pub fn new(iter: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            iter: Some(iter.into_iter()),
            current: None,
        }
    }

    fn step(&mut self) -> bool {
        self.current = self.iter.as_mut().and_then(Iterator::next);
        self.current.is_some()
    }
}

impl<I> PullSource for SequenceAdapter<I>
where
    I: Iterator + Send,
    I::Item: Send,
{
    type Item = I::Item;

    fn advance<'a>(
        &'a mut self,
        _cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<bool, Error>> + Send + 'a {
        future::ready(Ok(self.step()))
    }

    fn advance_blocking(&mut self) -> Result<bool, Error> {
        Ok(self.step())
    }

    fn current(&self) -> Option<&I::Item> {
        self.current.as_ref()
    }

    fn release(&mut self) {
        self.iter = None;
        self.current = None;
    }
}

/// Native asynchronous source over an infallible stream.
pub struct StreamSource<S: Stream> {
    stream: Option<S>,
    current: Option<S::Item>,
    blocker: Blocker,
}

impl<S: Stream + Unpin> StreamSource<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
            current: None,
            blocker: Blocker::new(),
        }
    }
}

impl<S> PullSource for StreamSource<S>
where
    S: Stream + Unpin + Send,
    S::Item: Send,
{
    type Item = S::Item;

    fn advance<'a>(
        &'a mut self,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<bool, Error>> + Send + 'a {
        async move {
            self.current = pull(self.stream.as_mut(), cancel).await?;
            Ok(self.current.is_some())
        }
    }

    fn advance_blocking(&mut self) -> Result<bool, Error> {
        let cancel = CancellationToken::new();
        self.current = self
            .blocker
            .block_on(pull(self.stream.as_mut(), &cancel))??;
        Ok(self.current.is_some())
    }

    fn current(&self) -> Option<&S::Item> {
        self.current.as_ref()
    }

    fn release(&mut self) {
        self.stream = None;
        self.current = None;
    }
}

/// Native asynchronous source over a stream of `Result` items.
///
/// An upstream `Err` surfaces from advance as `ErrorKind::Source`.
pub struct TryStreamSource<S, T> {
    stream: Option<S>,
    current: Option<T>,
    blocker: Blocker,
}

impl<S, T, E> TryStreamSource<S, T>
where
    S: Stream<Item = Result<T, E>> + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
            current: None,
            blocker: Blocker::new(),
        }
    }
}

impl<S, T, E> PullSource for TryStreamSource<S, T>
where
    S: Stream<Item = Result<T, E>> + Unpin + Send,
    T: Send,
    E: StdError + Send + Sync + 'static,
{
    type Item = T;

    fn advance<'a>(
        &'a mut self,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<bool, Error>> + Send + 'a {
        async move {
            self.current = pull(self.stream.as_mut(), cancel)
                .await?
                .transpose()
                .map_err(source_error)?;
            Ok(self.current.is_some())
        }
    }

    fn advance_blocking(&mut self) -> Result<bool, Error> {
        let cancel = CancellationToken::new();
        self.current = self
            .blocker
            .block_on(pull(self.stream.as_mut(), &cancel))??
            .transpose()
            .map_err(source_error)?;
        Ok(self.current.is_some())
    }

    fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    fn release(&mut self) {
        self.stream = None;
        self.current = None;
    }
}

async fn pull<S>(
    stream: Option<&mut S>,
    cancel: &CancellationToken,
) -> Result<Option<S::Item>, Error>
where
    S: Stream + Unpin,
{
    let Some(stream) = stream else {
        return Ok(None);
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            Err(Error::new(ErrorKind::Cancelled).with_message("pull cancelled"))
        }
        item = stream.next() => Ok(item),
    }
}

fn source_error<E>(err: E) -> Error
where
    E: StdError + Send + Sync + 'static,
{
    Error::new(ErrorKind::Source)
        .with_message("upstream source failed")
        .with_boxed_source(Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::{PullSource, SequenceAdapter, StreamSource, TryStreamSource};
    use crate::core::error::ErrorKind;
    use std::io;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn sequence_adapter_pulls_in_order_then_reports_exhaustion() {
        let mut source = SequenceAdapter::new(vec![1, 2]);
        assert!(source.advance_blocking().expect("advance"));
        assert_eq!(source.current(), Some(&1));
        assert!(source.advance_blocking().expect("advance"));
        assert_eq!(source.current(), Some(&2));
        assert!(!source.advance_blocking().expect("advance"));
        assert_eq!(source.current(), None);
    }

    #[tokio::test]
    async fn sequence_adapter_async_form_matches_blocking() {
        let cancel = CancellationToken::new();
        let mut source = SequenceAdapter::new(["a"]);
        assert!(source.advance(&cancel).await.expect("advance"));
        assert_eq!(source.current(), Some(&"a"));
        assert!(!source.advance(&cancel).await.expect("advance"));
    }

    #[test]
    fn released_source_stays_exhausted() {
        let mut source = SequenceAdapter::new(0..10);
        assert!(source.advance_blocking().expect("advance"));
        source.release();
        source.release();
        assert!(!source.advance_blocking().expect("advance"));
    }

    #[tokio::test]
    async fn stream_source_honours_cancellation() {
        let cancel = CancellationToken::new();
        let mut source = StreamSource::new(tokio_stream::pending::<u32>());
        cancel.cancel();
        let err = source.advance(&cancel).await.expect_err("cancelled");
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn stream_source_blocking_form_outside_runtime() {
        let mut source = StreamSource::new(tokio_stream::iter(vec![3u8, 4]));
        assert!(source.advance_blocking().expect("advance"));
        assert_eq!(source.current(), Some(&3));
        assert!(source.advance_blocking().expect("advance"));
        assert!(!source.advance_blocking().expect("advance"));
    }

    #[tokio::test]
    async fn try_stream_source_surfaces_upstream_errors() {
        let cancel = CancellationToken::new();
        let items: Vec<Result<u32, io::Error>> = vec![Ok(1), Err(io::Error::other("boom"))];
        let mut source = TryStreamSource::new(tokio_stream::iter(items));
        assert!(source.advance(&cancel).await.expect("first"));
        assert_eq!(source.current(), Some(&1));
        let err = source.advance(&cancel).await.expect_err("second");
        assert_eq!(err.kind(), ErrorKind::Source);
    }
}
