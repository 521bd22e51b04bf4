use std::{
    pin::Pin,
    task::{Context, Poll},
    time::SystemTime,
};

use futures::Stream;
use pin_project::{pin_project, pinned_drop};

pub trait OptionInspectNone<T> {
    fn inspect_none(self, inspector_function: impl FnOnce()) -> Self;
}

impl<T> OptionInspectNone<T> for Option<T> {
    fn inspect_none(self, inspector_function: impl FnOnce()) -> Self {
        if self.is_none() {
            inspector_function();
        }
        self
    }
}

pub fn get_epoch_time_in_ms() -> u64 {
    let start = SystemTime::now();
    let since_the_epoch = start
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("SystemTime before UNIX EPOCH");
    since_the_epoch.as_millis() as u64
}

/// A [`Stream`] wrapper that runs a callback when dropped.
///
/// The callback receives `true` if the inner stream ran to completion before
/// the wrapper was dropped, and `false` if the consumer walked away early.
#[pin_project(PinnedDrop)]
pub struct StreamGuard<S, F>
where
    S: Stream,
    F: FnOnce(bool),
{
    #[pin]
    stream: S,
    finished: bool,
    on_drop: Option<F>,
}

impl<S, F> StreamGuard<S, F>
where
    S: Stream,
    F: FnOnce(bool),
{
    pub fn new(stream: S, on_drop: F) -> Self {
        Self {
            stream,
            finished: false,
            on_drop: Some(on_drop),
        }
    }
}

impl<S, F> Stream for StreamGuard<S, F>
where
    S: Stream,
    F: FnOnce(bool),
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let poll = this.stream.poll_next(cx);
        if let Poll::Ready(None) = poll {
            *this.finished = true;
        }
        poll
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.stream.size_hint()
    }
}

#[pinned_drop]
impl<S, F> PinnedDrop for StreamGuard<S, F>
where
    S: Stream,
    F: FnOnce(bool),
{
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        if let Some(on_drop) = this.on_drop.take() {
            on_drop(*this.finished);
        }
    }
}

/// A convenience extension for creating a [`StreamGuard`] via a method.
pub trait GuardStreamExt: Stream + Sized {
    /// Wraps the [`Stream`], running the given closure upon being dropped.
    fn guard<F>(self, on_drop: F) -> StreamGuard<Self, F>
    where
        F: FnOnce(bool);
}

impl<S> GuardStreamExt for S
where
    S: Stream + Sized,
{
    fn guard<F>(self, on_drop: F) -> StreamGuard<Self, F>
    where
        F: FnOnce(bool),
    {
        StreamGuard::new(self, on_drop)
    }
}
