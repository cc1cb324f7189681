use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bq_query_resources_rs::Page;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::Error;

/// Pages of a running query, fetched ahead by a background task.
///
/// An `Err` is always the last item. Dropping the stream (or calling
/// [`PageStream::cancel`]) stops the background task.
pub struct PageStream {
    rx: mpsc::Receiver<crate::Result<Page>>,
    task: Option<JoinHandle<()>>,
    token: CancellationToken,
    _guard: DropGuard,
}

impl std::fmt::Debug for PageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageStream")
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl PageStream {
    pub(super) fn new(
        rx: mpsc::Receiver<crate::Result<Page>>,
        token: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            rx,
            task: Some(task),
            _guard: token.clone().drop_guard(),
            token,
        }
    }

    /// Stops fetching. Pages already buffered are still yielded, followed by
    /// [`Error::Cancelled`].
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Receives the next page, or `None` once the query is exhausted.
    pub async fn recv(&mut self) -> Option<crate::Result<Page>> {
        std::future::poll_fn(|cx| self.poll_item(cx)).await
    }

    /// Like [`Stream::next`], but decodes each page into `T` as it arrives.
    pub fn decoded<T>(self) -> impl Stream<Item = crate::Result<Vec<T>>>
    where
        T: serde::de::DeserializeOwned,
    {
        futures::StreamExt::map(self, |result| {
            result.and_then(|page| page.decode().map_err(Error::from))
        })
    }

    fn poll_item(&mut self, cx: &mut Context<'_>) -> Poll<Option<crate::Result<Page>>> {
        if let Some(item) = ready!(self.rx.poll_recv(cx)) {
            return Poll::Ready(Some(item));
        }

        // the channel only closes once the task is done, so surface a panic
        // instead of silently ending early
        let Some(task) = self.task.as_mut() else {
            return Poll::Ready(None);
        };

        let result = ready!(Pin::new(task).poll(cx));
        self.task = None;

        match result {
            Err(error) if error.is_panic() => Poll::Ready(Some(Err(Error::from(error)))),
            _ => Poll::Ready(None),
        }
    }
}

impl Stream for PageStream {
    type Item = crate::Result<Page>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_item(cx)
    }
}
