//! Walks every page of a query's result set.
//!
//! A response's `jobComplete` only means that response's rows are ready, so
//! the pager keeps following the job reference and continuation token until
//! it has delivered as many rows as the (final) total reports. Incomplete
//! responses carry no rows, and get re-requested after
//! [`PagerOptions::poll_interval`].
use std::future::Future;
use std::num::NonZeroUsize;
use std::time::Duration;

use bq_query_resources_rs::Page;
use bq_query_resources_rs::job::JobReference;
use bq_query_resources_rs::query::ResultsParams;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::query::Query;
use crate::{Error, QueryService};

mod stream;

pub use stream::PageStream;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerOptions {
    /// How long to wait before re-requesting an incomplete page.
    pub poll_interval: Duration,
    /// How many pages a [`PageStream`] buffers ahead of its consumer.
    pub stream_capacity: NonZeroUsize,
}

impl Default for PagerOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            stream_capacity: NonZeroUsize::MIN,
        }
    }
}

/// Returned by a [`PageSink`] that can't accept any more pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

/// Receives each complete page, in order.
pub trait PageSink: Send {
    fn accept(&mut self, page: Page) -> impl Future<Output = Result<(), SinkClosed>> + Send;
}

impl PageSink for mpsc::Sender<crate::Result<Page>> {
    async fn accept(&mut self, page: Page) -> Result<(), SinkClosed> {
        self.send(Ok(page)).await.map_err(|_| SinkClosed)
    }
}

impl PageSink for Vec<Page> {
    async fn accept(&mut self, page: Page) -> Result<(), SinkClosed> {
        self.push(page);
        Ok(())
    }
}

/// Concatenates every page into one.
#[derive(Debug, Default)]
pub struct Accumulator {
    page: Option<Page>,
}

impl Accumulator {
    pub fn into_page(self) -> Page {
        self.page.unwrap_or_default()
    }
}

impl PageSink for Accumulator {
    async fn accept(&mut self, page: Page) -> Result<(), SinkClosed> {
        match self.page {
            Some(ref mut accumulated) => accumulated.append(page),
            None => self.page = Some(page),
        }

        Ok(())
    }
}

/// Drives a single [`Query`] from submission until its last page.
#[derive(Debug)]
pub struct ResultPager<C> {
    service: C,
    query: Query,
    options: PagerOptions,
    cancel: CancellationToken,
}

impl<C> ResultPager<C> {
    pub fn new(service: C, query: Query, options: PagerOptions) -> Self {
        Self {
            service,
            query,
            options,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Cancelling this stops the pager before its next round trip, or aborts
    /// the one in flight.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn query(&self) -> &Query {
        &self.query
    }
}

impl<C: QueryService> ResultPager<C> {
    /// Fetches every page, handing each complete one to `sink`. Returns the
    /// number of rows delivered.
    pub async fn run<S>(&self, sink: &mut S) -> crate::Result<u64>
    where
        S: PageSink,
    {
        let mut cursor = Cursor::default();
        let mut page = self.cancellable(self.first_page(&mut cursor)).await?;

        loop {
            let step = cursor.observe(&page);

            debug!(
                message = "received page",
                job_id = cursor.job_id(),
                complete = page.job_complete,
                rows = page.rows.len(),
                delivered = cursor.delivered,
                total = ?page.total_rows
            );

            match step {
                Step::Poll => {
                    self.cancellable(async {
                        tokio::time::sleep(self.options.poll_interval).await;
                        Ok(())
                    })
                    .await?;
                }
                Step::Fetch => self.deliver(sink, page).await?,
                Step::Done { total } => {
                    self.deliver(sink, page).await?;
                    info!(
                        message = "query complete",
                        job_id = cursor.job_id(),
                        delivered = cursor.delivered,
                        total
                    );
                    return Ok(cursor.delivered);
                }
                Step::Stalled { total } => {
                    return Err(Error::IncompleteResults {
                        delivered: cursor.delivered,
                        total,
                    });
                }
            }

            let job_reference = cursor
                .job_reference
                .as_ref()
                .ok_or(Error::MissingJobReference)?;

            let params = cursor.params(&self.query);

            page = self
                .cancellable(self.service.get_results(job_reference, &params))
                .await?;
        }
    }

    /// Runs the pager to completion, concatenating every page.
    pub async fn collect(self) -> crate::Result<Page> {
        let mut accumulator = Accumulator::default();
        self.run(&mut accumulator).await?;
        Ok(accumulator.into_page())
    }

    /// Runs the pager on a background task, yielding each page as it arrives.
    /// An error is always the last item. Dropping the stream cancels the pager.
    ///
    /// Must be called from within a tokio runtime.
    pub fn stream(self) -> PageStream
    where
        C: 'static,
    {
        let (tx, rx) = mpsc::channel(self.options.stream_capacity.get());
        let cancel = self.cancel.clone();

        let task = tokio::spawn(async move {
            let mut sink = tx;

            if let Err(error) = self.run(&mut sink).await {
                debug!(message = "query stream ended with an error", ?error);
                // a send error means the consumer is gone, nobody left to tell
                let _ = sink.send(Err(error)).await;
            }
        });

        PageStream::new(rx, cancel, task)
    }

    async fn first_page(&self, cursor: &mut Cursor) -> crate::Result<Page> {
        let Some(job) = self.query.to_job() else {
            let request = self.query.to_request();
            return self
                .service
                .submit_query(self.query.project_id(), &request)
                .await;
        };

        let job_reference = self
            .service
            .insert_job(self.query.project_id(), &job)
            .await?;

        info!(message = "inserted query job", job_id = &*job_reference.job_id);

        let params = cursor.params(&self.query);
        let page = self.service.get_results(&job_reference, &params).await?;

        cursor.job_reference = Some(job_reference);
        Ok(page)
    }

    async fn deliver<S>(&self, sink: &mut S, page: Page) -> crate::Result<()>
    where
        S: PageSink,
    {
        self.cancellable(async { sink.accept(page).await.map_err(|SinkClosed| Error::Cancelled) })
            .await
    }

    async fn cancellable<F, T>(&self, future: F) -> crate::Result<T>
    where
        F: Future<Output = crate::Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = future => result,
        }
    }
}

/// What to do after observing a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Not ready yet, re-request after the poll interval.
    Poll,
    /// Deliver, then fetch the next page.
    Fetch,
    /// Deliver, nothing left to fetch.
    Done { total: u64 },
    /// Short of the total with nothing to follow.
    Stalled { total: u64 },
}

/// Position within the result set of one query.
#[derive(Debug, Default)]
struct Cursor {
    job_reference: Option<JobReference>,
    page_token: Option<Box<str>>,
    delivered: u64,
    /// The latest total reported by a complete page.
    total: Option<u64>,
}

impl Cursor {
    fn job_id(&self) -> Option<&str> {
        self.job_reference.as_ref().map(|job_ref| &*job_ref.job_id)
    }

    fn observe(&mut self, page: &Page) -> Step {
        match page.job_reference {
            Some(ref job_reference) => {
                self.job_reference = Some(job_reference.clone());
                self.page_token = page.page_token.clone();
            }
            None => {
                if self.job_reference.is_some() {
                    warn!("response is missing its job reference, reusing the previous one");
                }

                if page.page_token.is_some() {
                    self.page_token = page.page_token.clone();
                }
            }
        }

        if !page.job_complete {
            return Step::Poll;
        }

        self.delivered += page.rows.len() as u64;

        if page.total_rows.is_some() {
            self.total = page.total_rows;
        }

        match self.total {
            Some(total) if self.delivered >= total => Step::Done { total },
            Some(total) if page.rows.is_empty() && page.page_token.is_none() => {
                Step::Stalled { total }
            }
            Some(_) => Step::Fetch,
            // no total was ever reported, so the tokens are all there is to go on
            None if page.page_token.is_some() => Step::Fetch,
            None => Step::Done {
                total: self.delivered,
            },
        }
    }

    fn params(&self, query: &Query) -> ResultsParams {
        let location = self
            .job_reference
            .as_ref()
            .and_then(|job_ref| job_ref.location.clone())
            .or_else(|| query.location.clone());

        ResultsParams {
            page_token: self.page_token.clone(),
            // without a token to follow, resume after the rows we already have
            start_index: (self.page_token.is_none() && self.delivered > 0).then_some(self.delivered),
            max_results: Some(query.page_size),
            timeout: query.timeout,
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use futures::StreamExt;

    use super::*;
    use crate::query::JobConfig;
    use crate::testing::{self, Call, MockService, Reply};

    fn pager(service: &MockService) -> ResultPager<MockService> {
        ResultPager::new(service.clone(), testing::query(), PagerOptions::default())
    }

    #[tokio::test]
    async fn test_single_terminal_page() -> crate::Result<()> {
        let service = MockService::default();
        service.reply(testing::page(0..3, 3, None));

        let page = pager(&service).collect().await?;

        assert_eq!(page.len(), 3);
        assert_eq!(page.headers(), ["name", "age"]);

        let calls = service.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(calls[0], Call::SubmitQuery { ref project_id, .. } if project_id == "winter_test00"));

        Ok(())
    }

    #[tokio::test]
    async fn test_follows_page_tokens_until_total() -> crate::Result<()> {
        testing::init_tracing();

        let service = MockService::default();
        service.reply(testing::page(0..5000, 10000, Some("page-2")));
        service.reply(testing::page(5000..10000, 10000, None));

        let mut pages = Vec::new();
        let delivered = pager(&service).run(&mut pages).await?;

        assert_eq!(delivered, 10000);
        assert_eq!(pages.len(), 2);

        let calls = service.calls();
        assert_eq!(calls.len(), 2);

        match calls[1] {
            Call::GetResults {
                ref job,
                ref params,
            } => {
                assert_eq!(&*job.job_id, "job_abc");
                assert_eq!(params.page_token.as_deref(), Some("page-2"));
                assert_eq!(params.start_index, None);
                assert_eq!(params.max_results, NonZeroU32::new(5000));
            }
            ref other => panic!("expected a results fetch, got {other:?}"),
        }

        let people: Vec<testing::Person> = pages[1].decode()?;
        assert_eq!(people[0].age, 5000);

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_incomplete_responses() -> crate::Result<()> {
        testing::init_tracing();

        let service = MockService::default();
        service.reply(testing::incomplete_page());
        service.reply(testing::incomplete_page());
        service.reply(testing::page(0..2, 2, None));

        let started = tokio::time::Instant::now();
        let page = pager(&service).collect().await?;

        assert_eq!(page.len(), 2);
        assert!(started.elapsed() >= DEFAULT_POLL_INTERVAL * 2);

        let calls = service.calls();
        assert_eq!(calls.len(), 3);

        for call in &calls[1..] {
            match call {
                Call::GetResults { params, .. } => {
                    assert_eq!(params.page_token, None);
                    assert_eq!(params.start_index, None);
                }
                other => panic!("expected a results fetch, got {other:?}"),
            }
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_job_config_inserts_one_job() -> crate::Result<()> {
        let service = MockService::default();
        service.reply(testing::page(0..2, 4, Some("next")));
        service.reply(testing::page(2..4, 4, None));

        let mut query = testing::query();
        query.job_config = Some(JobConfig::new().destination_table("people_copy"));

        let page = ResultPager::new(service.clone(), query, PagerOptions::default())
            .collect()
            .await?;

        assert_eq!(page.len(), 4);

        let calls = service.calls();
        assert_eq!(calls.len(), 3);

        match calls[0] {
            Call::InsertJob { ref job, .. } => {
                let destination = job.configuration.query.destination_table.as_ref().unwrap();
                assert_eq!(&*destination.table_id, "people_copy");
            }
            ref other => panic!("expected a job insert, got {other:?}"),
        }

        assert!(matches!(calls[1], Call::GetResults { ref params, .. } if params.page_token.is_none()));
        assert!(matches!(calls[2], Call::GetResults { ref params, .. } if params.page_token.as_deref() == Some("next")));

        Ok(())
    }

    #[tokio::test]
    async fn test_reuses_previous_job_reference() -> crate::Result<()> {
        let service = MockService::default();
        service.reply(testing::page(0..1, 3, Some("t1")));

        let mut orphan = testing::page(1..2, 3, Some("t2"));
        orphan.job_reference = None;
        service.reply(orphan);

        service.reply(testing::page(2..3, 3, None));

        let page = pager(&service).collect().await?;
        assert_eq!(page.len(), 3);

        match service.calls()[2] {
            Call::GetResults {
                ref job,
                ref params,
            } => {
                assert_eq!(&*job.job_id, "job_abc");
                assert_eq!(params.page_token.as_deref(), Some("t2"));
            }
            ref other => panic!("expected a results fetch, got {other:?}"),
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_job_reference() {
        let service = MockService::default();

        let mut page = testing::incomplete_page();
        page.job_reference = None;
        service.reply(page);

        assert!(matches!(
            pager(&service).collect().await,
            Err(Error::MissingJobReference)
        ));
    }

    #[tokio::test]
    async fn test_keeps_earlier_total() -> crate::Result<()> {
        let service = MockService::default();
        service.reply(testing::page(0..2, 4, Some("t1")));

        let mut untotalled = testing::page(2..3, 4, Some("t2"));
        untotalled.total_rows = None;
        service.reply(untotalled);

        service.reply(testing::page(3..4, 4, None));

        let page = pager(&service).collect().await?;

        assert_eq!(page.len(), 4);
        assert_eq!(service.calls().len(), 3);

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_total_follows_tokens() -> crate::Result<()> {
        let service = MockService::default();

        for (ages, token) in [(0..2, Some("t1")), (2..3, None)] {
            let mut page = testing::page(ages, 0, token);
            page.total_rows = None;
            service.reply(page);
        }

        let mut pages: Vec<Page> = Vec::new();
        let delivered = pager(&service).run(&mut pages).await?;

        assert_eq!(delivered, 3);
        assert_eq!(pages.len(), 2);
        assert_eq!(service.calls().len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_stalled_results() {
        let service = MockService::default();
        service.reply(testing::page(0..3, 10, None));
        service.reply(testing::page(0..0, 10, None));

        assert!(matches!(
            pager(&service).collect().await,
            Err(Error::IncompleteResults {
                delivered: 3,
                total: 10
            })
        ));

        match service.calls()[1] {
            Call::GetResults { ref params, .. } => assert_eq!(params.start_index, Some(3)),
            ref other => panic!("expected a results fetch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stream_pages() -> crate::Result<()> {
        let service = MockService::default();
        service.reply(testing::page(0..5000, 10000, Some("page-2")));
        service.reply(testing::page(5000..10000, 10000, None));

        let mut stream = pager(&service).stream();

        assert_eq!(stream.recv().await.transpose()?.map(|page| page.len()), Some(5000));
        assert_eq!(stream.recv().await.transpose()?.map(|page| page.len()), Some(5000));
        assert!(stream.recv().await.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_stream_error_is_last_item() {
        testing::init_tracing();

        let service = MockService::default();
        service.reply(testing::page(0..2, 6, Some("page-2")));
        service.reply(Reply::Error(Error::from_error_protos(
            http::StatusCode::INTERNAL_SERVER_ERROR,
            Vec::new(),
        )));

        let items = pager(&service).stream().collect::<Vec<_>>().await;

        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Ok(ref page) if page.len() == 2));
        assert!(matches!(items[1], Err(Error::Service { .. })));
    }

    #[tokio::test]
    async fn test_cancel_stream() {
        let service = MockService::default();
        service.reply(Reply::Hang);

        let mut stream = pager(&service).stream();
        stream.cancel();

        assert!(matches!(stream.recv().await, Some(Err(Error::Cancelled))));
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_stream_cancels() {
        let service = MockService::default();
        service.reply(Reply::Hang);

        let pager = pager(&service);
        let token = pager.cancellation_token().clone();

        let stream = pager.stream();
        assert!(!token.is_cancelled());

        drop(stream);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let service = MockService::default();
        service.reply(testing::page(0..3, 3, None));

        let token = CancellationToken::new();
        token.cancel();

        let result = pager(&service).with_cancellation(token).collect().await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(service.calls().is_empty());
    }
}
