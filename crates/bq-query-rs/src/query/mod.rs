use std::num::{NonZeroU32, NonZeroUsize};
use std::time::Duration;

use bq_query_resources_rs::job::{
    CreateDisposition, Job, JobReference, QueryConfiguration, WriteDisposition,
};
use bq_query_resources_rs::query::QueryRequest;
use bq_query_resources_rs::{DatasetReference, Page};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::pager::{PageStream, PagerOptions, ResultPager};
use crate::{BigQueryClient, QueryService};

/// Rows requested per page unless overridden.
pub const DEFAULT_PAGE_SIZE: NonZeroU32 = NonZeroU32::MIN.saturating_add(4999);

/// Settings that make a query run as an inserted job (writing into a
/// destination table) rather than inline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobConfig {
    pub allow_large_results: bool,
    pub write_disposition: WriteDisposition,
    pub create_disposition: CreateDisposition,
    /// A table within the query's dataset.
    pub destination_table: Option<Box<str>>,
}

impl JobConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn destination_table(mut self, table_id: impl Into<Box<str>>) -> Self {
        self.destination_table = Some(table_id.into());
        self
    }

    pub fn allow_large_results(mut self, allow: bool) -> Self {
        self.allow_large_results = allow;
        self
    }

    pub fn write_disposition(mut self, disposition: WriteDisposition) -> Self {
        self.write_disposition = disposition;
        self
    }

    pub fn create_disposition(mut self, disposition: CreateDisposition) -> Self {
        self.create_disposition = disposition;
        self
    }
}

/// One query against a dataset: what to run and how each page is requested.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub dataset: DatasetReference,
    pub text: Box<str>,
    pub job_config: Option<JobConfig>,
    pub page_size: NonZeroU32,
    pub use_legacy_sql: bool,
    /// Server side wait per request, before an incomplete response comes back.
    pub timeout: Option<Duration>,
    pub location: Option<Box<str>>,
}

impl Query {
    pub fn new(dataset: DatasetReference, text: impl Into<Box<str>>) -> Self {
        Self {
            dataset,
            text: text.into(),
            job_config: None,
            page_size: DEFAULT_PAGE_SIZE,
            use_legacy_sql: false,
            timeout: None,
            location: None,
        }
    }

    #[inline]
    pub fn project_id(&self) -> &str {
        &self.dataset.project_id
    }

    /// The body of an inline `jobs.query` call. Each call gets a new request
    /// id.
    pub fn to_request(&self) -> QueryRequest {
        let mut request = QueryRequest::new(self.text.clone());

        request.max_results = Some(self.page_size);
        request.default_dataset = Some(self.dataset.clone());
        request.timeout = self.timeout;
        request.use_legacy_sql = self.use_legacy_sql;
        request.location = self.location.clone();
        request.request_id = Some(Uuid::new_v4());

        request
    }

    /// The job to insert, if this query has a [`JobConfig`]. The job id is
    /// generated here, so every call describes a different job.
    pub fn to_job(&self) -> Option<Job> {
        let job_config = self.job_config.as_ref()?;

        let mut config = QueryConfiguration::new(self.text.clone());

        config.default_dataset = Some(self.dataset.clone());
        config.destination_table = job_config
            .destination_table
            .clone()
            .map(|table_id| self.dataset.clone().into_table(table_id));
        config.allow_large_results = job_config.allow_large_results;
        config.create_disposition = Some(job_config.create_disposition);
        config.write_disposition = Some(job_config.write_disposition);
        config.use_legacy_sql = self.use_legacy_sql;

        let mut job = Job::from(config);

        let mut job_reference = JobReference::new(
            self.dataset.project_id.clone(),
            format!("job_{}", Uuid::new_v4().simple()),
        );
        job_reference.location = self.location.clone();
        job.job_reference = Some(job_reference);

        Some(job)
    }
}

/// Configures and runs a [`Query`]. Built by
/// [`DatasetClient::query`](crate::DatasetClient::query).
#[derive(Debug, Clone)]
pub struct QueryBuilder<C = BigQueryClient> {
    service: C,
    query: Query,
    options: PagerOptions,
    cancel: Option<CancellationToken>,
}

impl<C> QueryBuilder<C> {
    pub fn new(service: C, query: Query) -> Self {
        Self {
            service,
            query,
            options: PagerOptions::default(),
            cancel: None,
        }
    }

    pub fn page_size(mut self, page_size: NonZeroU32) -> Self {
        self.query.page_size = page_size;
        self
    }

    pub fn job_config(mut self, job_config: JobConfig) -> Self {
        self.query.job_config = Some(job_config);
        self
    }

    pub fn use_legacy_sql(mut self, use_legacy_sql: bool) -> Self {
        self.query.use_legacy_sql = use_legacy_sql;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.query.timeout = Some(timeout);
        self
    }

    pub fn location(mut self, location: impl Into<Box<str>>) -> Self {
        self.query.location = Some(location.into());
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.options.poll_interval = poll_interval;
        self
    }

    pub fn stream_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.options.stream_capacity = capacity;
        self
    }

    /// Runs under a child of `token`: cancelling `token` stops this query,
    /// but finishing (or dropping) this query leaves `token` alone.
    pub fn cancel_with(mut self, token: &CancellationToken) -> Self {
        self.cancel = Some(token.child_token());
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn into_pager(self) -> ResultPager<C> {
        let pager = ResultPager::new(self.service, self.query, self.options);

        match self.cancel {
            Some(token) => pager.with_cancellation(token),
            None => pager,
        }
    }
}

impl<C: QueryService> QueryBuilder<C> {
    /// Fetches every page, concatenated into one.
    pub async fn collect(self) -> crate::Result<Page> {
        self.into_pager().collect().await
    }

    /// Fetches every page and decodes every row into `T`.
    pub async fn execute<T>(self) -> crate::Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let page = self.collect().await?;
        let rows = page.decode()?;
        Ok(rows)
    }

    /// Like [`execute`](Self::execute), but replaces the contents of `dst`. On
    /// any error `dst` is left as it was.
    pub async fn execute_into<T>(self, dst: &mut Vec<T>) -> crate::Result<()>
    where
        T: serde::de::DeserializeOwned,
    {
        *dst = self.execute().await?;
        Ok(())
    }

    /// Streams pages as they're fetched. See [`ResultPager::stream`].
    pub fn stream(self) -> PageStream
    where
        C: 'static,
    {
        self.into_pager().stream()
    }
}
