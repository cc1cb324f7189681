//! The round trips the pager and facade are built on.
use std::future::Future;

use bq_query_resources_rs::job::{Job, JobReference};
use bq_query_resources_rs::query::{QueryRequest, ResultsParams};
use bq_query_resources_rs::table_data::{InsertRowOptions, TableDataInsertAllResponse};
use bq_query_resources_rs::{Page, TableReference};

use crate::table::insert_rows::InsertRows;
use crate::{BigQueryClient, Error, client};

/// A remote query service. Implemented over REST by [`BigQueryClient`].
///
/// Every call is a single round trip, nothing is retried.
pub trait QueryService: Send + Sync {
    /// `jobs.query`: runs `request` inline, returning the first page (or an
    /// incomplete response if the server side timeout elapses first).
    fn submit_query(
        &self,
        project_id: &str,
        request: &QueryRequest,
    ) -> impl Future<Output = crate::Result<Page>> + Send;

    /// `jobs.getQueryResults`: fetches a page of an existing job.
    fn get_results(
        &self,
        job: &JobReference,
        params: &ResultsParams,
    ) -> impl Future<Output = crate::Result<Page>> + Send;

    /// `jobs.insert`: starts a job, returning its reference.
    fn insert_job(
        &self,
        project_id: &str,
        job: &Job,
    ) -> impl Future<Output = crate::Result<JobReference>> + Send;

    /// `tabledata.insertAll`: streams rows into a table. Any rejected row fails
    /// the call with [`Error::InsertFailure`].
    fn insert_rows<R>(
        &self,
        table: TableReference<&str>,
        rows: &[R],
        options: InsertRowOptions,
    ) -> impl Future<Output = crate::Result<()>> + Send
    where
        R: serde::Serialize + Sync;
}

impl QueryService for BigQueryClient {
    async fn submit_query(&self, project_id: &str, request: &QueryRequest) -> crate::Result<Page> {
        let url = self.inner.make_url(["projects", project_id, "queries"]);
        let resp = self.inner.post(url, request).await?;
        client::deserialize_json(resp).await
    }

    async fn get_results(&self, job: &JobReference, params: &ResultsParams) -> crate::Result<Page> {
        let url = self.inner.make_url([
            "projects",
            &*job.project_id,
            "queries",
            &*job.job_id,
        ]);

        let resp = self.inner.get(url, params).await?;
        client::deserialize_json(resp).await
    }

    async fn insert_job(&self, project_id: &str, job: &Job) -> crate::Result<JobReference> {
        let url = self.inner.make_url(["projects", project_id, "jobs"]);
        let resp = self.inner.post(url, job).await?;

        let mut job: Job = client::deserialize_json(resp).await?;

        if let Some(status) = job.status.take() {
            let mut errors = status.into_errors();

            if !errors.is_empty() {
                let main = errors.remove(0);
                return Err(Error::Job { main, misc: errors });
            }
        }

        job.job_reference.ok_or(Error::MissingJobReference)
    }

    async fn insert_rows<R>(
        &self,
        table: TableReference<&str>,
        rows: &[R],
        options: InsertRowOptions,
    ) -> crate::Result<()>
    where
        R: serde::Serialize + Sync,
    {
        let url = self.inner.make_url([
            "projects",
            table.project_id,
            "datasets",
            table.dataset_id,
            "tables",
            table.table_id,
            "insertAll",
        ]);

        let resp = self.inner.post(url, &InsertRows::new(options, rows)).await?;

        let response: TableDataInsertAllResponse = client::deserialize_json(resp).await?;

        if response.is_success() {
            Ok(())
        } else {
            Err(Error::InsertFailure(response.insert_errors))
        }
    }
}
