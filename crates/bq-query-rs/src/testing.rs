//! A scripted, in-memory [`QueryService`].
use std::collections::VecDeque;
use std::ops::Range;
use std::sync::{Arc, Mutex};

use bq_query_resources_rs::job::{Job, JobReference};
use bq_query_resources_rs::query::{QueryRequest, ResultsParams};
use bq_query_resources_rs::row::TableRow;
use bq_query_resources_rs::table::{TableFieldSchema, TableSchema};
use bq_query_resources_rs::table_data::{InsertErrors, InsertRowOptions};
use bq_query_resources_rs::{DatasetReference, Page, TableReference};

use crate::query::Query;
use crate::{Error, QueryService};

pub(crate) const PROJECT_ID: &str = "winter_test00";
pub(crate) const DATASET_ID: &str = "bq_test";
pub(crate) const JOB_ID: &str = "job_abc";

#[derive(Debug)]
pub(crate) enum Reply {
    Page(Page),
    Error(Error),
    /// Never resolves.
    Hang,
}

impl From<Page> for Reply {
    fn from(page: Page) -> Self {
        Self::Page(page)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    SubmitQuery {
        project_id: String,
        request: QueryRequest,
    },
    GetResults {
        job: JobReference,
        params: ResultsParams,
    },
    InsertJob {
        project_id: String,
        job: Job,
    },
    InsertRows {
        table: TableReference,
        rows: Vec<serde_json::Value>,
    },
}

#[derive(Debug, Default)]
struct State {
    replies: VecDeque<Reply>,
    calls: Vec<Call>,
    insert_errors: Vec<InsertErrors>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockService {
    state: Arc<Mutex<State>>,
}

impl MockService {
    /// Queues the reply for the next `submit_query` or `get_results`.
    pub(crate) fn reply(&self, reply: impl Into<Reply>) {
        self.state.lock().unwrap().replies.push_back(reply.into());
    }

    pub(crate) fn reject_inserts(&self, errors: Vec<InsertErrors>) {
        self.state.lock().unwrap().insert_errors = errors;
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    async fn next_reply(&self) -> crate::Result<Page> {
        let reply = self.state.lock().unwrap().replies.pop_front();

        match reply {
            Some(Reply::Page(page)) => Ok(page),
            Some(Reply::Error(error)) => Err(error),
            Some(Reply::Hang) => std::future::pending().await,
            None => panic!("no scripted reply left"),
        }
    }
}

impl QueryService for MockService {
    async fn submit_query(&self, project_id: &str, request: &QueryRequest) -> crate::Result<Page> {
        self.record(Call::SubmitQuery {
            project_id: project_id.to_owned(),
            request: request.clone(),
        });

        self.next_reply().await
    }

    async fn get_results(&self, job: &JobReference, params: &ResultsParams) -> crate::Result<Page> {
        self.record(Call::GetResults {
            job: job.clone(),
            params: params.clone(),
        });

        self.next_reply().await
    }

    async fn insert_job(&self, project_id: &str, job: &Job) -> crate::Result<JobReference> {
        self.record(Call::InsertJob {
            project_id: project_id.to_owned(),
            job: job.clone(),
        });

        job.job_reference.clone().ok_or(Error::MissingJobReference)
    }

    async fn insert_rows<R>(
        &self,
        table: TableReference<&str>,
        rows: &[R],
        _options: InsertRowOptions,
    ) -> crate::Result<()>
    where
        R: serde::Serialize + Sync,
    {
        let rows = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        self.record(Call::InsertRows {
            table: TableReference {
                project_id: table.project_id.into(),
                dataset_id: table.dataset_id.into(),
                table_id: table.table_id.into(),
            },
            rows,
        });

        let errors = std::mem::take(&mut self.state.lock().unwrap().insert_errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::InsertFailure(errors))
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub(crate) struct Person {
    pub name: String,
    pub age: i64,
}

pub(crate) fn init_tracing() {
    // every test after the first finds one already installed
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub(crate) fn dataset() -> DatasetReference {
    DatasetReference::new(PROJECT_ID, DATASET_ID)
}

pub(crate) fn query() -> Query {
    Query::new(dataset(), "SELECT name, age FROM people")
}

pub(crate) fn job_reference() -> JobReference {
    JobReference::new(PROJECT_ID, JOB_ID)
}

pub(crate) fn schema() -> TableSchema {
    TableSchema::new(vec![
        TableFieldSchema::builder("name".into()).string().nullable(),
        TableFieldSchema::builder("age".into()).int().nullable(),
    ])
}

/// A complete page holding one `(person_{n}, n)` row for each n in `ages`.
pub(crate) fn page(ages: Range<u64>, total: u64, page_token: Option<&str>) -> Page {
    let rows = ages
        .map(|age| {
            [format!("person_{age}"), age.to_string()]
                .into_iter()
                .collect::<TableRow>()
        })
        .collect();

    Page {
        schema: Some(schema()),
        rows,
        job_complete: true,
        total_rows: Some(total),
        job_reference: Some(job_reference()),
        page_token: page_token.map(Into::into),
        errors: Vec::new(),
    }
}

pub(crate) fn incomplete_page() -> Page {
    Page {
        job_complete: false,
        job_reference: Some(job_reference()),
        ..Default::default()
    }
}
