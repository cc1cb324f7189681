use crate::{DatasetReference, ErrorProto, TableReference, util};

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job<S = Box<str>> {
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub kind: Option<S>,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub id: Option<S>,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub self_link: Option<S>,
    pub configuration: JobConfiguration<S>,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub job_reference: Option<JobReference<S>>,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus<S>>,
}

impl<S> From<QueryConfiguration<S>> for Job<S> {
    #[inline]
    fn from(value: QueryConfiguration<S>) -> Self {
        JobConfiguration::from(value).into_job()
    }
}

/// Identifies one asynchronous job. Stable across every page of a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference<S = Box<str>> {
    /// [Required] The ID of the project containing this job.
    pub project_id: S,
    pub job_id: S,
    /// The geographic location of the job. See details at
    /// https://cloud.google.com/bigquery/docs/locations#specifying_your_location.
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub location: Option<S>,
}

impl<S> JobReference<S> {
    pub fn new(project_id: impl Into<S>, job_id: impl Into<S>) -> Self {
        Self {
            project_id: project_id.into(),
            job_id: job_id.into(),
            location: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus<S = Box<str>> {
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub error_result: Option<ErrorProto<S>>,
    // need to specify a default fn vec to avoid S needing Default
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorProto<S>>,
    pub state: JobState,
}

impl<S> JobStatus<S> {
    pub fn first_error(&self) -> Option<&ErrorProto<S>> {
        self.error_result.as_ref().or_else(|| self.errors.first())
    }

    pub fn into_errors(mut self) -> Vec<ErrorProto<S>> {
        if let Some(result) = self.error_result {
            self.errors.insert(0, result);
        }

        self.errors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Running,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    Query,
    Load,
    Extract,
    Copy,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfiguration<S = Box<str>> {
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub job_type: Option<JobType>,
    #[serde(default, skip_serializing_if = "util::is_false")]
    pub dry_run: bool,
    pub query: QueryConfiguration<S>,
}

impl<S> JobConfiguration<S> {
    /// Converts [self] into a [Job], with empty values for the fields in [Job]
    pub fn into_job(self) -> Job<S> {
        Job {
            kind: None,
            id: None,
            self_link: None,
            job_reference: None,
            status: None,
            configuration: self,
        }
    }
}

impl<S> From<QueryConfiguration<S>> for JobConfiguration<S> {
    #[inline]
    fn from(query: QueryConfiguration<S>) -> Self {
        JobConfiguration {
            job_type: Some(JobType::Query),
            dry_run: false,
            query,
        }
    }
}

/// The `configuration.query` part of a job, used when results have to be
/// materialized into a destination table.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfiguration<S = Box<str>> {
    pub query: S,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub destination_table: Option<TableReference<S>>,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub default_dataset: Option<DatasetReference<S>>,
    #[serde(default, skip_serializing_if = "util::is_false")]
    pub allow_large_results: bool,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub create_disposition: Option<CreateDisposition>,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub write_disposition: Option<WriteDisposition>,
    #[serde(default)]
    pub use_legacy_sql: bool,
}

impl<S> QueryConfiguration<S> {
    pub fn new(query: impl Into<S>) -> Self {
        Self {
            query: query.into(),
            destination_table: None,
            default_dataset: None,
            allow_large_results: false,
            create_disposition: None,
            write_disposition: None,
            use_legacy_sql: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateDisposition {
    #[default]
    CreateIfNeeded,
    CreateNever,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
    #[default]
    WriteEmpty,
    WriteAppend,
    WriteTruncate,
}
