use std::num::NonZeroU32;
use std::time::Duration;

use uuid::Uuid;

use crate::DatasetReference;

/// Body of `POST /projects/{projectId}/queries`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest<S = Box<str>> {
    pub query: S,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<NonZeroU32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_dataset: Option<DatasetReference<S>>,
    #[serde(
        rename = "timeoutMs",
        serialize_with = "serialize_timeout_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
    #[serde(skip_serializing_if = "crate::util::is_false")]
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_query_cache: Option<bool>,
    pub use_legacy_sql: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<S>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
}

impl<S> QueryRequest<S> {
    pub fn new(query: impl Into<S>) -> Self {
        Self {
            query: query.into(),
            max_results: None,
            default_dataset: None,
            timeout: None,
            dry_run: false,
            use_query_cache: None,
            use_legacy_sql: false,
            location: None,
            request_id: None,
        }
    }
}

/// Query string parameters for `GET /projects/{projectId}/queries/{jobId}`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<Box<str>>,
    /// Zero based row to start from. Only used when there's no page token to follow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_index: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<NonZeroU32>,
    #[serde(
        rename = "timeoutMs",
        serialize_with = "serialize_timeout_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Box<str>>,
}

pub(crate) fn serialize_timeout_ms<S>(
    opt: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match opt {
        None => serializer.serialize_none(),
        Some(timeout) => serializer.serialize_some(&(timeout.as_millis() as u64)),
    }
}
