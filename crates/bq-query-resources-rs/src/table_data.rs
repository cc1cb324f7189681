//! `tabledata.insertAll` request options and response.
use crate::ErrorProto;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRowOptions {
    #[serde(skip_serializing_if = "crate::util::is_false")]
    pub skip_invalid_rows: bool,
    #[serde(skip_serializing_if = "crate::util::is_false")]
    pub ignore_unknown_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<uuid::Uuid>,
}

#[derive(Debug, PartialEq, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDataInsertAllResponse<S = Box<str>> {
    /// Errors for rows that were not inserted. Empty if every row was accepted.
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub insert_errors: Vec<InsertErrors<S>>,
}

impl<S> TableDataInsertAllResponse<S> {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.insert_errors.is_empty()
    }
}

#[derive(Debug, PartialEq, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertErrors<S = Box<str>> {
    /// Index of the rejected row, in request order.
    pub index: usize,
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorProto<S>>,
}
