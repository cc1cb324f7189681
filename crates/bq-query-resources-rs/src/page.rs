use crate::decode::{self, DecodeError};
use crate::job::JobReference;
use crate::row::TableRow;
use crate::table::TableSchema;
use crate::ErrorProto;

/// One page of a result set, as returned by both `jobs.query` and
/// `jobs.getQueryResults`.
///
/// `job_complete` means this page's data is ready, not that every row of the
/// query has been delivered. `total_rows` is only authoritative once
/// `job_complete` is set.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<TableSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<TableRow>,
    #[serde(default)]
    pub job_complete: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::util::uint64::optional"
    )]
    pub total_rows: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_reference: Option<JobReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<Box<str>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorProto>,
}

impl Page {
    /// Column names in schema order. Empty if the page carries no schema
    /// (i.e. the job hasn't completed yet).
    pub fn headers(&self) -> Vec<&str> {
        match self.schema {
            Some(ref schema) => schema.names().collect(),
            None => Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The total row count, only if the service has marked it as final.
    #[inline]
    pub fn final_total_rows(&self) -> Option<u64> {
        if self.job_complete {
            self.total_rows
        } else {
            None
        }
    }

    /// Appends the rows of a later page onto this one, taking its completion
    /// state, total and continuation token. The first schema seen is kept.
    pub fn append(&mut self, mut later: Page) {
        if self.schema.is_none() {
            self.schema = later.schema.take();
        }

        self.rows.append(&mut later.rows);
        self.errors.append(&mut later.errors);
        self.job_complete = later.job_complete;
        self.total_rows = later.total_rows.or(self.total_rows);
        self.page_token = later.page_token;

        if later.job_reference.is_some() {
            self.job_reference = later.job_reference;
        }
    }

    /// Decodes every row in this page into `T`, in row order.
    pub fn decode<'de, T>(&'de self) -> Result<Vec<T>, DecodeError>
    where
        T: serde::Deserialize<'de>,
    {
        match self.schema {
            Some(ref schema) => decode::decode_rows(schema, &self.rows),
            None if self.rows.is_empty() => Ok(Vec::new()),
            None => Err(DecodeError::MissingSchema),
        }
    }

    /// Replaces the contents of `dst` with one decoded record per row. `dst` is left
    /// untouched if any row fails to decode.
    pub fn decode_into<'de, T>(&'de self, dst: &mut Vec<T>) -> Result<(), DecodeError>
    where
        T: serde::Deserialize<'de>,
    {
        *dst = self.decode()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_PAGE: &str = r#"{
        "kind": "bigquery#queryResponse",
        "schema": {
            "fields": [
                {"name": "name", "type": "STRING", "mode": "NULLABLE"},
                {"name": "age", "type": "INTEGER", "mode": "NULLABLE"}
            ]
        },
        "jobReference": {
            "projectId": "winter_test00",
            "jobId": "job_abc",
            "location": "US"
        },
        "totalRows": "3",
        "pageToken": "BCDE",
        "rows": [
            {"f": [{"v": "alice"}, {"v": "31"}]},
            {"f": [{"v": "bob"}, {"v": null}]},
            {"f": [{"v": null}, {"v": "7"}]}
        ],
        "totalBytesProcessed": "0",
        "jobComplete": true,
        "cacheHit": false
    }"#;

    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Person {
        name: String,
        age: i32,
    }

    #[test]
    fn test_page_deserialize_and_decode() -> Result<(), Box<dyn std::error::Error>> {
        let page: Page = serde_json::from_str(JSON_PAGE)?;

        assert!(page.job_complete);
        assert_eq!(page.final_total_rows(), Some(3));
        assert_eq!(page.len(), 3);
        assert_eq!(page.page_token.as_deref(), Some("BCDE"));
        assert_eq!(page.headers(), ["name", "age"]);

        let people: Vec<Person> = page.decode()?;

        assert_eq!(people, [
            Person {
                name: "alice".into(),
                age: 31
            },
            Person {
                name: "bob".into(),
                age: 0
            },
            Person {
                name: String::new(),
                age: 7
            },
        ]);

        Ok(())
    }

    #[test]
    fn test_incomplete_page() -> Result<(), Box<dyn std::error::Error>> {
        const JSON_INCOMPLETE: &str = r#"{
            "jobReference": {"projectId": "winter_test00", "jobId": "job_abc"},
            "totalRows": "10",
            "jobComplete": false
        }"#;

        let page: Page = serde_json::from_str(JSON_INCOMPLETE)?;

        assert!(!page.job_complete);
        assert_eq!(page.total_rows, Some(10));
        assert_eq!(page.final_total_rows(), None);
        assert!(page.headers().is_empty());
        assert!(page.decode::<Person>()?.is_empty());

        Ok(())
    }

    #[test]
    fn test_append_pages() -> Result<(), Box<dyn std::error::Error>> {
        let mut first: Page = serde_json::from_str(JSON_PAGE)?;
        let mut second = first.clone();

        second.schema = None;
        second.page_token = None;
        second.rows.truncate(1);

        first.append(second);

        assert_eq!(first.len(), 4);
        assert_eq!(first.headers(), ["name", "age"]);
        assert_eq!(first.page_token, None);
        assert_eq!(first.final_total_rows(), Some(3));
        assert_eq!(first.decode::<Person>()?[3].name, "alice");

        Ok(())
    }

    #[test]
    fn test_decode_without_schema() {
        let page = Page {
            rows: vec![[Some("x")].into_iter().collect()],
            ..Default::default()
        };

        assert_eq!(
            page.decode::<(String,)>().unwrap_err(),
            DecodeError::MissingSchema
        );
    }

    #[test]
    fn test_decode_into_keeps_destination_on_error() {
        let mut page: Page = serde_json::from_str(JSON_PAGE).unwrap();
        page.rows[2].f[1] = crate::row::TableCell::text("not a number");

        let mut people = vec![Person {
            name: "existing".into(),
            age: 1,
        }];

        assert!(page.decode_into(&mut people).is_err());
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].name, "existing");
    }
}
