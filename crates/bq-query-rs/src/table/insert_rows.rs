use bq_query_resources_rs::table_data::InsertRowOptions;

/// Body of a `tabledata.insertAll` request. Each row gets a fresh `insertId`,
/// which the service uses to deduplicate retried inserts.
pub(crate) struct InsertRows<'a, R> {
    options: InsertRowOptions,
    rows: &'a [R],
}

impl<'a, R> InsertRows<'a, R> {
    pub(crate) fn new(options: InsertRowOptions, rows: &'a [R]) -> Self {
        Self { options, rows }
    }
}

impl<R> serde::Serialize for InsertRows<'_, R>
where
    R: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let field_count = self.options.skip_invalid_rows as usize
            + self.options.ignore_unknown_values as usize
            + self.options.trace_id.is_some() as usize
            + 1;

        let mut map = serializer.serialize_map(Some(field_count))?;

        if self.options.ignore_unknown_values {
            map.serialize_entry("ignoreUnknownValues", &true)?;
        }

        if self.options.skip_invalid_rows {
            map.serialize_entry("skipInvalidRows", &true)?;
        }

        if let Some(trace_id) = self.options.trace_id {
            map.serialize_entry("traceId", &trace_id)?;
        }

        map.serialize_entry("rows", &RowIter(self.rows))?;

        map.end()
    }
}

struct RowIter<'a, R>(&'a [R]);

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RowWrapper<'a, R> {
    insert_id: uuid::Uuid,
    json: &'a R,
}

impl<R> serde::Serialize for RowIter<'_, R>
where
    R: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.0.iter().map(|json| RowWrapper {
            json,
            insert_id: uuid::Uuid::new_v4(),
        }))
    }
}
