use bq_query_resources_rs::TableReference;
pub use bq_query_resources_rs::table_data::InsertRowOptions;

use crate::{BigQueryClient, QueryService};

pub(crate) mod insert_rows;

/// A single table, for streaming rows into.
#[derive(Debug, Clone)]
pub struct TableClient<C = BigQueryClient> {
    service: C,
    table: TableReference,
}

impl<C> TableClient<C> {
    #[inline]
    pub(crate) fn from_parts(service: C, table: TableReference) -> Self {
        Self { service, table }
    }

    #[inline]
    pub fn reference(&self) -> &TableReference {
        &self.table
    }

    #[inline]
    pub fn table_id(&self) -> &str {
        &self.table.table_id
    }
}

impl<C: QueryService> TableClient<C> {
    /// Inserts `rows` with the default [`InsertRowOptions`]. If the service
    /// rejects any row, nothing is retried and the per-row errors are returned
    /// as [`crate::Error::InsertFailure`].
    pub async fn insert_rows<R>(&self, rows: &[R]) -> crate::Result<()>
    where
        R: serde::Serialize + Sync,
    {
        self.insert_rows_opt(rows, InsertRowOptions::default()).await
    }

    pub async fn insert_rows_opt<R>(&self, rows: &[R], options: InsertRowOptions) -> crate::Result<()>
    where
        R: serde::Serialize + Sync,
    {
        if rows.is_empty() {
            return Ok(());
        }

        debug!(
            message = "inserting rows",
            table = &*self.table.table_id,
            rows = rows.len()
        );

        self.service
            .insert_rows(self.table.as_deref(), rows, options)
            .await
    }
}
