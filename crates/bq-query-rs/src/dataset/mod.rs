use std::num::NonZeroU32;

use bq_query_resources_rs::DatasetReference;
use bq_query_resources_rs::query::QueryRequest;
use uuid::Uuid;

use crate::query::{Query, QueryBuilder};
use crate::table::TableClient;
use crate::{BigQueryClient, QueryService};

/// A project and dataset bound to a service. Every query and insert made
/// through it targets this dataset.
#[derive(Debug, Clone)]
pub struct DatasetClient<C = BigQueryClient> {
    service: C,
    dataset: DatasetReference,
}

impl<C> DatasetClient<C> {
    #[inline]
    pub fn from_parts(service: C, dataset: DatasetReference) -> Self {
        Self { service, dataset }
    }

    #[inline]
    pub fn reference(&self) -> &DatasetReference {
        &self.dataset
    }

    #[inline]
    pub fn project_id(&self) -> &str {
        &self.dataset.project_id
    }

    #[inline]
    pub fn dataset_id(&self) -> &str {
        &self.dataset.dataset_id
    }

    #[inline]
    pub fn service(&self) -> &C {
        &self.service
    }

    /// Starts building a paged query. Nothing is sent until it's run.
    pub fn query(&self, text: impl Into<Box<str>>) -> QueryBuilder<C>
    where
        C: Clone,
    {
        QueryBuilder::new(self.service.clone(), Query::new(self.dataset.clone(), text))
    }

    pub fn table(&self, table_id: impl Into<Box<str>>) -> TableClient<C>
    where
        C: Clone,
    {
        TableClient::from_parts(
            self.service.clone(),
            self.dataset.clone().into_table(table_id.into()),
        )
    }
}

impl<C: QueryService> DatasetClient<C> {
    /// Runs `text` inline with a single round trip, returning at most `max_rows`
    /// decoded rows. Nothing past the first response is fetched, so a query
    /// that outlives the request comes back empty.
    pub async fn sync_query<T>(&self, text: impl Into<Box<str>>, max_rows: u32) -> crate::Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let request = self.sync_request(text.into(), max_rows, false);
        self.run_sync(request, max_rows).await
    }

    /// Counts the rows of `table_id` with a legacy SQL `count(*)`.
    pub async fn count(&self, table_id: &str) -> crate::Result<u64> {
        let text = format!(
            "select count(*) from [{}:{}.{table_id}]",
            self.dataset.project_id, self.dataset.dataset_id
        );

        let request = self.sync_request(text.into_boxed_str(), 1, true);
        let rows: Vec<(u64,)> = self.run_sync(request, 1).await?;

        Ok(rows.first().map_or(0, |(count,)| *count))
    }

    fn sync_request(&self, text: Box<str>, max_rows: u32, use_legacy_sql: bool) -> QueryRequest {
        let mut request = QueryRequest::new(text);

        request.max_results = NonZeroU32::new(max_rows);
        request.default_dataset = Some(self.dataset.clone());
        request.use_legacy_sql = use_legacy_sql;
        request.request_id = Some(Uuid::new_v4());

        request
    }

    async fn run_sync<T>(&self, request: QueryRequest, max_rows: u32) -> crate::Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut page = self
            .service
            .submit_query(&self.dataset.project_id, &request)
            .await?;

        if !page.job_complete {
            debug!(
                message = "sync query didn't complete within one request",
                dataset = &*self.dataset.dataset_id
            );
            return Ok(Vec::new());
        }

        page.rows.truncate(max_rows as usize);

        let rows = page.decode()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use bq_query_resources_rs::Page;
    use bq_query_resources_rs::row::TableRow;
    use bq_query_resources_rs::table::{TableFieldSchema, TableSchema};

    use super::*;
    use crate::testing::{self, Call, MockService, Person};

    fn dataset(service: &MockService) -> DatasetClient<MockService> {
        DatasetClient::from_parts(service.clone(), testing::dataset())
    }

    fn count_page(count: Option<&str>) -> Page {
        Page {
            schema: Some(TableSchema::new(vec![
                TableFieldSchema::builder("f0_".into()).int().nullable(),
            ])),
            rows: count
                .map(|count| [count].into_iter().collect::<TableRow>())
                .into_iter()
                .collect(),
            job_complete: true,
            total_rows: Some(count.is_some() as u64),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_sync_query_truncates() -> crate::Result<()> {
        let service = MockService::default();
        service.reply(testing::page(0..5, 5, None));

        let people: Vec<Person> = dataset(&service)
            .sync_query("SELECT name, age FROM people", 3)
            .await?;

        assert_eq!(people.len(), 3);
        assert_eq!(people[2].name, "person_2");

        match service.calls().as_slice() {
            [Call::SubmitQuery { request, .. }] => {
                assert_eq!(request.max_results, NonZeroU32::new(3));
                assert!(!request.use_legacy_sql);
            }
            other => panic!("expected a single query, got {other:?}"),
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_sync_query_incomplete() -> crate::Result<()> {
        let service = MockService::default();
        service.reply(testing::incomplete_page());

        let people: Vec<Person> = dataset(&service).sync_query("SELECT 1", 10).await?;

        assert!(people.is_empty());
        assert_eq!(service.calls().len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_count() -> crate::Result<()> {
        let service = MockService::default();
        service.reply(count_page(Some("42")));

        assert_eq!(dataset(&service).count("people").await?, 42);

        match service.calls().as_slice() {
            [Call::SubmitQuery { request, .. }] => {
                assert_eq!(
                    &*request.query,
                    "select count(*) from [winter_test00:bq_test.people]"
                );
                assert!(request.use_legacy_sql);
            }
            other => panic!("expected a single query, got {other:?}"),
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_count_empty() -> crate::Result<()> {
        let service = MockService::default();
        service.reply(count_page(None));

        assert_eq!(dataset(&service).count("people").await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_query_targets_dataset() -> crate::Result<()> {
        let service = MockService::default();
        service.reply(testing::page(0..1, 1, None));

        let dataset = dataset(&service);
        let builder = dataset.query("SELECT name, age FROM people");

        assert_eq!(builder.query().dataset, testing::dataset());

        let people: Vec<Person> = builder.execute().await?;
        assert_eq!(people.len(), 1);

        let table = dataset.table("people");
        assert_eq!(table.table_id(), "people");
        assert_eq!(&*table.reference().dataset_id, testing::DATASET_ID);

        Ok(())
    }
}
