#[macro_use]
extern crate tracing;

mod auth;
mod client;
pub mod dataset;
mod error;
pub mod pager;
pub mod query;
mod service;
pub mod table;

#[cfg(test)]
mod testing;

pub use auth::{Auth, Credentials, read_private_key_pem};
pub use bq_query_resources_rs as resources;
pub use bq_query_resources_rs::query::ResultsParams;
pub use client::{BigQueryClient, ClientBuilder};
pub use dataset::DatasetClient;
pub use error::Error;
pub use pager::{PageStream, PagerOptions, ResultPager};
pub use query::{JobConfig, Query, QueryBuilder};
pub use service::QueryService;

/// Type alias to [`core::result::Result<T, Error>`].
pub type Result<T> = core::result::Result<T, Error>;
