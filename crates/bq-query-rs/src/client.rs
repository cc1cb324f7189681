use std::sync::Arc;

use bq_query_resources_rs::{DatasetReference, ErrorProto};
use http::header::HeaderValue;
use reqwest::{IntoUrl, Response, Url};

use crate::auth::{Auth, Credentials};
use crate::dataset::DatasetClient;
use crate::Error;

/// The base URL for this service, missing the 'projects/{projectId}' path components.
pub(crate) const BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

const USER_AGENT: &str = concat!("bq-query-rs/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct BigQueryClient {
    pub(crate) inner: Arc<InnerClient>,
}

#[derive(Debug)]
pub(crate) struct InnerClient {
    client: reqwest::Client,
    auth: Option<Auth>,
    base_url: Url,
}

impl BigQueryClient {
    /// A client authenticating as the given service account. The key itself isn't
    /// parsed until the first request.
    pub fn new(credentials: Credentials) -> crate::Result<Self> {
        Self::builder().credentials(credentials).build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Binds a project and dataset, for running queries and inserts against.
    pub fn dataset(
        &self,
        project_id: impl Into<Box<str>>,
        dataset_id: impl Into<Box<str>>,
    ) -> DatasetClient {
        DatasetClient::from_parts(self.clone(), DatasetReference::new(project_id, dataset_id))
    }

    pub fn into_dataset(
        self,
        project_id: impl Into<Box<str>>,
        dataset_id: impl Into<Box<str>>,
    ) -> DatasetClient {
        DatasetClient::from_parts(self, DatasetReference::new(project_id, dataset_id))
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }
}

#[derive(Debug, Default)]
pub struct ClientBuilder {
    base_url: Option<Box<str>>,
    user_agent: Option<Box<str>>,
    auth: Option<Auth>,
    client: Option<reqwest::Client>,
}

impl ClientBuilder {
    /// Overrides [`BASE_URL`], i.e. to point at an emulator.
    pub fn base_url(mut self, base_url: impl Into<Box<str>>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<Box<str>>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn credentials(self, credentials: Credentials) -> Self {
        self.auth(Auth::from_credentials(credentials))
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Uses an existing [`reqwest::Client`], ignoring any user agent set on this builder.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> crate::Result<BigQueryClient> {
        let base_url = Url::parse(self.base_url.as_deref().unwrap_or(BASE_URL))?;

        if base_url.cannot_be_a_base() {
            return Err(Error::NotInitialized("base url can't have path segments appended"));
        }

        let client = match self.client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .user_agent(self.user_agent.as_deref().unwrap_or(USER_AGENT))
                .build()?,
        };

        Ok(BigQueryClient {
            inner: Arc::new(InnerClient {
                client,
                auth: self.auth,
                base_url,
            }),
        })
    }
}

impl InnerClient {
    async fn get_auth_header(&self) -> Result<HeaderValue, Error> {
        match self.auth {
            Some(ref auth) => auth.get_header().await,
            None => Err(Error::NotInitialized("no credentials configured")),
        }
    }

    pub(crate) fn make_url<P>(&self, path: P) -> Url
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        let mut new_url = self.base_url.clone();

        // always Ok, since the builder rejects cannot-be-a-base urls
        if let Ok(mut segments) = new_url.path_segments_mut() {
            segments.pop_if_empty().extend(path);
        }

        new_url
    }

    #[inline]
    pub(crate) async fn request(
        &self,
        method: reqwest::Method,
        url: impl IntoUrl,
    ) -> Result<reqwest::RequestBuilder, Error> {
        let header = self.get_auth_header().await?;

        let builder = self
            .client
            .request(method, url)
            .header(http::header::AUTHORIZATION, header);

        Ok(builder)
    }

    #[inline]
    pub(crate) async fn get<Q>(&self, url: impl IntoUrl, query: &Q) -> Result<Response, Error>
    where
        Q: serde::Serialize + ?Sized,
    {
        let resp = self
            .request(reqwest::Method::GET, url)
            .await?
            .query(query)
            .send()
            .await?;

        if !resp.status().is_success() {
            Err(handle_error(resp).await)
        } else {
            Ok(resp)
        }
    }

    #[inline]
    pub(crate) async fn post<S>(&self, url: impl IntoUrl, payload: &S) -> Result<Response, Error>
    where
        S: serde::Serialize + ?Sized,
    {
        let resp = self
            .request(reqwest::Method::POST, url)
            .await?
            .json(payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            Err(handle_error(resp).await)
        } else {
            Ok(resp)
        }
    }
}

/// The shapes a non-success body can take.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Envelope { error: ErrorEnvelope },
    Errors { errors: Vec<ErrorProto> },
    Single(ErrorProto),
    Many(Vec<ErrorProto>),
}

#[derive(serde::Deserialize)]
struct ErrorEnvelope {
    message: Box<str>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

impl ErrorBody {
    fn into_error_protos(self) -> Vec<ErrorProto> {
        match self {
            Self::Envelope { error } if error.errors.is_empty() => {
                vec![ErrorProto::new(error.message)]
            }
            Self::Envelope { error } => error.errors,
            Self::Errors { errors } | Self::Many(errors) => errors,
            Self::Single(error) => vec![error],
        }
    }
}

pub(crate) async fn handle_error(response: reqwest::Response) -> crate::Error {
    let status = response.status();
    let text = match response.text().await {
        Ok(text) => text,
        Err(error) => return error.into(),
    };

    parse_error_body(status, text)
}

fn parse_error_body(status: http::StatusCode, text: String) -> crate::Error {
    let trimmed = text.trim_start();

    if trimmed.starts_with(['{', '[']) {
        match serde_json::from_str::<ErrorBody>(trimmed) {
            Ok(body) => return Error::from_error_protos(status, body.into_error_protos()),
            // if we failed to deserialize the json, log it
            Err(error) => warn!(
                message = "failed to deserialize error json, falling back to raw text",
                ?error
            ),
        }
    }

    Error::from_error_protos(status, vec![ErrorProto::new(text.into_boxed_str())])
}

pub(crate) async fn deserialize_json<T>(response: reqwest::Response) -> crate::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(crate::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_of(error: &Error) -> &str {
        error
            .error_proto()
            .map(|proto| &*proto.message)
            .unwrap_or_default()
    }

    #[test]
    fn test_parse_error_envelope() {
        const BODY: &str = r#"{
            "error": {
                "code": 404,
                "message": "Not found: Table winter_test00:bq_test.missing",
                "errors": [
                    {
                        "message": "Not found: Table winter_test00:bq_test.missing",
                        "domain": "global",
                        "reason": "notFound"
                    }
                ],
                "status": "NOT_FOUND"
            }
        }"#;

        let error = parse_error_body(http::StatusCode::NOT_FOUND, BODY.to_owned());

        assert!(error.is_not_found());
        assert_eq!(
            message_of(&error),
            "Not found: Table winter_test00:bq_test.missing"
        );
    }

    #[test]
    fn test_parse_error_variants() {
        let errors = parse_error_body(
            http::StatusCode::BAD_REQUEST,
            r#"{"errors": [{"reason": "invalid", "message": "first"}, {"message": "second"}]}"#
                .to_owned(),
        );
        assert_eq!(message_of(&errors), "first");

        let single = parse_error_body(
            http::StatusCode::BAD_REQUEST,
            r#"{"reason": "invalidQuery", "message": "Syntax error"}"#.to_owned(),
        );
        assert_eq!(message_of(&single), "Syntax error");

        let bare = parse_error_body(
            http::StatusCode::INTERNAL_SERVER_ERROR,
            "upstream connect error".to_owned(),
        );
        assert_eq!(message_of(&bare), "upstream connect error");

        let malformed = parse_error_body(
            http::StatusCode::BAD_GATEWAY,
            r#"{"unexpected": true}"#.to_owned(),
        );
        assert_eq!(message_of(&malformed), r#"{"unexpected": true}"#);
    }

    #[test]
    fn test_make_url() -> crate::Result<()> {
        let client = BigQueryClient::builder()
            .base_url("http://localhost:9050/bigquery/v2/")
            .build()?;

        let url = client
            .inner
            .make_url(["projects", "winter_test00", "queries", "job_abc"]);

        assert_eq!(
            url.as_str(),
            "http://localhost:9050/bigquery/v2/projects/winter_test00/queries/job_abc"
        );

        let default = BigQueryClient::builder().build()?;
        assert_eq!(
            default.inner.make_url(["projects", "p"]).as_str(),
            "https://bigquery.googleapis.com/bigquery/v2/projects/p"
        );

        Ok(())
    }

    #[test]
    fn test_invalid_base_url() {
        let result = BigQueryClient::builder().base_url("not a url").build();
        assert!(matches!(result, Err(Error::InvalidUrl(_))));

        let result = BigQueryClient::builder().base_url("mailto:someone@example.com").build();
        assert!(matches!(result, Err(Error::NotInitialized(_))));
    }

    #[tokio::test]
    async fn test_no_credentials() -> crate::Result<()> {
        let client = BigQueryClient::builder().build()?;

        let result = client
            .inner
            .request(reqwest::Method::GET, client.inner.make_url(["projects"]))
            .await;

        assert!(matches!(result, Err(Error::NotInitialized(_))));
        Ok(())
    }
}
