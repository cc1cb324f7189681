//! Service account credentials and the bearer header they produce.
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use gcp_auth::{CustomServiceAccount, TokenProvider};
use http::HeaderValue;
use tokio::sync::OnceCell;

pub(crate) const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

const TOKEN_URI: &str = "https://accounts.google.com/o/oauth2/token";

/// Reads a PEM encoded private key from disk, for use with [`Credentials::new`].
pub async fn read_private_key_pem(path: impl AsRef<Path>) -> crate::Result<String> {
    tokio::fs::read_to_string(path).await.map_err(crate::Error::from)
}

/// A service account identity: an email plus its PEM private key, optionally
/// impersonating `subject` through domain-wide delegation.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    email: Box<str>,
    private_key: Box<str>,
    subject: Option<Box<str>>,
}

impl Credentials {
    pub fn new(email: impl Into<Box<str>>, private_key: impl Into<Box<str>>) -> Self {
        Self {
            email: email.into(),
            private_key: private_key.into(),
            subject: None,
        }
    }

    /// An empty subject is the same as no subject.
    pub fn with_subject(mut self, subject: impl Into<Box<str>>) -> Self {
        let subject = subject.into();
        self.subject = (!subject.is_empty()).then_some(subject);
        self
    }

    #[inline]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[inline]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    fn build_provider(&self) -> Result<CustomServiceAccount, gcp_auth::Error> {
        let key = serde_json::json!({
            "type": "service_account",
            "client_email": &*self.email,
            "private_key": &*self.private_key,
            "token_uri": TOKEN_URI,
        });

        let account = CustomServiceAccount::from_json(&key.to_string())?;

        Ok(match self.subject {
            Some(ref subject) => account.with_subject(subject.to_string()),
            None => account,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

enum Source {
    ServiceAccount(Credentials),
    Detect,
}

/// Lazily resolved token provider. Nothing is parsed or fetched until the
/// first header is requested, so a bad key only fails the first round trip.
#[derive(Clone)]
pub struct Auth {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    source: Source,
    provider: OnceCell<Arc<dyn TokenProvider>>,
}

impl Auth {
    fn from_source(source: Source) -> Self {
        Self {
            inner: Arc::new(AuthInner {
                source,
                provider: OnceCell::new(),
            }),
        }
    }

    pub fn from_credentials(credentials: Credentials) -> Self {
        Self::from_source(Source::ServiceAccount(credentials))
    }

    /// Uses whatever [`gcp_auth::provider`] finds in the environment.
    pub fn detect() -> Self {
        Self::from_source(Source::Detect)
    }

    async fn provider(&self) -> Result<&Arc<dyn TokenProvider>, gcp_auth::Error> {
        self.inner
            .provider
            .get_or_try_init(|| async {
                match self.inner.source {
                    Source::ServiceAccount(ref credentials) => credentials
                        .build_provider()
                        .map(|account| Arc::new(account) as Arc<dyn TokenProvider>),
                    Source::Detect => gcp_auth::provider().await,
                }
            })
            .await
    }

    pub async fn get_header(&self) -> crate::Result<HeaderValue> {
        let token = self.provider().await?.token(&[BIGQUERY_SCOPE]).await?;
        trace!(message = "got token", expires_at = ?token.expires_at());
        build_header(token.as_str()).map_err(crate::Error::from)
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.inner.source {
            Source::ServiceAccount(ref credentials) => credentials.email(),
            Source::Detect => "<detected>",
        };

        f.debug_struct("Auth")
            .field("source", &source)
            .field("initialized", &self.inner.provider.initialized())
            .finish()
    }
}

fn build_header(token: &str) -> Result<HeaderValue, http::header::InvalidHeaderValue> {
    const BEARER_PREFIX: &str = "Bearer ";
    let mut dst = bytes::BytesMut::with_capacity(BEARER_PREFIX.len() + token.len());

    dst.extend_from_slice(BEARER_PREFIX.as_bytes());
    dst.extend_from_slice(token.as_bytes());

    let mut header = HeaderValue::from_maybe_shared(dst.freeze())?;
    header.set_sensitive(true);
    Ok(header)
}
