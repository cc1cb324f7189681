use bq_query_resources_rs::table_data::InsertErrors;
use bq_query_resources_rs::{DecodeError, ErrorProto};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("client not initialized: {0}")]
    NotInitialized(&'static str),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Auth(#[from] gcp_auth::Error),
    #[error("invalid base url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),
    #[error("service returned {status}: {main}")]
    Service {
        status: http::StatusCode,
        main: ErrorProto,
        misc: Vec<ErrorProto>,
    },
    #[error("job failed: {main}")]
    Job {
        main: ErrorProto,
        misc: Vec<ErrorProto>,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("{} row(s) rejected by the service", .0.len())]
    InsertFailure(Vec<InsertErrors>),
    #[error("response has no job reference, can't fetch any further pages")]
    MissingJobReference,
    #[error("job completed with {delivered} of {total} rows delivered, but no way to fetch the rest")]
    IncompleteResults { delivered: u64, total: u64 },
    #[error("query cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("internal error")]
    Internal,
}

impl Error {
    pub(crate) fn from_error_protos(status: http::StatusCode, mut errors: Vec<ErrorProto>) -> Self {
        let main = if errors.is_empty() {
            ErrorProto::new("no error information given".into())
        } else {
            errors.remove(0)
        };

        Self::Service {
            status,
            main,
            misc: errors,
        }
    }

    /// The service error behind this, if any.
    pub fn error_proto(&self) -> Option<&ErrorProto> {
        match self {
            Self::Service { main, .. } | Self::Job { main, .. } => Some(main),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Service { status, main, .. } => {
                *status == http::StatusCode::NOT_FOUND || main.is_not_found()
            }
            _ => false,
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(error: tokio::task::JoinError) -> Self {
        error!("internal task error: {error}");
        Self::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_error_protos() {
        let error = Error::from_error_protos(http::StatusCode::BAD_REQUEST, vec![
            ErrorProto {
                reason: Some("invalidQuery".into()),
                location: Some("query".into()),
                debug_info: None,
                message: "Syntax error".into(),
            },
            ErrorProto::new("second".into()),
        ]);

        assert_eq!(
            error.to_string(),
            "service returned 400 Bad Request: Syntax error: invalidQuery"
        );
        assert!(!error.is_not_found());

        match error {
            Error::Service { misc, .. } => assert_eq!(misc.len(), 1),
            other => panic!("expected a service error, got {other:?}"),
        }

        let empty = Error::from_error_protos(http::StatusCode::NOT_FOUND, Vec::new());
        assert!(empty.is_not_found());
        assert_eq!(
            empty.error_proto().map(|proto| &*proto.message),
            Some("no error information given")
        );
    }
}
