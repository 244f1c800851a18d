// POST /tmpl handler
//
// Reads a template file, substitutes the job's variables into it and writes
// the result to the requested destination.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

use super::tmpl_types::{ErrorBody, ErrorKind, TmplRequest, WireError};
use super::ControlServer;
use crate::interpolate::InterpolateError;

/// Every way a /tmpl request can fail, one variant per step
#[derive(Error, Debug)]
pub enum TmplError {
    #[error("unable to read request body: {0}")]
    ReadBody(String),

    #[error("invalid request body: {0}")]
    Decode(String),

    #[error("unable to read {}: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to interpolate {}: {source}", path.display())]
    Substitution {
        path: PathBuf,
        #[source]
        source: InterpolateError,
    },

    #[error("unable to write {}: {source}", path.display())]
    DestinationWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TmplError {
    /// Step that failed, as reported in the `cause` field
    pub fn cause(&self) -> &'static str {
        match self {
            TmplError::ReadBody(_) => "read_body",
            TmplError::Decode(_) => "decode",
            TmplError::SourceRead { .. } => "source_read",
            TmplError::Substitution { .. } => "substitution",
            TmplError::DestinationWrite { .. } => "destination_write",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TmplError::DestinationWrite { .. } => ErrorKind::InternalError,
            _ => ErrorKind::WrongRequest,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::WrongRequest => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_wire(&self) -> WireError {
        WireError {
            kind: self.kind(),
            message: self.to_string(),
            cause: Some(self.cause().to_string()),
        }
    }
}

impl IntoResponse for TmplError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self.kind() {
            ErrorKind::WrongRequest => {
                warn!(cause = self.cause(), error = %self, "tmpl request rejected")
            }
            _ => error!(cause = self.cause(), error = %self, "tmpl request failed"),
        }

        (status, Json(ErrorBody { error: self.to_wire() })).into_response()
    }
}

/// Handle POST /tmpl
pub async fn handle_tmpl(
    State(server): State<Arc<ControlServer>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<StatusCode, TmplError> {
    let body = body.map_err(|e| TmplError::ReadBody(e.body_text()))?;

    let request: TmplRequest =
        serde_json::from_slice(&body).map_err(|e| TmplError::Decode(e.to_string()))?;
    if let Some(field) = request.missing_field() {
        return Err(TmplError::Decode(format!("field `{}` must not be empty", field)));
    }

    let source = PathBuf::from(&request.path);
    let destination = PathBuf::from(&request.destination);
    debug!(source = %source.display(), destination = %destination.display(), "tmpl request");

    let template = tokio::fs::read(&source)
        .await
        .map_err(|e| TmplError::SourceRead {
            path: source.clone(),
            source: e,
        })?;

    let vars = server.job().variable_mapping();

    let rendered = server
        .interpolator()
        .interpolate(&template, &vars)
        .map_err(|e| {
            error!(source = %source.display(), error = %e, "Unable to interpolate");
            TmplError::Substitution {
                path: source.clone(),
                source: e,
            }
        })?;

    write_destination(&destination, &rendered)
        .await
        .map_err(|e| TmplError::DestinationWrite {
            path: destination.clone(),
            source: e,
        })?;

    debug!(
        destination = %destination.display(),
        bytes = rendered.len(),
        "tmpl written"
    );
    Ok(StatusCode::OK)
}

/// Create or truncate `path` (mode 0644 on unix) and write `contents`
async fn write_destination(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o644);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.flush().await
}
