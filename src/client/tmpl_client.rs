// Client for the /tmpl control endpoint

use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::ClientConfig;
use crate::server::tmpl_types::{ErrorBody, TmplRequest, WireError};

/// Failures of a `worker tmpl` invocation. Each one ends the command.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{var} not found, are you running inside a worker job?")]
    PortNotSet { var: String },

    #[error("cannot parse '{value}' as a port number")]
    InvalidPort { value: String },

    #[error("cannot build tmpl request: {0}")]
    Request(reqwest::Error),

    #[error("tmpl call failed: {0}")]
    Transport(reqwest::Error),

    #[error("tmpl failed: {0}")]
    Remote(WireError),

    #[error("tmpl failed: unable to read/decode response body (status {status}): {detail}")]
    UndecodableResponse { status: u16, detail: String },
}

/// Resolve the control port from the value of `var`.
///
/// `value` is the raw environment value, `None` when unset.
pub fn resolve_port(var: &str, value: Option<String>) -> Result<u16, ClientError> {
    let value = value.ok_or_else(|| ClientError::PortNotSet {
        var: var.to_string(),
    })?;

    match value.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ClientError::InvalidPort { value }),
    }
}

/// HTTP client bound to the local control server
pub struct TmplClient {
    base_url: String,
    client: Client,
}

impl TmplClient {
    pub fn new(port: u16, timeout: Duration) -> Result<Self, ClientError> {
        // Any status >= 300 is a failure, so redirects are never followed
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(ClientError::Request)?;

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            client,
        })
    }

    /// POST the request to /tmpl. Single attempt, no retry.
    pub async fn tmpl(&self, request: &TmplRequest) -> Result<(), ClientError> {
        let url = format!("{}/tmpl", self.base_url);
        debug!(url = %url, path = %request.path, destination = %request.destination, "Sending tmpl request");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    return ClientError::Request(e);
                }
                // The command prints the error itself; only detail goes to the log
                if e.is_timeout() {
                    debug!(error = %e, "tmpl request timed out");
                } else if e.is_connect() {
                    debug!(error = %e, "Could not connect to worker control server");
                } else {
                    debug!(error = %e, "tmpl request failed");
                }
                ClientError::Transport(e)
            })?;

        let status = response.status();
        if status.as_u16() < 300 {
            return Ok(());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::UndecodableResponse {
                status: status.as_u16(),
                detail: e.to_string(),
            })?;

        let decoded: ErrorBody =
            serde_json::from_slice(&body).map_err(|e| ClientError::UndecodableResponse {
                status: status.as_u16(),
                detail: e.to_string(),
            })?;

        Err(ClientError::Remote(decoded.error))
    }
}

/// Run `worker tmpl <source> <destination>` against the control server
/// named by the environment.
pub async fn run_tmpl(
    config: &ClientConfig,
    source: &str,
    destination: &str,
) -> Result<(), ClientError> {
    let raw = std::env::var_os(&config.port_env_var).map(|v| v.to_string_lossy().into_owned());
    let port = resolve_port(&config.port_env_var, raw)?;

    let client = TmplClient::new(port, Duration::from_secs(config.timeout_seconds))?;
    client.tmpl(&TmplRequest::new(source, destination)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::tmpl_types::ErrorKind;
    use mockito::Matcher;

    fn port_of(server: &mockito::ServerGuard) -> u16 {
        server
            .host_with_port()
            .rsplit(':')
            .next()
            .unwrap()
            .parse()
            .unwrap()
    }

    #[test]
    fn test_resolve_port() {
        assert_eq!(resolve_port("P", Some("8080".to_string())).unwrap(), 8080);

        assert!(matches!(
            resolve_port("P", None),
            Err(ClientError::PortNotSet { .. })
        ));
        assert!(matches!(
            resolve_port("P", Some("abc".to_string())),
            Err(ClientError::InvalidPort { .. })
        ));
        assert!(matches!(
            resolve_port("P", Some("0".to_string())),
            Err(ClientError::InvalidPort { .. })
        ));
        assert!(matches!(
            resolve_port("P", Some("70000".to_string())),
            Err(ClientError::InvalidPort { .. })
        ));
        assert!(matches!(
            resolve_port("P", Some(String::new())),
            Err(ClientError::InvalidPort { .. })
        ));
    }

    #[test]
    fn test_port_not_set_message_names_variable() {
        let err = resolve_port("WORKER_SERVER_PORT", None).unwrap_err();
        assert!(err.to_string().starts_with("WORKER_SERVER_PORT not found"));
    }

    #[tokio::test]
    async fn test_success_sends_expected_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/tmpl")
            .match_body(Matcher::Json(serde_json::json!({
                "path": "in.txt",
                "destination": "out.txt"
            })))
            .with_status(200)
            .create_async()
            .await;

        let client = TmplClient::new(port_of(&server), Duration::from_secs(5)).unwrap();
        client
            .tmpl(&TmplRequest::new("in.txt", "out.txt"))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_structured_error_is_decoded() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/tmpl")
            .with_status(400)
            .with_body(
                r#"{"error": {"kind": "wrong_request", "message": "unable to read in.txt: No such file", "cause": "source_read"}}"#,
            )
            .create_async()
            .await;

        let client = TmplClient::new(port_of(&server), Duration::from_secs(5)).unwrap();
        let err = client
            .tmpl(&TmplRequest::new("in.txt", "out.txt"))
            .await
            .unwrap_err();

        match &err {
            ClientError::Remote(wire) => assert_eq!(wire.kind, ErrorKind::WrongRequest),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().contains("unable to read in.txt"));
    }

    #[tokio::test]
    async fn test_undecodable_error_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/tmpl")
            .with_status(502)
            .with_body("<html>bad gateway</html>")
            .create_async()
            .await;

        let client = TmplClient::new(port_of(&server), Duration::from_secs(5)).unwrap();
        let err = client
            .tmpl(&TmplRequest::new("a", "b"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::UndecodableResponse { status: 502, .. }
        ));
        assert!(err.to_string().contains("unable to read/decode"));
    }

    #[tokio::test]
    async fn test_redirect_status_is_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/tmpl")
            .with_status(304)
            .create_async()
            .await;

        let client = TmplClient::new(port_of(&server), Duration::from_secs(5)).unwrap();
        let err = client.tmpl(&TmplRequest::new("a", "b")).await.unwrap_err();
        assert!(matches!(err, ClientError::UndecodableResponse { status: 304, .. }));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Grab a free port, then release it
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let client = TmplClient::new(port, Duration::from_secs(5)).unwrap();
        let err = client.tmpl(&TmplRequest::new("a", "b")).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert!(err.to_string().starts_with("tmpl call failed"));
    }

    #[tokio::test]
    async fn test_run_tmpl_without_port_env() {
        let config = ClientConfig {
            port_env_var: "JOBWORKER_TEST_PORT_THAT_IS_NEVER_SET".to_string(),
            ..ClientConfig::default()
        };

        let err = run_tmpl(&config, "a", "b").await.unwrap_err();
        assert!(matches!(err, ClientError::PortNotSet { .. }));
    }
}
