use anyhow::anyhow;
use reqwest::StatusCode;
use std::error::Error as StdError;
use std::io::ErrorKind;

/// Walks the source chain looking for an io error of `kind`, or a message
/// containing `needle` for transports that only stringify the cause.
fn error_chain_matches(err: &(dyn StdError + 'static), kind: ErrorKind, needle: &str) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == kind
        {
            return true;
        }

        if source.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }

        current = source.source();
    }

    false
}

fn error_chain_has_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    error_chain_matches(err, ErrorKind::ConnectionRefused, "connection refused")
}

fn error_chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    error_chain_matches(err, ErrorKind::TimedOut, "timed out")
}

pub(crate) fn completion_request_error(
    err: reqwest::Error,
    api_url: &str,
    timeout_secs: u64,
) -> anyhow::Error {
    if err.is_timeout() || error_chain_has_timeout(&err) {
        return anyhow!(
            "Completion request timed out after {}s while calling '{}'. \
             Increase MODEL_TIMEOUT_SECS or check the API status.",
            timeout_secs,
            api_url
        );
    }

    if err.is_connect() {
        if error_chain_has_connection_refused(&err) {
            return anyhow!(
                "Connection refused by completion API at '{}'. \
                 Ensure the endpoint is reachable and MODEL_BASE_URL is correct.",
                api_url
            );
        }

        return anyhow!(
            "Failed to connect to completion API at '{}'. \
             Check MODEL_BASE_URL and network connectivity.",
            api_url
        );
    }

    anyhow!("Failed to call completion API at '{}': {}", api_url, err)
}

pub(crate) fn completion_status_error(status: StatusCode, body: &str) -> anyhow::Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => anyhow!(
            "Completion request failed with status {}: {}. Check OPENAI_API_KEY.",
            status,
            body
        ),
        _ => anyhow!("Completion request failed with status {}: {}", status, body),
    }
}

#[cfg(test)]
mod tests {
    use super::{completion_request_error, completion_status_error, error_chain_has_timeout};
    use reqwest::{Client, StatusCode};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    fn free_local_addr() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("address should be available");
        drop(listener);
        addr
    }

    #[tokio::test]
    async fn maps_connection_refused_errors_to_actionable_message() {
        let addr = free_local_addr();
        let api_url = format!("http://{}/v1/chat/completions", addr);
        let client = Client::builder()
            .timeout(Duration::from_millis(300))
            .build()
            .expect("client should build");

        let req_err = client
            .post(&api_url)
            .send()
            .await
            .expect_err("request should fail with connection-refused");
        let mapped = completion_request_error(req_err, &api_url, 1);
        let msg = format!("{mapped:#}");

        assert!(
            msg.contains("Connection refused by completion API"),
            "unexpected message: {msg}"
        );
        assert!(msg.contains("MODEL_BASE_URL"), "unexpected message: {msg}");
    }

    #[tokio::test]
    async fn maps_timeout_errors_to_actionable_message() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("address should be available");
        let server = thread::spawn(move || {
            let (_stream, _) = listener.accept().expect("accept should succeed");
            thread::sleep(Duration::from_secs(1));
        });

        let api_url = format!("http://{}/v1/chat/completions", addr);
        let client = Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("client should build");

        let req_err = client
            .post(&api_url)
            .send()
            .await
            .expect_err("request should fail with timeout");
        let mapped = completion_request_error(req_err, &api_url, 2);
        let msg = format!("{mapped:#}");

        assert!(
            msg.contains("Completion request timed out after 2s"),
            "unexpected message: {msg}"
        );
        assert!(
            msg.contains("MODEL_TIMEOUT_SECS"),
            "unexpected message: {msg}"
        );

        server.join().expect("server thread should join");
    }

    #[test]
    fn detects_timeout_from_error_kind() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline");
        assert!(error_chain_has_timeout(&err));
    }

    #[test]
    fn auth_failures_point_at_the_api_key() {
        let msg = completion_status_error(StatusCode::UNAUTHORIZED, "bad key").to_string();
        assert!(msg.contains("401"), "unexpected message: {msg}");
        assert!(msg.contains("OPENAI_API_KEY"), "unexpected message: {msg}");

        let msg = completion_status_error(StatusCode::BAD_GATEWAY, "upstream").to_string();
        assert!(!msg.contains("OPENAI_API_KEY"), "unexpected message: {msg}");
        assert!(msg.contains("upstream"), "unexpected message: {msg}");
    }
}
