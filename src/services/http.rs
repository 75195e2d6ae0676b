// Shared HTTP plumbing for cloud and inference backends

use std::time::Duration;
use tracing::{debug, warn};

/// Retry configuration
const MAX_RETRIES: u32 = 3;
const INITIAL_RETRY_DELAY_MS: u64 = 1000;
const MAX_RETRY_DELAY_MS: u64 = 10_000;

/// Build the HTTP client shared by a backend instance: request timeout,
/// connection pooling, separate connect timeout. Panics never; falls back to
/// the default client if the builder rejects the configuration.
pub fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_default()
}

/// POST a JSON body, retrying transient failures (connect errors, timeouts,
/// 429 and 5xx) with exponential backoff. Returns the response body text of
/// the first 2xx response.
pub async fn post_json_with_retries(
    client: &reqwest::Client,
    url: &str,
    body: &serde_json::Value,
    headers: &[(&str, &str)],
) -> Result<String, reqwest::Error> {
    let mut delay = INITIAL_RETRY_DELAY_MS;
    let mut last_error: Option<reqwest::Error> = None;

    for attempt in 0..=MAX_RETRIES {
        if attempt > 0 {
            debug!(url, attempt, "retrying request after {}ms", delay);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            delay = (delay * 2).min(MAX_RETRY_DELAY_MS);
        }

        let mut request = client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response.text().await;
                }
                let retryable = status.as_u16() == 429 || status.is_server_error();
                warn!(url, %status, retryable, "request failed");
                match response.error_for_status() {
                    Err(err) if retryable => last_error = Some(err),
                    Err(err) => return Err(err),
                    // Non-error non-success (unfollowed redirect): surface the body
                    Ok(response) => return response.text().await,
                }
            }
            Err(err) => {
                let retryable = err.is_connect() || err.is_timeout() || err.is_request();
                warn!(url, error = %err, retryable, "request error");
                if !retryable {
                    return Err(err);
                }
                last_error = Some(err);
            }
        }
    }

    // MAX_RETRIES > 0, so at least one error was recorded
    Err(last_error.expect("retry loop exited without an error"))
}
