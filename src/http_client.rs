use crate::error::ValidationError;
use crate::getter::Getter;
use async_trait::async_trait;
use reqwest::header::RANGE;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Configuration for the HTTP byte-range getter
#[derive(Debug, Clone, PartialEq)]
pub struct HttpGetterConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of retry attempts
    pub retry_attempts: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds (for exponential backoff cap)
    pub max_retry_delay_ms: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpGetterConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 30000,
            user_agent: format!("copc-validator/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Reads byte ranges of a remote file with HTTP `Range` requests
pub struct HttpGetter {
    url: String,
    client: Client,
    config: HttpGetterConfig,
}

impl HttpGetter {
    /// Create a new getter for `url` with the given configuration
    pub fn new(url: &str, config: HttpGetterConfig) -> Result<Self, ValidationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .build()
            .map_err(ValidationError::from)?;

        Ok(Self {
            url: url.to_string(),
            client,
            config,
        })
    }

    /// Get response with retry logic
    async fn get_response_with_retry(
        &self,
        begin: u64,
        end: u64,
    ) -> Result<Response, ValidationError> {
        let mut current_attempt = 0;

        loop {
            match self.make_request(begin, end).await {
                Ok(response) => {
                    if response.status().is_success() {
                        return Ok(response);
                    }

                    let status = response.status();
                    let error = ValidationError::HttpStatus {
                        url: self.url.clone(),
                        status: status.as_u16(),
                        message: format!(
                            "HTTP {}: {}",
                            status.as_u16(),
                            status.canonical_reason().unwrap_or("Unknown")
                        ),
                    };

                    // Retry on server errors (5xx) but not client errors (4xx)
                    if status.is_server_error() && current_attempt < self.config.retry_attempts {
                        self.wait_before_retry(current_attempt).await;
                        current_attempt += 1;
                        continue;
                    }

                    return Err(error);
                }
                Err(error) => {
                    if current_attempt < self.config.retry_attempts
                        && self.is_retryable_error(&error)
                    {
                        self.wait_before_retry(current_attempt).await;
                        current_attempt += 1;
                        continue;
                    }
                    return Err(error);
                }
            }
        }
    }

    /// Make a single ranged request with timeout
    async fn make_request(&self, begin: u64, end: u64) -> Result<Response, ValidationError> {
        let request_future = self
            .client
            .get(&self.url)
            .header(RANGE, range_header(begin, end))
            .send();

        timeout(
            Duration::from_secs(self.config.timeout_seconds),
            request_future,
        )
        .await
        .map_err(|_| ValidationError::Timeout {
            url: self.url.clone(),
            timeout_seconds: self.config.timeout_seconds,
        })?
        .map_err(ValidationError::from)
    }

    /// Wait before retry with exponential backoff
    async fn wait_before_retry(&self, attempt: u32) {
        sleep(backoff_delay(&self.config, attempt)).await;
    }

    /// Check if an error is retryable
    fn is_retryable_error(&self, error: &ValidationError) -> bool {
        match error {
            ValidationError::Http(reqwest_error) => {
                reqwest_error.is_timeout() || reqwest_error.is_connect() || reqwest_error.is_request()
            }
            ValidationError::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Get the getter configuration
    pub fn config(&self) -> &HttpGetterConfig {
        &self.config
    }
}

#[async_trait]
impl Getter for HttpGetter {
    async fn get(&self, begin: u64, end: u64) -> Result<Vec<u8>, ValidationError> {
        if begin == end {
            return Ok(Vec::new());
        }

        let response = self.get_response_with_retry(begin, end).await?;
        let status = response.status();
        let body = response.bytes().await.map_err(ValidationError::from)?;

        slice_body(&self.url, status, &body, begin, end)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

fn range_header(begin: u64, end: u64) -> String {
    format!("bytes={}-{}", begin, end - 1)
}

fn backoff_delay(config: &HttpGetterConfig, attempt: u32) -> Duration {
    let delay_ms = config.retry_delay_ms.saturating_mul(2_u64.saturating_pow(attempt));
    Duration::from_millis(delay_ms.min(config.max_retry_delay_ms))
}

/// Servers that ignore `Range` answer 200 with the whole file; slice it.
fn slice_body(
    url: &str,
    status: StatusCode,
    body: &[u8],
    begin: u64,
    end: u64,
) -> Result<Vec<u8>, ValidationError> {
    let wanted = (end - begin) as usize;
    let bytes = if status == StatusCode::PARTIAL_CONTENT {
        body
    } else {
        let start = (begin as usize).min(body.len());
        &body[start..]
    };

    if bytes.len() < wanted {
        let length = if status == StatusCode::PARTIAL_CONTENT {
            begin + bytes.len() as u64
        } else {
            body.len() as u64
        };
        return Err(ValidationError::OutOfRange {
            source_name: url.to_string(),
            begin,
            end,
            length,
        });
    }

    Ok(bytes[..wanted].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_getter_creation() {
        let getter = HttpGetter::new("https://example.com/a.copc.laz", HttpGetterConfig::default());
        assert!(getter.is_ok());
        assert_eq!(getter.unwrap().describe(), "https://example.com/a.copc.laz");
    }

    #[test]
    fn test_range_header_is_inclusive() {
        assert_eq!(range_header(0, 375), "bytes=0-374");
        assert_eq!(range_header(589, 621), "bytes=589-620");
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let config = HttpGetterConfig {
            retry_delay_ms: 1000,
            max_retry_delay_ms: 10000,
            ..Default::default()
        };

        assert_eq!(backoff_delay(&config, 0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&config, 1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(&config, 2), Duration::from_millis(4000));
        assert_eq!(backoff_delay(&config, 5), Duration::from_millis(10000));
    }

    #[test]
    fn test_retryable_error_detection() {
        let getter =
            HttpGetter::new("http://example.com/a.laz", HttpGetterConfig::default()).unwrap();

        let timeout_error = ValidationError::Timeout {
            url: "http://example.com".to_string(),
            timeout_seconds: 30,
        };
        assert!(getter.is_retryable_error(&timeout_error));

        let range_error = ValidationError::OutOfRange {
            source_name: "http://example.com".to_string(),
            begin: 0,
            end: 10,
            length: 5,
        };
        assert!(!getter.is_retryable_error(&range_error));
    }

    #[test]
    fn test_slice_partial_content() {
        let body = [1u8, 2, 3, 4];
        let bytes = slice_body("u", StatusCode::PARTIAL_CONTENT, &body, 10, 14).unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_slice_full_body_when_range_ignored() {
        let body: Vec<u8> = (0u8..20).collect();
        let bytes = slice_body("u", StatusCode::OK, &body, 5, 8).unwrap();
        assert_eq!(bytes, vec![5, 6, 7]);
    }

    #[test]
    fn test_slice_short_body_is_out_of_range() {
        let body = [0u8; 100];
        let error = slice_body("u", StatusCode::OK, &body, 0, 375).unwrap_err();
        assert!(matches!(
            error,
            ValidationError::OutOfRange { length: 100, .. }
        ));
    }
}
