//! reqwest-backed [`Transport`] for API statements and tools.

use async_trait::async_trait;
use futures::StreamExt;
use splforge_core::error::TransportError;
use splforge_core::transport::{FragmentStream, HttpMethod, Transport, TransportRequest};
use std::time::Duration;
use tracing::{debug, trace};

use crate::sse::{classify, LineBuffer, SseLine};

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }

    fn network_error(e: reqwest::Error) -> TransportError {
        TransportError::Network(e.to_string())
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

/// Object entries rendered as query pairs. Strings are sent unquoted.
pub(crate) fn query_pairs(body: &serde_json::Value) -> Result<Vec<(String, String)>, TransportError> {
    match body {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()),
        other => Err(TransportError::InvalidRequest(format!(
            "GET parameters must be a JSON object, got {other}"
        ))),
    }
}

/// A body that is not JSON is kept as a string fragment.
pub(crate) fn parse_fragment(text: &str) -> serde_json::Value {
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<FragmentStream, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url).query(&query_pairs(&request.body)?),
            HttpMethod::Post => self.client.post(&request.url).json(&request.body),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if request.stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        debug!(url = %request.url, method = ?request.method, stream = request.stream, "Sending API request");

        let response = builder.send().await.map_err(Self::network_error)?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                url: request.url,
                status_code: status.as_u16(),
                message,
            });
        }

        if !request.stream {
            let text = response.text().await.map_err(Self::network_error)?;
            let (tx, rx) = tokio::sync::mpsc::channel(1);
            let _ = tx.send(Ok(parse_fragment(&text))).await;
            return Ok(rx);
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let url = request.url;
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = LineBuffer::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(TransportError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };
                lines.push(&bytes);

                while let Some(line) = lines.next_line() {
                    let payload = match classify(&line) {
                        SseLine::Done => return,
                        SseLine::Skip => continue,
                        SseLine::Data(data) | SseLine::Raw(data) => data,
                    };
                    trace!(url = %url, fragment = %payload, "API stream fragment");
                    if tx.send(Ok(parse_fragment(payload))).await.is_err() {
                        debug!(url = %url, "API stream receiver dropped");
                        return;
                    }
                }
            }

            // A final line without a trailing newline.
            if let Some(rest) = lines.remainder() {
                if let SseLine::Data(data) | SseLine::Raw(data) = classify(&rest) {
                    let _ = tx.send(Ok(parse_fragment(data))).await;
                }
            }
        });

        Ok(rx)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = self.client.get(url).send().await.map_err(Self::network_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status_code: status.as_u16(),
                message: "download failed".into(),
            });
        }
        let bytes = response.bytes().await.map_err(Self::network_error)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_pairs_unquote_strings() {
        let pairs = query_pairs(&json!({"city": "Paris", "days": 3})).unwrap();
        assert!(pairs.contains(&("city".into(), "Paris".into())));
        assert!(pairs.contains(&("days".into(), "3".into())));
    }

    #[test]
    fn query_pairs_reject_non_objects() {
        assert!(matches!(
            query_pairs(&json!(["a"])),
            Err(TransportError::InvalidRequest(_))
        ));
        assert!(query_pairs(&serde_json::Value::Null).unwrap().is_empty());
    }

    #[test]
    fn fragments_fall_back_to_strings() {
        assert_eq!(parse_fragment(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(parse_fragment("plain text"), json!("plain text"));
    }
}
