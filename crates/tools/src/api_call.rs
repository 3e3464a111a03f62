//! API invocation: request building, parse-path extraction, blob persistence.
//!
//! Used both by API statements and by catalog-derived tools. The caller
//! resolves parameter references in the input before handing it over.

use base64::Engine;
use serde_json::{Map, Value};
use splforge_core::catalog::{apply_parse_path, ApiSpec, PathSegment};
use splforge_core::error::{BlobError, TransportError};
use splforge_core::transport::{FragmentStream, HttpMethod, Transport, TransportRequest};
use splforge_core::{BlobStore, Error};
use std::sync::Arc;
use tracing::{debug, trace};

/// Text at `path` inside one response fragment; empty when the path misses.
pub fn extract(fragment: &Value, path: &[PathSegment]) -> String {
    match apply_parse_path(fragment, path) {
        None => {
            trace!(?path, "Parse path did not match response fragment");
            String::new()
        }
        Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// The input as an object of API parameters.
///
/// A bare value is assigned to the first declared parameter.
pub fn input_object(api: &ApiSpec, input: &Value) -> Map<String, Value> {
    match input {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            match api.first_parameter() {
                Some(param) => {
                    map.insert(param.name.clone(), other.clone());
                }
                None => debug!(api = %api.name, "Dropping scalar input for API without parameters"),
            }
            map
        }
    }
}

/// GET sends the input as query parameters; POST merges it over the body template.
pub fn build_request(api: &ApiSpec, input: &Value) -> TransportRequest {
    let params = input_object(api, input);
    let body = match api.method {
        HttpMethod::Get => Value::Object(params),
        HttpMethod::Post => {
            let mut body = api.body.as_object().cloned().unwrap_or_default();
            body.extend(params);
            Value::Object(body)
        }
    };
    TransportRequest {
        method: api.method,
        url: api.url.clone(),
        headers: api.headers.clone(),
        body,
        stream: api.stream,
    }
}

/// Extracted text pieces of one API response, in arrival order.
pub struct ApiResponseStream {
    rx: FragmentStream,
    parse_path: Vec<PathSegment>,
}

impl ApiResponseStream {
    /// The next extracted piece. Fragments that miss the parse path yield "".
    pub async fn next_piece(&mut self) -> Option<Result<String, TransportError>> {
        let fragment = self.rx.recv().await?;
        Some(fragment.map(|value| extract(&value, &self.parse_path)))
    }
}

/// Calls catalog APIs through a transport and persists binary results.
pub struct ApiInvoker {
    transport: Arc<dyn Transport>,
    blobs: Arc<dyn BlobStore>,
}

impl ApiInvoker {
    pub fn new(transport: Arc<dyn Transport>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { transport, blobs }
    }

    /// Send the request and return its piece stream.
    pub async fn open(&self, api: &ApiSpec, input: &Value) -> Result<ApiResponseStream, TransportError> {
        let request = build_request(api, input);
        debug!(api = %api.name, url = %request.url, stream = request.stream, "Calling API");
        let rx = self.transport.send(request).await?;
        Ok(ApiResponseStream {
            rx,
            parse_path: api.parse_path.clone(),
        })
    }

    /// Turn the collected text into the statement result.
    ///
    /// Text and JSON results pass through. Image and audio results are a URL
    /// or base64 payload; the bytes are stored and the handle is returned.
    pub async fn finish(&self, api: &ApiSpec, collected: String) -> Result<String, Error> {
        let kind = api.return_value_type;
        if !kind.is_binary() || collected.trim().is_empty() {
            return Ok(collected);
        }
        let bytes = self.binary_payload(collected.trim()).await?;
        let handle = self.blobs.put(kind, bytes).await?;
        debug!(api = %api.name, handle = %handle, "Stored binary API result");
        Ok(handle)
    }

    async fn binary_payload(&self, payload: &str) -> Result<Vec<u8>, Error> {
        if payload.starts_with("http://") || payload.starts_with("https://") {
            return Ok(self.transport.fetch_bytes(payload).await?);
        }
        let data = match payload.strip_prefix("data:") {
            Some(uri) => uri.split_once(',').map_or(uri, |(_, data)| data),
            None => payload,
        };
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| Error::Blob(BlobError::Decode(e.to_string())))
    }

    /// Open, drain, and finish in one call.
    pub async fn call(&self, api: &ApiSpec, input: &Value) -> Result<String, Error> {
        let mut stream = self.open(api, input).await?;
        let mut collected = String::new();
        while let Some(piece) = stream.next_piece().await {
            collected.push_str(&piece?);
        }
        self.finish(api, collected).await
    }
}
