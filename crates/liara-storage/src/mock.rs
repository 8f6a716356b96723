//! In-memory fake of the remote object API.
//!
//! [`MockTransport`] answers the same routes as the real service from a
//! sorted in-memory map, so client code can be tested without a network.
//! It records every request and can inject failing status codes.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use http::{Method, StatusCode};
use jiff::Timestamp;
use serde::Deserialize;
use serde_json::json;

use crate::Result;
use crate::client::{OBJECT_ACL_HEADER, OBJECT_KEY_HEADER, OBJECT_SIZE_HEADER};
use crate::transport::{HttpRequest, HttpResponse, RequestBody, Transport};

/// Page size used when the caller does not ask for one.
const DEFAULT_PAGE_SIZE: usize = 1000;

/// An object held by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockObject {
    /// Stored bytes.
    pub data: Bytes,
    /// Content-type sent at upload.
    pub content_type: Option<String>,
    /// ACL sent at upload.
    pub acl: String,
    /// Upload time.
    pub last_modified: Timestamp,
}

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
}

#[derive(Debug)]
struct MockState {
    objects: BTreeMap<String, MockObject>,
    page_size: usize,
    auth_token: Option<String>,
    failures: VecDeque<StatusCode>,
    persistent_failure: Option<StatusCode>,
    requests: Vec<RecordedRequest>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
            auth_token: None,
            failures: VecDeque::new(),
            persistent_failure: None,
            requests: Vec::new(),
        }
    }
}

/// [`Transport`] that serves the object API from memory.
///
/// Clones share state, so a test can keep one handle for inspection while
/// the client owns another.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Creates an empty store that accepts any credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps listing pages at `page_size` entries.
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.lock().page_size = page_size.max(1);
        self
    }

    /// Answers 401 to requests without `Bearer <token>`.
    pub fn with_auth_token(self, token: impl Into<String>) -> Self {
        self.lock().auth_token = Some(token.into());
        self
    }

    /// Answers the next `times` requests with `status`.
    pub fn fail_next(&self, status: StatusCode, times: usize) {
        self.lock()
            .failures
            .extend(std::iter::repeat_n(status, times));
    }

    /// Answers every request with `status` until [`recover`](Self::recover).
    pub fn fail_always(&self, status: StatusCode) {
        self.lock().persistent_failure = Some(status);
    }

    /// Clears injected failures.
    pub fn recover(&self) {
        let mut state = self.lock();
        state.failures.clear();
        state.persistent_failure = None;
    }

    /// Stores an object directly, bypassing the API.
    pub fn insert(&self, key: &str, data: impl Into<Bytes>) {
        self.lock().objects.insert(
            key.to_string(),
            MockObject {
                data: data.into(),
                content_type: None,
                acl: "private".to_string(),
                last_modified: Timestamp::now(),
            },
        );
    }

    /// Returns the object stored under the exact `key`.
    pub fn object(&self, key: &str) -> Option<MockObject> {
        self.lock().objects.get(key).cloned()
    }

    /// Whether an object is stored under the exact `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().objects.contains_key(key)
    }

    /// All stored keys in order.
    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            path,
            query,
            headers,
            body,
        } = request;

        let body = match body {
            RequestBody::Empty => Bytes::new(),
            RequestBody::Bytes(bytes) => bytes,
            RequestBody::Stream(stream) => stream
                .try_fold(BytesMut::new(), |mut buffer, chunk| async move {
                    buffer.extend_from_slice(&chunk);
                    Ok(buffer)
                })
                .await?
                .freeze(),
        };

        let query: Vec<(String, String)> = query
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();

        let mut state = self.lock();
        state.requests.push(RecordedRequest {
            method: method.clone(),
            path: path.clone(),
            query: query.clone(),
            headers: headers.clone(),
        });

        if let Some(status) = state.failures.pop_front().or(state.persistent_failure) {
            return Ok(HttpResponse::from_bytes(status, "injected failure"));
        }

        if let Some(token) = state.auth_token.as_deref() {
            let expected = format!("Bearer {token}");
            let authorized = headers
                .get(AUTHORIZATION)
                .is_some_and(|value| value.as_bytes() == expected.as_bytes());
            if !authorized {
                return Ok(HttpResponse::from_bytes(
                    StatusCode::UNAUTHORIZED,
                    "invalid token",
                ));
            }
        }

        Ok(state.route(&method, &path, &query, &headers, body))
    }
}

impl MockState {
    fn route(
        &mut self,
        method: &Method,
        path: &str,
        query: &[(String, String)],
        headers: &HeaderMap,
        body: Bytes,
    ) -> HttpResponse {
        let Some((_, rest)) = path.split_once("/objects") else {
            return HttpResponse::from_bytes(StatusCode::NOT_FOUND, "unknown route");
        };

        if *method == Method::POST && rest.is_empty() {
            self.upload(headers, body)
        } else if *method == Method::POST && rest == "/copy" {
            self.copy(&body)
        } else if *method == Method::GET && rest == "/list" {
            self.list(query)
        } else if *method == Method::GET && rest.starts_with("/metadata/") {
            self.metadata(&decode(&rest["/metadata/".len()..]))
        } else if *method == Method::GET && rest.starts_with('/') {
            self.get(&decode(&rest[1..]))
        } else if *method == Method::DELETE && rest.starts_with('/') {
            self.delete(&decode(&rest[1..]))
        } else {
            HttpResponse::from_bytes(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
        }
    }

    fn upload(&mut self, headers: &HeaderMap, body: Bytes) -> HttpResponse {
        let Some(key) = headers
            .get(&OBJECT_KEY_HEADER)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        else {
            return HttpResponse::from_bytes(StatusCode::BAD_REQUEST, "missing object key");
        };

        let declared = headers
            .get(&OBJECT_SIZE_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok());
        if declared.is_some_and(|size| size != body.len()) {
            return HttpResponse::from_bytes(StatusCode::BAD_REQUEST, "size mismatch");
        }

        let object = MockObject {
            content_type: header_string(headers, CONTENT_TYPE.as_str()),
            acl: header_string(headers, OBJECT_ACL_HEADER.as_str())
                .unwrap_or_else(|| "private".to_string()),
            last_modified: Timestamp::now(),
            data: body,
        };
        let size = object.data.len();
        self.objects.insert(key.clone(), object);

        HttpResponse::json(StatusCode::CREATED, &json!({ "key": key, "size": size }))
    }

    fn copy(&mut self, body: &[u8]) -> HttpResponse {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct CopyRequest {
            key: String,
            new_key: String,
        }

        let Ok(request) = serde_json::from_slice::<CopyRequest>(body) else {
            return HttpResponse::from_bytes(StatusCode::BAD_REQUEST, "invalid copy request");
        };

        let Some(mut object) = self.objects.get(&request.key).cloned() else {
            return HttpResponse::from_bytes(StatusCode::NOT_FOUND, "source not found");
        };

        object.last_modified = Timestamp::now();
        self.objects.insert(request.new_key, object);
        HttpResponse::json(StatusCode::OK, &json!({ "copied": true }))
    }

    fn get(&self, key: &str) -> HttpResponse {
        let Some(object) = self.objects.get(key) else {
            return HttpResponse::from_bytes(StatusCode::NOT_FOUND, "object not found");
        };

        let mut response = HttpResponse::from_bytes(StatusCode::OK, object.data.clone());
        if let Some(value) = object
            .content_type
            .as_deref()
            .and_then(|ct| HeaderValue::from_str(ct).ok())
        {
            response.headers.insert(CONTENT_TYPE, value);
        }
        response
    }

    fn metadata(&self, key: &str) -> HttpResponse {
        match self.objects.get(key) {
            Some(object) => HttpResponse::json(
                StatusCode::OK,
                &json!({
                    "metadata": {
                        "size": object.data.len(),
                        "lastModified": object.last_modified.to_string(),
                        "contentType": object.content_type,
                    }
                }),
            ),
            None => HttpResponse::from_bytes(StatusCode::NOT_FOUND, "object not found"),
        }
    }

    fn delete(&mut self, key: &str) -> HttpResponse {
        match self.objects.remove(key) {
            Some(_) => HttpResponse::from_bytes(StatusCode::NO_CONTENT, Bytes::new()),
            None => HttpResponse::from_bytes(StatusCode::NOT_FOUND, "object not found"),
        }
    }

    /// Lists keys the way S3-style stores do: keys sharing the part up to the
    /// next delimiter collapse into one common prefix, and the continuation
    /// token is the last entry of the previous page.
    fn list(&self, query: &[(String, String)]) -> HttpResponse {
        let param = |name: &str| {
            query
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };

        let prefix = param("prefix").unwrap_or_default();
        let delimiter = param("delimiter").filter(|d| !d.is_empty());
        let token = param("continuationToken");
        let limit = param("maxKeys")
            .and_then(|value| value.parse::<usize>().ok())
            .map_or(self.page_size, |max| max.min(self.page_size))
            .max(1);

        // (name, object); common prefixes carry no object.
        let mut items: Vec<(String, Option<&MockObject>)> = Vec::new();
        for (key, object) in self.objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };

            match delimiter.and_then(|d| rest.find(d).map(|i| i + d.len())) {
                Some(end) => {
                    let common = format!("{prefix}{}", &rest[..end]);
                    if items.last().is_none_or(|(last, _)| *last != common) {
                        items.push((common, None));
                    }
                }
                None => items.push((key.clone(), Some(object))),
            }
        }

        let remaining: Vec<_> = items
            .into_iter()
            .filter(|(name, _)| token.is_none_or(|token| name.as_str() > token))
            .collect();

        let page = &remaining[..remaining.len().min(limit)];
        let next_token = (remaining.len() > page.len())
            .then(|| page.last().map(|(name, _)| name.clone()))
            .flatten();

        let objects: Vec<_> = page
            .iter()
            .filter_map(|(name, object)| {
                object.map(|object| {
                    json!({
                        "key": name,
                        "size": object.data.len(),
                        "lastModified": object.last_modified.to_string(),
                        "contentType": object.content_type,
                    })
                })
            })
            .collect();
        let common_prefixes: Vec<_> = page
            .iter()
            .filter(|(_, object)| object.is_none())
            .map(|(name, _)| name.clone())
            .collect();

        HttpResponse::json(
            StatusCode::OK,
            &json!({
                "objects": objects,
                "commonPrefixes": common_prefixes,
                "nextContinuationToken": next_token,
            }),
        )
    }
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn list(mock: &MockTransport, query: &[(&'static str, &str)]) -> serde_json::Value {
        let mut request = HttpRequest::new(Method::GET, "/v1/storage/objects/list");
        for (name, value) in query {
            request = request.with_query(*name, *value);
        }
        mock.execute(request).await.unwrap().json_body().await.unwrap()
    }

    #[tokio::test]
    async fn test_list_with_delimiter_groups_prefixes() {
        let mock = MockTransport::new();
        mock.insert("a/1.txt", "1");
        mock.insert("a/b/2.txt", "2");
        mock.insert("a/b/3.txt", "3");
        mock.insert("a/c-d.txt", "4");

        let page = list(&mock, &[("prefix", "a/"), ("delimiter", "/")]).await;
        assert_eq!(page["commonPrefixes"], json!(["a/b/"]));
        assert_eq!(page["objects"].as_array().unwrap().len(), 2);
        assert!(page["nextContinuationToken"].is_null());
    }

    #[tokio::test]
    async fn test_list_pages() {
        let mock = MockTransport::new().with_page_size(2);
        for key in ["k1", "k2", "k3"] {
            mock.insert(key, "x");
        }

        let first = list(&mock, &[("prefix", "")]).await;
        assert_eq!(first["objects"].as_array().unwrap().len(), 2);
        assert_eq!(first["nextContinuationToken"], "k2");

        let second = list(&mock, &[("prefix", ""), ("continuationToken", "k2")]).await;
        assert_eq!(second["objects"][0]["key"], "k3");
        assert!(second["nextContinuationToken"].is_null());
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let mock = MockTransport::new();
        mock.fail_next(StatusCode::INTERNAL_SERVER_ERROR, 1);

        let request = || HttpRequest::new(Method::GET, "/v1/storage/objects/x");
        let first = mock.execute(request()).await.unwrap();
        assert_eq!(first.status, StatusCode::INTERNAL_SERVER_ERROR);
        let second = mock.execute(request()).await.unwrap();
        assert_eq!(second.status, StatusCode::NOT_FOUND);
        assert_eq!(mock.request_count(), 2);

        mock.fail_always(StatusCode::BAD_GATEWAY);
        assert_eq!(mock.execute(request()).await.unwrap().status, StatusCode::BAD_GATEWAY);
        mock.recover();
        assert_eq!(mock.execute(request()).await.unwrap().status, StatusCode::NOT_FOUND);
    }
}
