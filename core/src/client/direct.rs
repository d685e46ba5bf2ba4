//! Client for the key-authenticated visual-search API.

use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::client::{check_status, send, trim_base_url, ImageSearch};
use crate::config::DirectConfig;
use crate::decode::{decode, JsonObject};
use crate::error::{BirseError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::image::{image_form, ImageSource};
use crate::types::search::{SearchOptions, SearchResponse};

const API_KEY_HEADER: &str = "X-API-Key";
const ERROR_FALLBACK: &str = "API request failed";

/// JSON body of `/search-by-url`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UrlSearchBody<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a JsonObject>,
}

/// Client for `/search`, `/search-by-url`, `/upload`, `/images/{id}` and `/status`.
///
/// Holds no mutable state; share it across threads when `T` allows.
#[derive(Debug, Clone)]
pub struct DirectClient<T = UreqTransport> {
    base_url: String,
    api_key: String,
    transport: T,
}

impl DirectClient<UreqTransport> {
    pub fn new(config: DirectConfig) -> Self {
        let transport = UreqTransport::new(config.timeout());
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> DirectClient<T> {
    pub fn with_transport(config: DirectConfig, transport: T) -> Self {
        Self {
            base_url: trim_base_url(&config.base_url),
            api_key: config.api_key,
            transport,
        }
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, format!("{}{path}", self.base_url)).header(API_KEY_HEADER, self.api_key.as_str())
    }

    // -- build --------------------------------------------------------------

    pub fn build_search_by_image(&self, image: &[u8], options: &SearchOptions) -> Result<HttpRequest> {
        let mut form = image_form(image);
        if let Some(max_results) = options.max_results {
            form = form.text("maxResults", &max_results.to_string());
        }
        if let Some(min_score) = options.min_score {
            form = form.text("minScore", &min_score.to_string());
        }
        if let Some(metadata) = options.metadata() {
            form = form.text("metadata", &to_json(metadata)?);
        }
        Ok(self.request(HttpMethod::Post, "/search").multipart(form))
    }

    pub fn build_search_by_url(&self, image_url: &str, options: &SearchOptions) -> Result<HttpRequest> {
        let body = UrlSearchBody {
            url: image_url,
            max_results: options.max_results,
            min_score: options.min_score,
            metadata: options.metadata(),
        };
        self.request(HttpMethod::Post, "/search-by-url")
            .json(&body)
            .map_err(|e| BirseError::Serialization(e.to_string()))
    }

    pub fn build_upload_image(&self, image: &[u8], metadata: Option<&JsonObject>) -> Result<HttpRequest> {
        let mut form = image_form(image);
        if let Some(metadata) = metadata.filter(|m| !m.is_empty()) {
            form = form.text("metadata", &to_json(metadata)?);
        }
        Ok(self.request(HttpMethod::Post, "/upload").multipart(form))
    }

    /// The id is percent-encoded as a single path segment.
    pub fn build_delete_image(&self, image_id: &str) -> Result<HttpRequest> {
        let invalid = || BirseError::InvalidUrl(self.base_url.clone());
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(["images", image_id]);
        Ok(HttpRequest::new(HttpMethod::Delete, url.into()).header(API_KEY_HEADER, self.api_key.as_str()))
    }

    pub fn build_get_status(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/status")
    }

    // -- parse --------------------------------------------------------------

    pub fn parse_search(&self, response: HttpResponse) -> Result<SearchResponse> {
        check_status(&response, ERROR_FALLBACK)?;
        Ok(decode(&response.body)?)
    }

    /// Upload, delete and status answers are passed through as JSON objects.
    pub fn parse_object(&self, response: HttpResponse) -> Result<JsonObject> {
        check_status(&response, ERROR_FALLBACK)?;
        Ok(decode(&response.body)?)
    }

    // -- execute ------------------------------------------------------------

    pub fn search_by_image<'a>(
        &self,
        image: impl Into<ImageSource<'a>>,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let bytes = image.into().load()?;
        let request = self.build_search_by_image(&bytes, options)?;
        let response = self.parse_search(send(&self.transport, request)?)?;
        debug!(results = response.results.len(), "image search finished");
        Ok(response)
    }

    pub fn search_by_url(&self, image_url: &str, options: &SearchOptions) -> Result<SearchResponse> {
        let request = self.build_search_by_url(image_url, options)?;
        self.parse_search(send(&self.transport, request)?)
    }

    /// Store an image in the index; the answer carries the new image id.
    pub fn upload_image<'a>(
        &self,
        image: impl Into<ImageSource<'a>>,
        metadata: Option<&JsonObject>,
    ) -> Result<JsonObject> {
        let bytes = image.into().load()?;
        let request = self.build_upload_image(&bytes, metadata)?;
        self.parse_object(send(&self.transport, request)?)
    }

    pub fn delete_image(&self, image_id: &str) -> Result<JsonObject> {
        let request = self.build_delete_image(image_id)?;
        self.parse_object(send(&self.transport, request)?)
    }

    /// Health and version of the service.
    pub fn get_status(&self) -> Result<JsonObject> {
        self.parse_object(send(&self.transport, self.build_get_status())?)
    }
}

impl<T: Transport> ImageSearch for DirectClient<T> {
    type Response = SearchResponse;

    fn search(&self, image: ImageSource<'_>) -> Result<SearchResponse> {
        self.search_by_image(image, &SearchOptions::default())
    }
}

fn to_json(metadata: &JsonObject) -> Result<String> {
    serde_json::to_string(metadata).map_err(|e| BirseError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use serde_json::json;

    use super::*;
    use crate::http::TransportError;

    type Responder = fn(HttpRequest) -> std::result::Result<HttpResponse, TransportError>;

    fn client() -> DirectClient<Responder> {
        client_with(|_| panic!("no request expected"))
    }

    fn client_with(responder: Responder) -> DirectClient<Responder> {
        DirectClient::with_transport(DirectConfig::new("secret").with_base_url("http://localhost:3000/api/"), responder)
    }

    #[test]
    fn every_request_carries_the_api_key() {
        let c = client();
        assert_eq!(c.build_get_status().header_value("x-api-key"), Some("secret"));
        assert_eq!(c.build_delete_image("img-1").unwrap().header_value("x-api-key"), Some("secret"));
        let req = c.build_search_by_url("https://x/a.jpg", &SearchOptions::default()).unwrap();
        assert_eq!(req.header_value("x-api-key"), Some("secret"));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let req = client().build_get_status();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/api/status");
        assert!(req.body.is_none());
    }

    #[test]
    fn build_delete_image_targets_the_id() {
        let req = client().build_delete_image("img-7").unwrap();
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.url, "http://localhost:3000/api/images/img-7");
    }

    #[test]
    fn build_delete_image_escapes_the_id() {
        let req = client().build_delete_image("a/b?c#d e").unwrap();
        assert_eq!(req.url, "http://localhost:3000/api/images/a%2Fb%3Fc%23d%20e");
    }

    #[test]
    fn build_delete_image_rejects_a_bad_base_url() {
        let responder: Responder = |_| panic!("no request expected");
        let c = DirectClient::with_transport(DirectConfig::new("secret").with_base_url("not a url"), responder);
        let err = c.build_delete_image("img-7").unwrap_err();
        assert!(matches!(err, BirseError::InvalidUrl(ref url) if url == "not a url"));
    }

    #[test]
    fn build_search_by_url_omits_unset_options() {
        let req = client().build_search_by_url("https://x/a.jpg", &SearchOptions::default()).unwrap();
        assert_eq!(req.url, "http://localhost:3000/api/search-by-url");
        assert_eq!(req.header_value("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_str(req.body_text().unwrap()).unwrap();
        assert_eq!(body, json!({"url": "https://x/a.jpg"}));
    }

    #[test]
    fn build_search_by_url_sends_all_options() {
        let options = SearchOptions {
            max_results: Some(5),
            min_score: Some(0.75),
            metadata: json!({"category": "shoes"}).as_object().cloned(),
        };
        let req = client().build_search_by_url("https://x/a.jpg", &options).unwrap();
        let body: serde_json::Value = serde_json::from_str(req.body_text().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({"url": "https://x/a.jpg", "maxResults": 5, "minScore": 0.75, "metadata": {"category": "shoes"}})
        );
    }

    #[test]
    fn build_search_by_image_is_multipart() {
        let options = SearchOptions {
            max_results: Some(3),
            min_score: Some(0.5),
            metadata: json!({"brand": "acme"}).as_object().cloned(),
        };
        let req = client().build_search_by_image(b"jpeg", &options).unwrap();
        assert_eq!(req.url, "http://localhost:3000/api/search");
        assert!(req
            .header_value("content-type")
            .unwrap()
            .starts_with("multipart/form-data; boundary="));
        let body = String::from_utf8(req.body.unwrap()).unwrap();
        assert!(body.contains("name=\"image\"; filename=\"image.jpg\""));
        assert!(body.contains("name=\"maxResults\"\r\n\r\n3\r\n"));
        assert!(body.contains("name=\"minScore\"\r\n\r\n0.5\r\n"));
        assert!(body.contains("name=\"metadata\"\r\n\r\n{\"brand\":\"acme\"}\r\n"));
    }

    #[test]
    fn build_upload_image_skips_empty_metadata() {
        let empty = JsonObject::new();
        let req = client().build_upload_image(b"jpeg", Some(&empty)).unwrap();
        assert_eq!(req.url, "http://localhost:3000/api/upload");
        let body = String::from_utf8(req.body.unwrap()).unwrap();
        assert!(!body.contains("name=\"metadata\""));
    }

    #[test]
    fn parse_search_success() {
        let response = HttpResponse::new(
            200,
            r#"{"success":true,"results":[{"id":"a","score":0.9}],"totalCount":1,"processingTime":0.12}"#,
        );
        let parsed = client().parse_search(response).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.results[0].id, "a");
        assert_eq!(parsed.total_count, Some(1));
        assert_eq!(parsed.processing_time, Some(0.12));
    }

    #[test]
    fn parse_search_error_status() {
        let err = client()
            .parse_search(HttpResponse::new(500, "internal error"))
            .unwrap_err();
        assert!(matches!(err, BirseError::Api { status: Some(500), ref message } if message == "internal error"));
    }

    #[test]
    fn parse_search_bad_json() {
        let err = client().parse_search(HttpResponse::new(200, "not json")).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn missing_image_fails_before_any_request() {
        let path = std::env::temp_dir().join(format!("birse-absent-{}.jpg", uuid::Uuid::new_v4()));
        let err = client()
            .search_by_image(path.as_path(), &SearchOptions::default())
            .unwrap_err();
        assert!(matches!(err, BirseError::ImageNotFound(_)));
    }

    #[test]
    fn search_trait_uses_default_options() {
        let c = client_with(|req| {
            let body = String::from_utf8(req.body.unwrap()).unwrap();
            assert!(!body.contains("maxResults"));
            Ok(HttpResponse::new(200, r#"{"success":true,"results":[]}"#))
        });
        let response = c.search(ImageSource::Bytes(b"jpeg".to_vec())).unwrap();
        assert!(response.results.is_empty());
    }

    #[test]
    fn transport_failure_surfaces_once() {
        thread_local!(static CALLS: Cell<u32> = const { Cell::new(0) });
        let c = client_with(|_| {
            CALLS.with(|calls| calls.set(calls.get() + 1));
            Err(TransportError("connection refused".to_string()))
        });
        let err = c.get_status().unwrap_err();
        assert!(err.is_connection());
        assert_eq!(CALLS.with(Cell::get), 1);
    }
}
