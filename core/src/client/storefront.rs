//! Client for the storefront (Shopify) integration.
//!
//! # Design
//! Image search is a two-step flow: `upload_image` yields an image id, then
//! `search_image` resolves candidate product ids for it on the image
//! service and fetches the full products from the platform service. The
//! upload endpoint can answer 200 and still fail; those answers become
//! `Api` errors here instead of reaching the caller as a success.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::client::{check_status, send, trim_base_url, ImageSearch};
use crate::config::StorefrontConfig;
use crate::decode::{decode, FromJson, Record};
use crate::error::{BirseError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::image::{image_form, ImageSource};
use crate::types::storefront::{
    CropBox, ImageSearchParams, MetafieldFilter, SearchResponse, SimilarProductParams, UploadedImage,
};

const UPLOAD_FAILED: &str = "Upload failed";
const NO_IMAGE_ID: &str = "No image id returned";
const SEARCH_FAILED: &str = "Search failed";
const GET_PRODUCTS_FAILED: &str = "Get products failed";
const SIMILAR_PRODUCTS_FAILED: &str = "Similar products failed";

#[derive(Serialize)]
struct SimilarImageBody<'a> {
    image_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    xywh: Option<CropBox>,
    is_orientation: bool,
    shop: &'a str,
}

#[derive(Serialize)]
struct GetProductsBody<'a> {
    shop: &'a str,
    ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    metafields: Option<&'a [MetafieldFilter]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lang: Option<&'a str>,
}

/// Client for the storefront image and product endpoints.
#[derive(Debug, Clone)]
pub struct StorefrontClient<T = UreqTransport> {
    shop_id: String,
    shop_permanent_domain: String,
    api_base_url: String,
    platform_base_url: String,
    transport: T,
}

impl StorefrontClient<UreqTransport> {
    pub fn new(config: StorefrontConfig) -> Self {
        let transport = UreqTransport::new(config.timeout());
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> StorefrontClient<T> {
    pub fn with_transport(config: StorefrontConfig, transport: T) -> Self {
        Self {
            api_base_url: trim_base_url(&config.api_base_url),
            platform_base_url: trim_base_url(&config.platform_base_url),
            shop_id: config.shop_id,
            shop_permanent_domain: config.shop_permanent_domain,
            transport,
        }
    }

    // -- build --------------------------------------------------------------

    pub fn build_upload_image(&self, image: &[u8]) -> HttpRequest {
        let form = image_form(image).text("shop", &self.shop_id);
        HttpRequest::new(HttpMethod::Post, format!("{}/upload_image", self.api_base_url)).multipart(form)
    }

    pub fn build_similar_image(&self, params: &ImageSearchParams) -> Result<HttpRequest> {
        let body = SimilarImageBody {
            image_id: &params.image_id,
            xywh: params.crop,
            is_orientation: false,
            shop: &self.shop_id,
        };
        json_request(format!("{}/similar_image", self.api_base_url), &body)
    }

    pub fn build_get_products(&self, ids: &[String], params: &ImageSearchParams) -> Result<HttpRequest> {
        let body = GetProductsBody {
            shop: &self.shop_permanent_domain,
            ids,
            metafields: params.metafields.as_deref(),
            country: params.country.as_deref(),
            lang: params.lang.as_deref(),
        };
        json_request(format!("{}/get_products", self.platform_base_url), &body)
    }

    pub fn build_similar_products(&self, params: &SimilarProductParams) -> Result<HttpRequest> {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("shop", &self.shop_permanent_domain)
            .append_pair("shop_id", &self.shop_id)
            .append_pair("product_id", &params.product_id);
        let optional = [
            ("image_url", params.image_url.as_deref()),
            ("country", params.country.as_deref()),
            ("lang", params.lang.as_deref()),
        ];
        for (name, value) in optional {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                query.append_pair(name, value);
            }
        }
        if let Some(metafields) = &params.metafields {
            let encoded = serde_json::to_string(metafields).map_err(|e| BirseError::Serialization(e.to_string()))?;
            query.append_pair("metafields", &encoded);
        }
        let url = format!("{}/similar_products?{}", self.platform_base_url, query.finish());
        Ok(HttpRequest::new(HttpMethod::Get, url))
    }

    // -- parse --------------------------------------------------------------

    /// Promote the endpoint's soft failures (`result: false`, no id) to errors.
    pub fn parse_upload_image(&self, response: HttpResponse) -> Result<UploadedImage> {
        check_storefront_status(&response, UPLOAD_FAILED)?;
        let body: Value = decode(&response.body)?;
        let record = Record::new("UploadImageResponse", &body, "")?;
        if record.optional::<bool>("result")? == Some(false) {
            warn!("image upload rejected");
            return Err(BirseError::api(None, UPLOAD_FAILED));
        }
        match record.optional::<String>("image_id")? {
            Some(image_id) if !image_id.is_empty() => Ok(UploadedImage { image_id }),
            _ => {
                warn!("image upload answered without an id");
                Err(BirseError::api(None, NO_IMAGE_ID))
            }
        }
    }

    /// Candidate product ids. A body that is not an array means no candidates.
    pub fn parse_similar_image(&self, response: HttpResponse) -> Result<Vec<String>> {
        check_storefront_status(&response, SEARCH_FAILED)?;
        let body: Value = decode(&response.body)?;
        if !body.is_array() {
            debug!("similar_image returned no candidate list");
            return Ok(Vec::new());
        }
        Ok(Vec::<String>::from_json(&body, "")?)
    }

    pub fn parse_get_products(&self, response: HttpResponse) -> Result<SearchResponse> {
        check_storefront_status(&response, GET_PRODUCTS_FAILED)?;
        Ok(decode(&response.body)?)
    }

    pub fn parse_similar_products(&self, response: HttpResponse) -> Result<SearchResponse> {
        check_storefront_status(&response, SIMILAR_PRODUCTS_FAILED)?;
        Ok(decode(&response.body)?)
    }

    // -- execute ------------------------------------------------------------

    pub fn upload_image<'a>(&self, image: impl Into<ImageSource<'a>>) -> Result<UploadedImage> {
        let bytes = image.into().load()?;
        self.parse_upload_image(send(&self.transport, self.build_upload_image(&bytes))?)
    }

    /// Products visually similar to an uploaded image.
    ///
    /// When the image service finds no candidates the product service is
    /// not called and an empty successful response is returned.
    pub fn search_image(&self, params: &ImageSearchParams) -> Result<SearchResponse> {
        let request = self.build_similar_image(params)?;
        let ids = self.parse_similar_image(send(&self.transport, request)?)?;
        if ids.is_empty() {
            debug!(image_id = %params.image_id, "no candidates, skipping product fetch");
            return Ok(SearchResponse::empty());
        }

        debug!(image_id = %params.image_id, candidates = ids.len(), "fetching candidate products");
        let request = self.build_get_products(&ids, params)?;
        self.parse_get_products(send(&self.transport, request)?)
    }

    /// Products similar to an existing catalog product.
    pub fn similar_products(&self, params: &SimilarProductParams) -> Result<SearchResponse> {
        let request = self.build_similar_products(params)?;
        self.parse_similar_products(send(&self.transport, request)?)
    }
}

impl<T: Transport> ImageSearch for StorefrontClient<T> {
    type Response = SearchResponse;

    fn search(&self, image: ImageSource<'_>) -> Result<SearchResponse> {
        let uploaded = self.upload_image(image)?;
        self.search_image(&ImageSearchParams::new(uploaded.image_id))
    }
}

fn json_request<B: Serialize>(url: String, body: &B) -> Result<HttpRequest> {
    HttpRequest::new(HttpMethod::Post, url)
        .json(body)
        .map_err(|e| BirseError::Serialization(e.to_string()))
}

/// Like `check_status`, but prefers the `error.message` the services embed.
fn check_storefront_status(response: &HttpResponse, fallback: &str) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    match embedded_error(&response.body) {
        Some(message) => {
            warn!(status = response.status, body = %message, "API returned an error status");
            Err(BirseError::api(Some(response.status), message))
        }
        None => check_status(response, fallback),
    }
}

fn embedded_error(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value.get("error")?.get("message")?.as_str().map(str::to_string)
}
