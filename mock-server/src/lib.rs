//! In-memory stand-in for both BIRSE API flavors.
//!
//! Routes:
//! - `/api/*`: the key-authenticated visual-search API.
//! - `/shopify/*`: the storefront image service (upload, candidate ids).
//! - `/platform/*`: the storefront product service.
//!
//! Scoring is deliberately simple: an image identical to a stored one scores
//! 1.0, anything else 0.5. An uploaded storefront image whose bytes are
//! `no-match` yields no candidates.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DEFAULT_API_KEY: &str = "test-key";
pub const NO_MATCH_IMAGE: &[u8] = b"no-match";

// ---------------------------------------------------------------------------
// Direct API DTOs
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub metadata: Option<Map<String, Value>>,
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub success: bool,
    pub results: Vec<SearchHit>,
    pub total_count: usize,
    pub processing_time: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlSearch {
    pub url: String,
    pub max_results: Option<usize>,
    pub min_score: Option<f64>,
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Clone, Debug)]
struct StoredImage {
    bytes: Vec<u8>,
    metadata: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Storefront DTOs
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    pub amount: String,
    pub currency_code: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: String,
    pub available_for_sale: bool,
    pub price: Money,
    pub compare_at_price: Option<Money>,
    pub selected_options: Vec<Map<String, Value>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    pub available: bool,
    pub title: String,
    pub handle: String,
    pub images: Vec<Option<Map<String, Value>>>,
    pub price: String,
    pub currency: String,
    pub variants: Value,
    pub collection: Vec<Value>,
    pub metafields: Vec<Option<Value>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProductList {
    pub result: bool,
    pub products: Vec<Product>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetafieldKey {
    pub namespace: String,
    pub key: String,
}

#[derive(Deserialize)]
pub struct SimilarImage {
    pub image_id: String,
    pub xywh: Option<[f64; 4]>,
    #[serde(default)]
    pub is_orientation: bool,
    pub shop: String,
}

#[derive(Deserialize)]
pub struct GetProducts {
    pub shop: String,
    pub ids: Vec<String>,
    pub metafields: Option<Vec<MetafieldKey>>,
    pub country: Option<String>,
    pub lang: Option<String>,
}

#[derive(Deserialize)]
pub struct SimilarProductsQuery {
    pub shop: String,
    pub shop_id: String,
    pub product_id: String,
    pub image_url: Option<String>,
    pub country: Option<String>,
    pub lang: Option<String>,
    pub metafields: Option<String>,
}

/// A catalog product plus the metafield values the shop defines for it.
#[derive(Clone, Debug)]
struct CatalogEntry {
    product: Product,
    metafields: HashMap<String, Value>,
}

// ---------------------------------------------------------------------------
// State and router
// ---------------------------------------------------------------------------

pub struct AppState {
    api_key: String,
    images: RwLock<HashMap<String, StoredImage>>,
    uploads: RwLock<HashMap<String, Vec<u8>>>,
    catalog: Vec<CatalogEntry>,
}

pub type Db = Arc<AppState>;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;

pub fn app() -> Router {
    app_with_key(DEFAULT_API_KEY)
}

pub fn app_with_key(api_key: &str) -> Router {
    let db: Db = Arc::new(AppState {
        api_key: api_key.to_string(),
        images: RwLock::new(HashMap::new()),
        uploads: RwLock::new(HashMap::new()),
        catalog: catalog(),
    });
    Router::new()
        .route("/api/search", post(search))
        .route("/api/search-by-url", post(search_by_url))
        .route("/api/upload", post(upload))
        .route("/api/images/{id}", delete(delete_image))
        .route("/api/status", get(status))
        .route("/shopify/upload_image", post(shopify_upload))
        .route("/shopify/similar_image", post(similar_image))
        .route("/platform/get_products", post(get_products))
        .route("/platform/similar_products", get(similar_products))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": { "message": message.into() } })))
}

fn authorize(db: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    match headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        Some(key) if key == db.api_key => Ok(()),
        _ => Err(error(StatusCode::UNAUTHORIZED, "invalid api key")),
    }
}

fn image_url(id: &str) -> String {
    format!("https://images.birse.test/{id}.jpg")
}

/// Text fields and the `image` part of a multipart form.
async fn read_form(mut multipart: Multipart) -> Result<(HashMap<String, String>, Option<Vec<u8>>), (StatusCode, Json<Value>)> {
    let mut fields = HashMap::new();
    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| error(StatusCode::BAD_REQUEST, e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| error(StatusCode::BAD_REQUEST, e.body_text()))?;
        if name == "image" {
            image = Some(data.to_vec());
        } else {
            fields.insert(name, String::from_utf8_lossy(&data).into_owned());
        }
    }
    Ok((fields, image))
}

fn parse_metadata(raw: Option<&String>) -> Result<Map<String, Value>, (StatusCode, Json<Value>)> {
    match raw {
        None => Ok(Map::new()),
        Some(raw) => serde_json::from_str(raw).map_err(|_| error(StatusCode::BAD_REQUEST, "metadata must be a JSON object")),
    }
}

fn matches_filter(metadata: &Map<String, Value>, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(k, v)| metadata.get(k) == Some(v))
}

fn rank(
    images: &HashMap<String, StoredImage>,
    score: impl Fn(&str, &StoredImage) -> f64,
    max_results: Option<usize>,
    min_score: Option<f64>,
    filter: &Map<String, Value>,
) -> SearchResults {
    let mut results: Vec<SearchHit> = images
        .iter()
        .filter(|(_, image)| matches_filter(&image.metadata, filter))
        .map(|(id, image)| SearchHit {
            id: id.clone(),
            score: score(id, image),
            metadata: (!image.metadata.is_empty()).then(|| image.metadata.clone()),
            image_url: Some(image_url(id)),
        })
        .filter(|hit| hit.score >= min_score.unwrap_or(0.0))
        .collect();
    results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    if let Some(max) = max_results {
        results.truncate(max);
    }
    SearchResults {
        success: true,
        total_count: results.len(),
        results,
        processing_time: 0.001,
    }
}

// ---------------------------------------------------------------------------
// Direct API handlers
// ---------------------------------------------------------------------------

async fn search(State(db): State<Db>, headers: HeaderMap, multipart: Multipart) -> ApiResult<SearchResults> {
    authorize(&db, &headers)?;
    let (fields, image) = read_form(multipart).await?;
    let query = image.ok_or_else(|| error(StatusCode::BAD_REQUEST, "missing image"))?;
    let max_results = match fields.get("maxResults") {
        Some(raw) => Some(raw.parse().map_err(|_| error(StatusCode::BAD_REQUEST, "invalid maxResults"))?),
        None => None,
    };
    let min_score = match fields.get("minScore") {
        Some(raw) => Some(raw.parse().map_err(|_| error(StatusCode::BAD_REQUEST, "invalid minScore"))?),
        None => None,
    };
    let filter = parse_metadata(fields.get("metadata"))?;

    let images = db.images.read().await;
    let score = |_: &str, image: &StoredImage| if image.bytes == query { 1.0 } else { 0.5 };
    Ok(Json(rank(&images, score, max_results, min_score, &filter)))
}

async fn search_by_url(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<UrlSearch>,
) -> ApiResult<SearchResults> {
    authorize(&db, &headers)?;
    if input.url.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "missing url"));
    }
    let images = db.images.read().await;
    let score = |id: &str, _: &StoredImage| if image_url(id) == input.url { 1.0 } else { 0.5 };
    let filter = input.metadata.unwrap_or_default();
    Ok(Json(rank(&images, score, input.max_results, input.min_score, &filter)))
}

async fn upload(State(db): State<Db>, headers: HeaderMap, multipart: Multipart) -> ApiResult<Value> {
    authorize(&db, &headers)?;
    let (fields, image) = read_form(multipart).await?;
    let bytes = image.ok_or_else(|| error(StatusCode::BAD_REQUEST, "missing image"))?;
    let metadata = parse_metadata(fields.get("metadata"))?;

    let id = Uuid::new_v4().to_string();
    db.images.write().await.insert(id.clone(), StoredImage { bytes, metadata });
    Ok(Json(json!({ "success": true, "id": id, "imageUrl": image_url(&id) })))
}

async fn delete_image(State(db): State<Db>, headers: HeaderMap, Path(id): Path<String>) -> ApiResult<Value> {
    authorize(&db, &headers)?;
    match db.images.write().await.remove(&id) {
        Some(_) => Ok(Json(json!({ "success": true, "id": id }))),
        None => Err(error(StatusCode::NOT_FOUND, "image not found")),
    }
}

async fn status(State(db): State<Db>, headers: HeaderMap) -> ApiResult<Value> {
    authorize(&db, &headers)?;
    let images = db.images.read().await.len();
    Ok(Json(json!({ "status": "ok", "version": "1.0.0", "images": images })))
}

// ---------------------------------------------------------------------------
// Storefront handlers
// ---------------------------------------------------------------------------

/// Rejections are answered with 200 and `result: false`, like the real service.
async fn shopify_upload(State(db): State<Db>, multipart: Multipart) -> ApiResult<Value> {
    let (fields, image) = read_form(multipart).await?;
    let shop_known = fields.get("shop").is_some_and(|shop| !shop.is_empty());
    let bytes = match image {
        Some(bytes) if shop_known && !bytes.is_empty() => bytes,
        _ => return Ok(Json(json!({ "result": false }))),
    };
    let image_id = Uuid::new_v4().to_string();
    db.uploads.write().await.insert(image_id.clone(), bytes);
    Ok(Json(json!({ "result": true, "image_id": image_id })))
}

async fn similar_image(State(db): State<Db>, Json(input): Json<SimilarImage>) -> ApiResult<Vec<String>> {
    let uploads = db.uploads.read().await;
    let bytes = uploads
        .get(&input.image_id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "unknown image"))?;
    let empty_crop = input.xywh.is_some_and(|[_, _, w, h]| w <= 0.0 || h <= 0.0);
    if bytes.as_slice() == NO_MATCH_IMAGE || empty_crop || input.shop.is_empty() || input.is_orientation {
        return Ok(Json(Vec::new()));
    }
    Ok(Json(db.catalog.iter().map(|entry| entry.product.id.clone()).collect()))
}

/// One metafield slot per requested key; unset ones are null.
fn with_metafields(entry: &CatalogEntry, keys: Option<&[MetafieldKey]>) -> Product {
    let mut product = entry.product.clone();
    product.metafields = keys
        .unwrap_or_default()
        .iter()
        .map(|k| entry.metafields.get(&format!("{}.{}", k.namespace, k.key)).cloned())
        .collect();
    product
}

async fn get_products(State(db): State<Db>, Json(input): Json<GetProducts>) -> ApiResult<ProductList> {
    if input.shop.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "missing shop"));
    }
    let products = input
        .ids
        .iter()
        .filter_map(|id| db.catalog.iter().find(|entry| &entry.product.id == id))
        .map(|entry| with_metafields(entry, input.metafields.as_deref()))
        .collect();
    Ok(Json(ProductList { result: true, products }))
}

async fn similar_products(State(db): State<Db>, Query(query): Query<SimilarProductsQuery>) -> ApiResult<ProductList> {
    if query.shop.is_empty() || query.shop_id.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "missing shop"));
    }
    let keys: Option<Vec<MetafieldKey>> = match &query.metafields {
        Some(raw) => Some(serde_json::from_str(raw).map_err(|_| error(StatusCode::BAD_REQUEST, "invalid metafields"))?),
        None => None,
    };
    if !db.catalog.iter().any(|entry| entry.product.id == query.product_id) {
        return Ok(Json(ProductList { result: false, products: Vec::new() }));
    }
    let products = db
        .catalog
        .iter()
        .filter(|entry| entry.product.id != query.product_id)
        .map(|entry| with_metafields(entry, keys.as_deref()))
        .collect();
    Ok(Json(ProductList { result: true, products }))
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

fn money(amount: &str) -> Money {
    Money {
        amount: amount.to_string(),
        currency_code: "EUR".to_string(),
    }
}

fn option(name: &str, value: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("name".to_string(), json!(name));
    map.insert("value".to_string(), json!(value));
    map
}

fn image(url: &str) -> Option<Map<String, Value>> {
    json!({ "url": url }).as_object().cloned()
}

fn catalog() -> Vec<CatalogEntry> {
    let shirt_variants = vec![
        ProductVariant {
            id: "gid://shopify/ProductVariant/9001".to_string(),
            available_for_sale: true,
            price: money("49.00"),
            compare_at_price: Some(money("59.00")),
            selected_options: vec![option("Size", "M"), option("Color", "Sand")],
        },
        ProductVariant {
            id: "gid://shopify/ProductVariant/9002".to_string(),
            available_for_sale: false,
            price: money("49.00"),
            compare_at_price: None,
            selected_options: vec![option("Size", "L"), option("Color", "Sand")],
        },
    ];
    let tote_variants = vec![ProductVariant {
        id: "gid://shopify/ProductVariant/9101".to_string(),
        available_for_sale: true,
        price: money("25.00"),
        compare_at_price: None,
        selected_options: Vec::new(),
    }];
    let cap_variants = vec![ProductVariant {
        id: "gid://shopify/ProductVariant/9201".to_string(),
        available_for_sale: false,
        price: money("19.00"),
        compare_at_price: Some(money("22.00")),
        selected_options: vec![option("Color", "Navy")],
    }];

    let material = |name: &str| {
        json!({ "reference": {
            "id": format!("gid://shopify/Metaobject/{}", name.to_lowercase()),
            "type": "material",
            "fields": [{ "key": "name", "value": name }]
        }})
    };

    vec![
        CatalogEntry {
            product: Product {
                id: "gid://shopify/Product/7001".to_string(),
                available: true,
                title: "Linen Shirt".to_string(),
                handle: "linen-shirt".to_string(),
                images: vec![image("https://cdn.shopify.test/linen-shirt.jpg"), None],
                price: "49.00".to_string(),
                currency: "EUR".to_string(),
                variants: json!({ "nodes": shirt_variants }),
                collection: vec![json!({ "node": {
                    "image": { "url": "https://cdn.shopify.test/summer.jpg" },
                    "title": "Summer",
                    "handle": "summer"
                }})],
                metafields: Vec::new(),
            },
            metafields: HashMap::from([("custom.material".to_string(), material("Linen"))]),
        },
        CatalogEntry {
            product: Product {
                id: "gid://shopify/Product/7002".to_string(),
                available: true,
                title: "Canvas Tote".to_string(),
                handle: "canvas-tote".to_string(),
                images: vec![image("https://cdn.shopify.test/canvas-tote.jpg")],
                price: "25.00".to_string(),
                currency: "EUR".to_string(),
                variants: json!({ "nodes": tote_variants }),
                collection: vec![json!({ "node": { "image": null, "title": "Bags", "handle": "bags" } })],
                metafields: Vec::new(),
            },
            metafields: HashMap::new(),
        },
        CatalogEntry {
            product: Product {
                id: "gid://shopify/Product/7003".to_string(),
                available: false,
                title: "Cotton Cap".to_string(),
                handle: "cotton-cap".to_string(),
                images: Vec::new(),
                price: "19.00".to_string(),
                currency: "EUR".to_string(),
                variants: json!({ "nodes": cap_variants }),
                collection: Vec::new(),
                metafields: Vec::new(),
            },
            metafields: HashMap::from([("custom.material".to_string(), material("Cotton"))]),
        },
    ]
}
