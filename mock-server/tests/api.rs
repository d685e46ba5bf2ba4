use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, ProductList, SearchResults, DEFAULT_API_KEY, NO_MATCH_IMAGE};
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "test-boundary";

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .header("x-api-key", DEFAULT_API_KEY)
        .body(body.to_string())
        .unwrap()
}

fn get_request(uri: &str) -> Request<String> {
    Request::builder()
        .uri(uri)
        .header("x-api-key", DEFAULT_API_KEY)
        .body(String::new())
        .unwrap()
}

/// Multipart body with text `fields` and an optional `image` part.
fn form_request(uri: &str, fields: &[(&str, &str)], image: Option<&str>) -> Request<String> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    if let Some(image) = image {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"image.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n{image}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            http::header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("x-api-key", DEFAULT_API_KEY)
        .body(body)
        .unwrap()
}

// --- direct API ---

#[tokio::test]
async fn status_requires_api_key() {
    let resp = app()
        .oneshot(Request::builder().uri("/api/status").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = body_json(resp).await;
    assert_eq!(body["error"]["message"], "invalid api key");
}

#[tokio::test]
async fn status_reports_version() {
    let resp = app().oneshot(get_request("/api/status")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["images"], 0);
}

#[tokio::test]
async fn search_without_image_returns_400() {
    let resp = app()
        .oneshot(form_request("/api/search", &[("maxResults", "3")], None))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_by_url_requires_url() {
    let resp = app()
        .oneshot(json_request("POST", "/api/search-by-url", r#"{"url":""}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_unknown_image_returns_404() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/images/missing")
                .header("x-api-key", DEFAULT_API_KEY)
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn image_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // upload two images
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request("/api/upload", &[("metadata", r#"{"sku":"A"}"#)], Some("jpeg-a")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let uploaded: Value = body_json(resp).await;
    let id_a = uploaded["id"].as_str().unwrap().to_string();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request("/api/upload", &[("metadata", r#"{"sku":"B"}"#)], Some("jpeg-b")))
        .await
        .unwrap();
    let uploaded: Value = body_json(resp).await;
    let id_b = uploaded["id"].as_str().unwrap().to_string();
    let url_b = uploaded["imageUrl"].as_str().unwrap().to_string();

    // identical bytes rank first
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request("/api/search", &[], Some("jpeg-a")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let results: SearchResults = body_json(resp).await;
    assert_eq!(results.total_count, 2);
    assert_eq!(results.results[0].id, id_a);
    assert_eq!(results.results[0].score, 1.0);

    // options narrow the results
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "/api/search",
            &[("minScore", "0.4"), ("metadata", r#"{"sku":"B"}"#)],
            Some("jpeg-a"),
        ))
        .await
        .unwrap();
    let results: SearchResults = body_json(resp).await;
    assert_eq!(results.results.len(), 1);
    assert_eq!(results.results[0].id, id_b);

    // search by url
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/api/search-by-url",
            &format!(r#"{{"url":"{url_b}","maxResults":1}}"#),
        ))
        .await
        .unwrap();
    let results: SearchResults = body_json(resp).await;
    assert_eq!(results.results.len(), 1);
    assert_eq!(results.results[0].id, id_b);

    // delete, then status counts one image
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/images/{id_a}"))
                .header("x-api-key", DEFAULT_API_KEY)
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request("/api/status"))
        .await
        .unwrap();
    let status: Value = body_json(resp).await;
    assert_eq!(status["images"], 1);
}

// --- storefront ---

#[tokio::test]
async fn storefront_upload_without_shop_soft_fails() {
    let resp = app()
        .oneshot(form_request("/shopify/upload_image", &[], Some("jpeg")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body, serde_json::json!({"result": false}));
}

#[tokio::test]
async fn similar_image_unknown_id_returns_404() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/shopify/similar_image",
            r#"{"image_id":"nope","is_orientation":false,"shop":"42"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = body_json(resp).await;
    assert_eq!(body["error"]["message"], "unknown image");
}

#[tokio::test]
async fn storefront_flow() {
    use tower::Service;

    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request("/shopify/upload_image", &[("shop", "42")], Some("jpeg")))
        .await
        .unwrap();
    let uploaded: Value = body_json(resp).await;
    assert_eq!(uploaded["result"], true);
    let image_id = uploaded["image_id"].as_str().unwrap().to_string();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/shopify/similar_image",
            &format!(r#"{{"image_id":"{image_id}","xywh":[0,0,10,10],"is_orientation":false,"shop":"42"}}"#),
        ))
        .await
        .unwrap();
    let ids: Vec<String> = body_json(resp).await;
    assert_eq!(ids.len(), 3);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/platform/get_products",
            &serde_json::json!({
                "shop": "demo.myshopify.com",
                "ids": [ids[2], ids[0]],
                "metafields": [{"namespace": "custom", "key": "material"}, {"namespace": "custom", "key": "brand"}]
            })
            .to_string(),
        ))
        .await
        .unwrap();
    let list: ProductList = body_json(resp).await;
    assert!(list.result);
    assert_eq!(list.products.len(), 2);
    assert_eq!(list.products[0].id, ids[2]);
    assert_eq!(list.products[0].metafields.len(), 2);
    assert!(list.products[0].metafields[0].is_some());
    assert!(list.products[0].metafields[1].is_none());

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request(&format!(
            "/platform/similar_products?shop=demo.myshopify.com&shop_id=42&product_id={}",
            ids[0].replace('/', "%2F").replace(':', "%3A")
        )))
        .await
        .unwrap();
    let list: ProductList = body_json(resp).await;
    assert!(list.result);
    assert_eq!(list.products.len(), 2);
    assert!(list.products.iter().all(|p| p.id != ids[0]));
}

#[tokio::test]
async fn no_match_image_has_no_candidates() {
    use tower::Service;

    let mut app = app().into_service();
    let no_match = String::from_utf8(NO_MATCH_IMAGE.to_vec()).unwrap();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request("/shopify/upload_image", &[("shop", "42")], Some(&no_match)))
        .await
        .unwrap();
    let uploaded: Value = body_json(resp).await;
    let image_id = uploaded["image_id"].as_str().unwrap().to_string();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/shopify/similar_image",
            &format!(r#"{{"image_id":"{image_id}","is_orientation":false,"shop":"42"}}"#),
        ))
        .await
        .unwrap();
    let ids: Vec<String> = body_json(resp).await;
    assert!(ids.is_empty());
}

#[tokio::test]
async fn similar_products_unknown_product() {
    let resp = app()
        .oneshot(get_request(
            "/platform/similar_products?shop=demo.myshopify.com&shop_id=42&product_id=missing",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let list: ProductList = body_json(resp).await;
    assert!(!list.result);
    assert!(list.products.is_empty());
}
