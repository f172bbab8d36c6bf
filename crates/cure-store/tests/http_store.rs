use cure_models::{Image, ImageId, SpatialMetadata};
use cure_store::{HttpImageStore, HttpStoreConfig, ImageStore, StoreError};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_for(server: &MockServer) -> HttpImageStore {
    HttpImageStore::new(HttpStoreConfig::new(format!("{}/", server.uri()))).unwrap()
}

fn sample_payload() -> Value {
    json!({
        "shape": [2, 2],
        "values": [0.0, 1.0, 2.0, 3.0],
        "origin": [1.0, 2.0, 3.0],
        "spacing": [0.5, 0.5, 1.0],
        "direction": [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
    })
}

#[tokio::test]
async fn fetch_image_decodes_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/images/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_payload()))
        .expect(1)
        .mount(&server)
        .await;

    let image = store_for(&server)
        .fetch_image(&ImageId::from("abc"))
        .await
        .unwrap();
    assert_eq!(image.shape(), &[2, 2]);
    assert_eq!(image.metadata().spacing(), [0.5, 0.5, 1.0]);
}

#[tokio::test]
async fn image_id_is_one_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/images/study%2F1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_payload()))
        .expect(1)
        .mount(&server)
        .await;

    store_for(&server)
        .fetch_image(&ImageId::from("study/1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn missing_image_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/images/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = store_for(&server)
        .fetch_image(&ImageId::from("nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn server_error_is_request_failed_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/images/abc"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(1)
        .mount(&server)
        .await;

    let err = store_for(&server)
        .fetch_image(&ImageId::from("abc"))
        .await
        .unwrap_err();
    match err {
        StoreError::RequestFailed(msg) => assert!(msg.contains("busy")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn invalid_metadata_is_rejected() {
    let server = MockServer::start().await;
    let mut payload = sample_payload();
    payload["spacing"] = json!([0.5, -1.0, 1.0]);
    Mock::given(method("GET"))
        .and(path("/images/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload))
        .mount(&server)
        .await;

    let err = store_for(&server)
        .fetch_image(&ImageId::from("abc"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Model(_)));
}

#[tokio::test]
async fn add_image_then_layer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/images"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "overlay-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/layers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "layer-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let image = Image::from_shape_vec(&[1, 2], vec![0.25, 0.75], SpatialMetadata::identity())
        .unwrap();
    let overlay = store.add_image("Gradcam image", image).await.unwrap();
    assert_eq!(overlay.as_str(), "overlay-1");

    let layer = store
        .add_layer(&ImageId::from("base-1"), &overlay)
        .await
        .unwrap();
    assert_eq!(layer.as_str(), "layer-1");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let add: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(add["name"], "Gradcam image");
    assert_eq!(add["image"]["shape"], json!([1, 2]));
    assert_eq!(add["image"]["values"], json!([0.25, 0.75]));

    let layer_body: Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(layer_body, json!({"base": "base-1", "overlay": "overlay-1"}));
}

#[tokio::test]
async fn health_check_reflects_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    assert!(store_for(&server).health_check().await);

    let down = HttpImageStore::new(HttpStoreConfig::new("http://127.0.0.1:9")).unwrap();
    assert!(!down.health_check().await);
}
