mod common;

use serde_json::{json, Value};
use wiremock::{Mock, MockServer};

use common::{
    add_item, add_unallocated_item, mount_confirm, mount_create_document, mount_order,
    mount_probe_defaults, mount_product, platform_error, response_json, success, MethodIs,
    ParamsAll, ParamsContain, ParamsMatch, TestApp,
};

/// FEFO: the March batch is drained before the June batch even though the
/// platform returned them in the opposite order.
#[tokio::test]
async fn unallocated_issue_draws_batches_in_fefo_order() {
    let server = MockServer::start().await;
    mount_probe_defaults(&server).await;
    mount_order(&server, 2001, json!([{"sku": "X1", "quantity": 5}])).await;
    mount_product(&server, "X1", 501, json!([])).await;
    Mock::given(MethodIs("getInventoryErpUnits"))
        .and(ParamsContain::new("\"product_id\":501"))
        .respond_with(success(json!({
            "units": [
                {"quantity": 2, "expiry_date": "2026-06-01", "batch": "JUNE"},
                {"quantity": 4, "expiry_date": "2026-03-01", "batch": "MARCH"},
            ]
        })))
        .mount(&server)
        .await;
    mount_create_document(&server, "issue", 9001).await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(ParamsAll(vec![
            "\"document_id\":9001".to_string(),
            "\"quantity\":4,\"batch\":\"MARCH\"".to_string(),
        ]))
        .respond_with(success(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(ParamsAll(vec![
            "\"document_id\":9001".to_string(),
            "\"quantity\":1,\"batch\":\"JUNE\"".to_string(),
        ]))
        .respond_with(success(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    mount_confirm(&server, 9001).await;
    mount_create_document(&server, "receipt", 9002).await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9002, 5, "DEST"))
        .respond_with(success(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    mount_confirm(&server, 9002).await;

    let app = TestApp::start(server).await;
    let response = app
        .get_authenticated("/api/v1/relocations?order_id=2001&to=DEST&unallocated=true")
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["moved_units"], 5);
    let sources = body["data"]["moved"][0]["sources"].as_array().unwrap();
    assert_eq!(sources[0]["batch"]["batch"], "MARCH");
    assert_eq!(sources[0]["quantity"], 4);
    assert_eq!(sources[1]["batch"]["batch"], "JUNE");
    assert_eq!(sources[1]["quantity"], 1);
}

/// A rejected batch ends the draw-down; whatever was already drawn is what
/// the receipt mirrors.
#[tokio::test]
async fn batch_rejection_stops_the_queue() {
    let server = MockServer::start().await;
    mount_probe_defaults(&server).await;
    mount_order(&server, 2002, json!([{"sku": "X1", "quantity": 5}])).await;
    mount_product(&server, "X1", 501, json!([])).await;
    Mock::given(MethodIs("getInventoryErpUnits"))
        .and(ParamsContain::new("\"product_id\":501"))
        .respond_with(success(json!({
            "units": [
                {"quantity": 4, "expiry_date": "2026-03-01", "batch": "MARCH"},
                {"quantity": 2, "expiry_date": "2026-06-01", "batch": "JUNE"},
            ]
        })))
        .mount(&server)
        .await;
    mount_create_document(&server, "issue", 9001).await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(ParamsContain::new("\"batch\":\"MARCH\""))
        .respond_with(success(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(ParamsContain::new("\"batch\":\"JUNE\""))
        .respond_with(platform_error("ERROR_BATCH", "batch exhausted"))
        .expect(1)
        .mount(&server)
        .await;
    mount_confirm(&server, 9001).await;
    mount_create_document(&server, "receipt", 9002).await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9002, 4, "DEST"))
        .respond_with(success(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    mount_confirm(&server, 9002).await;

    let app = TestApp::start(server).await;
    let response = app
        .get_authenticated("/api/v1/relocations?order_id=2002&to=DEST&unallocated=true")
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["moved_units"], 4);
    assert_eq!(body["data"]["failures"][0]["source"], "unallocated");
}

/// Accounts without batch tracking get one plain unallocated line, with no
/// batch attributes at all.
#[tokio::test]
async fn unallocated_without_batch_support_adds_plain_line() {
    let server = MockServer::start().await;
    // ERP units are not available on this account.
    Mock::given(MethodIs("getInventoryErpUnits"))
        .respond_with(platform_error("ERROR_UNKNOWN_METHOD", "unknown method"))
        .mount(&server)
        .await;
    Mock::given(MethodIs("getInventoryLocations"))
        .respond_with(success(json!({"locations": [{"location_id": 3, "name": "DEST"}]})))
        .mount(&server)
        .await;
    mount_order(&server, 2003, json!([{"sku": "X1", "quantity": 5}])).await;
    mount_product(&server, "X1", 501, json!([])).await;
    // Reconstruction finds no prior receipts either.
    Mock::given(MethodIs("getInventoryDocuments"))
        .respond_with(success(json!({"documents": []})))
        .mount(&server)
        .await;
    mount_create_document(&server, "issue", 9001).await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_unallocated_item(9001, 5))
        .and(ParamsMatch(|params: &Value| {
            params.get("batch").is_none() && params.get("expiry_date").is_none()
        }))
        .respond_with(success(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    mount_confirm(&server, 9001).await;
    mount_create_document(&server, "receipt", 9002).await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9002, 5, "DEST"))
        .respond_with(success(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    mount_confirm(&server, 9002).await;

    let app = TestApp::start(server).await;
    let response = app
        .get_authenticated("/api/v1/relocations?order_id=2003&to=DEST&unallocated=true")
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["moved_units"], 5);
}

/// When the account tracks batches but the product has no units, the most
/// recent receipt's attributes are reconstructed as the tag source.
#[tokio::test]
async fn unallocated_reconstructs_batch_from_latest_receipt() {
    let server = MockServer::start().await;
    mount_probe_defaults(&server).await;
    mount_order(&server, 2004, json!([{"sku": "X1", "quantity": 3}])).await;
    mount_product(&server, "X1", 501, json!([])).await;
    Mock::given(MethodIs("getInventoryErpUnits"))
        .and(ParamsContain::new("\"product_id\":501"))
        .respond_with(success(json!({"units": []})))
        .mount(&server)
        .await;
    Mock::given(MethodIs("getInventoryDocuments"))
        .respond_with(success(json!({
            "documents": [
                {"document_id": 8001, "document_type": "receipt", "date_add": 200, "confirmed": true},
                {"document_id": 8000, "document_type": "receipt", "date_add": 100, "confirmed": true},
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(MethodIs("getInventoryDocumentItems"))
        .and(ParamsContain::new("\"document_id\":8001"))
        .respond_with(success(json!({
            "items": [{"product_id": 501, "quantity": 10, "batch": "OLD", "expiry_date": "2026-01-01"}]
        })))
        .mount(&server)
        .await;
    mount_create_document(&server, "issue", 9001).await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(ParamsAll(vec![
            "\"document_id\":9001".to_string(),
            "\"quantity\":3,\"batch\":\"OLD\"".to_string(),
        ]))
        .respond_with(success(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    mount_confirm(&server, 9001).await;
    mount_create_document(&server, "receipt", 9002).await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9002, 3, "DEST"))
        .respond_with(success(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    mount_confirm(&server, 9002).await;

    let app = TestApp::start(server).await;
    let response = app
        .get_authenticated("/api/v1/relocations?order_id=2004&to=DEST&unallocated=true")
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["moved_units"], 3);
}
