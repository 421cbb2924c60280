mod common;

use serde_json::json;
use wiremock::{Mock, MockServer};

use common::{
    add_item, mount_confirm, mount_create_document, mount_order, mount_probe_defaults,
    mount_product, platform_error, response_json, success, MethodIs, ParamsContain, TestApp,
};

/// One line, one bin with enough stock: one issue line, one receipt line,
/// everything moved.
#[tokio::test]
async fn full_move_from_single_bin() {
    let server = MockServer::start().await;
    mount_probe_defaults(&server).await;
    mount_order(&server, 1001, json!([{"sku": "X1", "quantity": 5}])).await;
    mount_product(&server, "X1", 501, json!([{"location": "A", "quantity": 5}])).await;
    mount_create_document(&server, "issue", 9001).await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9001, 5, "A"))
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
        .get_authenticated("/api/v1/relocations?order_id=1001&to=DEST&from=A")
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["moved_units"], 5);
    assert_eq!(body["data"]["requested_units"], 5);
    assert_eq!(body["data"]["missing"], json!([]));
    assert_eq!(body["data"]["issue_document_id"], 9001);
    assert_eq!(body["data"]["receipt_document_id"], 9002);
}

/// The bin cannot take the whole quantity and partial mode is off: nothing
/// is issued, the draft is never confirmed and no receipt is created.
#[tokio::test]
async fn insufficient_whole_quantity_fails_without_receipt() {
    let server = MockServer::start().await;
    mount_probe_defaults(&server).await;
    mount_order(&server, 1002, json!([{"sku": "X1", "quantity": 5}])).await;
    mount_product(&server, "X1", 501, json!([{"location": "A", "quantity": 3}])).await;
    mount_create_document(&server, "issue", 9001).await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9001, 5, "A"))
        .respond_with(platform_error("ERROR_STOCK", "not enough stock at location"))
        .expect(1)
        .mount(&server)
        .await;
    // Neither the confirm nor any receipt document may happen.
    Mock::given(MethodIs("confirmInventoryDocument"))
        .respond_with(success(json!({})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(MethodIs("createInventoryDocument"))
        .and(ParamsContain::new("\"document_type\":\"receipt\""))
        .respond_with(success(json!({"document_id": 9002})))
        .expect(0)
        .mount(&server)
        .await;

    let app = TestApp::start(server).await;
    let response = app
        .get_authenticated("/api/v1/relocations?order_id=1002&to=DEST&from=A")
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("no stock could be issued"));
    assert_eq!(body["details"]["failures"][0]["source"], "A");
}

/// Partial mode walks the halving ladder across both bins until the full
/// quantity is accumulated; the receipt mirrors the issued total.
#[tokio::test]
async fn partial_mode_accumulates_across_bins() {
    let server = MockServer::start().await;
    mount_probe_defaults(&server).await;
    mount_order(&server, 1003, json!([{"sku": "X1", "quantity": 5}])).await;
    mount_product(
        &server,
        "X1",
        501,
        json!([{"location": "A", "quantity": 3}, {"location": "B", "quantity": 2}]),
    )
    .await;
    mount_create_document(&server, "issue", 9001).await;

    // Whole-quantity attempts fail on both bins (A has 3, B has 2).
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9001, 5, "A"))
        .respond_with(platform_error("ERROR_STOCK", "not enough stock at location"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9001, 5, "B"))
        .respond_with(platform_error("ERROR_STOCK", "not enough stock at location"))
        .expect(1)
        .mount(&server)
        .await;
    // Ladder at 2: A accepts once (leaving 1), then rejects.
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9001, 2, "A"))
        .respond_with(success(json!({})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9001, 2, "A"))
        .respond_with(platform_error("ERROR_STOCK", "not enough stock at location"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9001, 2, "B"))
        .respond_with(success(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    // Final single unit lands back in A.
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9001, 1, "A"))
        .respond_with(success(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    mount_confirm(&server, 9001).await;
    mount_create_document(&server, "receipt", 9002).await;
    // Conservation: the receipt carries exactly the issued 5, not a retry of
    // the original request shape.
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9002, 5, "DEST"))
        .respond_with(success(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    mount_confirm(&server, 9002).await;

    let app = TestApp::start(server).await;
    let response = app
        .get_authenticated("/api/v1/relocations?order_id=1003&to=DEST&from=A,B&partial=true")
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["moved_units"], 5);
    let sources = body["data"]["moved"][0]["sources"].as_array().unwrap();
    let drawn: Vec<(String, u64)> = sources
        .iter()
        .map(|s| {
            (
                s["location"].as_str().unwrap().to_string(),
                s["quantity"].as_u64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        drawn,
        vec![
            ("A".to_string(), 2),
            ("B".to_string(), 2),
            ("A".to_string(), 1)
        ]
    );
}

/// First fit is order-sensitive: when bin A accepts the whole line, bin B is
/// never contacted.
#[tokio::test]
async fn first_fit_never_touches_later_bins() {
    let server = MockServer::start().await;
    mount_probe_defaults(&server).await;
    mount_order(&server, 1004, json!([{"sku": "X1", "quantity": 5}])).await;
    mount_product(
        &server,
        "X1",
        501,
        json!([{"location": "A", "quantity": 5}, {"location": "B", "quantity": 5}]),
    )
    .await;
    mount_create_document(&server, "issue", 9001).await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9001, 5, "A"))
        .respond_with(success(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9001, 5, "B"))
        .respond_with(success(json!({})))
        .expect(0)
        .mount(&server)
        .await;
    mount_confirm(&server, 9001).await;
    mount_create_document(&server, "receipt", 9002).await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9002, 5, "DEST"))
        .respond_with(success(json!({})))
        .mount(&server)
        .await;
    mount_confirm(&server, 9002).await;

    let app = TestApp::start(server).await;
    let response = app
        .get_authenticated("/api/v1/relocations?order_id=1004&to=DEST&from=A,B")
        .await;
    assert_eq!(response.status(), 200);
}

/// A numeric source reference is translated to the bin's name before any
/// document line is written.
#[tokio::test]
async fn numeric_bin_reference_is_translated_to_name() {
    let server = MockServer::start().await;
    mount_probe_defaults(&server).await;
    mount_order(&server, 1005, json!([{"sku": "X1", "quantity": 2}])).await;
    mount_product(&server, "X1", 501, json!([{"location": "A", "quantity": 2}])).await;
    mount_create_document(&server, "issue", 9001).await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9001, 2, "A"))
        .respond_with(success(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    mount_confirm(&server, 9001).await;
    mount_create_document(&server, "receipt", 9002).await;
    Mock::given(MethodIs("addInventoryDocumentItem"))
        .and(add_item(9002, 2, "DEST"))
        .respond_with(success(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    mount_confirm(&server, 9002).await;

    let app = TestApp::start(server).await;
    // Location id 1 is "A" in the probe fixture listing.
    let response = app
        .get_authenticated("/api/v1/relocations?order_id=1005&to=DEST&from=1")
        .await;
    assert_eq!(response.status(), 200);
}
