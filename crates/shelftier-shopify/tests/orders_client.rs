//! Integration tests for `ShopifyOrdersClient::fetch_orders`.
//!
//! Each test stands up a `wiremock` server in place of the Admin GraphQL
//! endpoint. Pages are distinguished by the `after` variable in the request
//! body.

use chrono::{DateTime, Utc};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shelftier_core::{AccountingPolicy, ShopifySettings};
use shelftier_engine::SalesWindow;
use shelftier_shopify::{ShopifyError, ShopifyOrdersClient};

fn settings(retry_max: u32) -> ShopifySettings {
    ShopifySettings {
        store_domain: "example.myshopify.com".to_string(),
        admin_token: "shpat_test".to_string(),
        api_version: "2024-07".to_string(),
        retry_max,
        min_delay_ms: 1,
        inter_delay_ms: 0,
        request_timeout_secs: 5,
    }
}

fn test_client(server: &MockServer, retry_max: u32) -> ShopifyOrdersClient {
    ShopifyOrdersClient::with_endpoint(&settings(retry_max), format!("{}/graphql.json", server.uri()))
        .expect("failed to build test client")
}

fn window() -> SalesWindow {
    let at = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
    SalesWindow::new(at("2024-05-01T00:00:00Z"), at("2024-06-01T00:00:00Z")).unwrap()
}

fn order_json(id: &str, sku: &str, qty: i64, amount: &str) -> serde_json::Value {
    json!({
        "id": id,
        "createdAt": "2024-05-10T12:00:00Z",
        "processedAt": "2024-05-10T12:00:00Z",
        "taxesIncluded": false,
        "app": { "name": "Online Store" },
        "lineItems": { "edges": [{ "node": {
            "quantity": qty,
            "discountedTotalSet": { "shopMoney": { "amount": amount } },
            "taxLines": [],
            "variant": {
                "id": format!("{id}-v"),
                "sku": sku,
                "title": "30 ml",
                "product": { "id": "gid://shopify/Product/1", "title": "Rose" }
            }
        }}]},
        "refunds": []
    })
}

fn page(orders: &[(&str, serde_json::Value)], has_next: bool) -> serde_json::Value {
    let edges: Vec<_> = orders
        .iter()
        .map(|(cursor, node)| json!({ "cursor": cursor, "node": node }))
        .collect();
    json!({ "data": { "orders": { "edges": edges, "pageInfo": { "hasNextPage": has_next } } } })
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_orders_follows_cursor_until_last_page() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .and(header("X-Shopify-Access-Token", "shpat_test"))
        .and(body_partial_json(json!({ "variables": { "after": null } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            &[("c1", order_json("o1", "ROSE-30", 2, "50.00"))],
            true,
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .and(body_partial_json(json!({ "variables": { "after": "c1" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            &[("c2", order_json("o2", "ROSE-30", 1, "25.00"))],
            false,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let orders = test_client(&server, 1)
        .fetch_orders(&window(), &AccountingPolicy::default())
        .await
        .expect("fetch should succeed");

    let ids: Vec<_> = orders.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["o1", "o2"]);
    assert_eq!(orders[0].line_items[0].quantity, 2);
}

#[tokio::test]
async fn fetch_orders_sends_window_search_query() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql.json"))
        .and(body_partial_json(json!({ "variables": {
            "first": 100,
            "query": "processed_at:>=2024-05-01T00:00:00Z processed_at:<2024-06-01T00:00:00Z financial_status:paid"
        }})))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[], false)))
        .expect(1)
        .mount(&server)
        .await;

    let policy = AccountingPolicy {
        extra_query: "financial_status:paid".to_string(),
        ..AccountingPolicy::default()
    };
    let orders = test_client(&server, 1)
        .fetch_orders(&window(), &policy)
        .await
        .expect("fetch should succeed");
    assert!(orders.is_empty());
}

// ---------------------------------------------------------------------------
// Throttling and errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_orders_retries_after_http_429() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            &[("c1", order_json("o1", "ROSE-30", 1, "10.00"))],
            false,
        )))
        .mount(&server)
        .await;

    let orders = test_client(&server, 3)
        .fetch_orders(&window(), &AccountingPolicy::default())
        .await
        .expect("third attempt should succeed");
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
async fn fetch_orders_retries_throttled_graphql_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "Throttled", "extensions": { "code": "THROTTLED" } }]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[], false)))
        .mount(&server)
        .await;

    let result = test_client(&server, 2)
        .fetch_orders(&window(), &AccountingPolicy::default())
        .await;
    assert!(result.is_ok(), "expected Ok, got: {result:?}");
}

#[tokio::test]
async fn fetch_orders_gives_up_when_throttling_persists() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let result = test_client(&server, 2)
        .fetch_orders(&window(), &AccountingPolicy::default())
        .await;
    assert!(matches!(result, Err(ShopifyError::Throttled)), "got: {result:?}");
}

#[tokio::test]
async fn fetch_orders_does_not_retry_query_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "Field 'bogus' doesn't exist on type 'Order'" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = test_client(&server, 5)
        .fetch_orders(&window(), &AccountingPolicy::default())
        .await;
    match result {
        Err(ShopifyError::GraphQl(msg)) => assert!(msg.contains("bogus")),
        other => panic!("expected GraphQl error, got: {other:?}"),
    }
}

#[tokio::test]
async fn fetch_orders_reports_unauthorized_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
        .expect(1)
        .mount(&server)
        .await;

    let result = test_client(&server, 5)
        .fetch_orders(&window(), &AccountingPolicy::default())
        .await;
    assert!(
        matches!(result, Err(ShopifyError::UnexpectedStatus { status: 401, .. })),
        "got: {result:?}"
    );
}

#[tokio::test]
async fn fetch_orders_rejects_malformed_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let result = test_client(&server, 1)
        .fetch_orders(&window(), &AccountingPolicy::default())
        .await;
    assert!(matches!(result, Err(ShopifyError::Deserialize { .. })));
}
