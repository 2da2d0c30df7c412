use std::sync::Arc;

use bizdesk_lib::auth::{AuthClient, SessionStore};
use bizdesk_lib::config::StoreConfig;
use bizdesk_lib::models::{NewItem, NewSale, NewSaleItem};
use bizdesk_lib::store::{RestStore, Store};
use bizdesk_lib::AppError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANON_KEY: &str = "anon-key";

struct Harness {
    server: MockServer,
    store: RestStore,
    auth: AuthClient,
}

async fn harness() -> Harness {
    let server = MockServer::start().await;
    let config = StoreConfig::new(&server.uri(), ANON_KEY).expect("config");
    let http = reqwest::Client::new();
    let sessions = Arc::new(SessionStore::new());
    Harness {
        store: RestStore::new(http.clone(), config.clone(), Arc::clone(&sessions)),
        auth: AuthClient::new(http, config, sessions),
        server,
    }
}

fn expense_row(id: &str, amount: f64) -> serde_json::Value {
    json!({
        "id": id,
        "employee_id": "emp-1",
        "category": "Travel",
        "amount": amount,
        "date": "2024-05-01",
        "description": null,
        "created_at": "2024-05-01T10:00:00+00:00"
    })
}

#[tokio::test]
async fn recent_expenses_query_shape() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/expenses"))
        .and(query_param("select", "*"))
        .and(query_param("employee_id", "eq.emp-1"))
        .and(query_param("order", "created_at.desc"))
        .and(query_param("limit", "5"))
        .and(header("apikey", ANON_KEY))
        .and(header("authorization", "Bearer anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([expense_row("e2", 49.99), expense_row("e1", 10.0)])))
        .expect(1)
        .mount(&h.server)
        .await;

    let rows = h.store.list_expenses("emp-1", Some(5)).await.expect("list");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, "e2");
    assert_eq!(rows[0].description, "");
}

#[tokio::test]
async fn sales_history_is_scoped_and_lines_follow_entry_order() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/sales"))
        .and(query_param("employee_id", "eq.emp-1"))
        .and(query_param("order", "created_at.desc"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "sale-1",
            "employee_id": "emp-1",
            "customer_name": "Acme",
            "date": "2024-05-01",
            "total_amount": 230.0,
            "discount": null,
            "notes": null,
            "created_at": "2024-05-01T10:00:00+00:00"
        }])))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/sale_items"))
        .and(query_param("sale_id", "eq.sale-1"))
        .and(query_param("order", "position.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "si-2", "sale_id": "sale-1", "item_id": "item-a", "quantity": 2, "price_at_sale": 100.0, "discount": 10.0, "position": 0, "created_at": "2024-05-01T10:00:00+00:00"},
            {"id": "si-1", "sale_id": "sale-1", "item_id": "item-b", "quantity": 1, "price_at_sale": 50.0, "discount": 0, "position": 1, "created_at": "2024-05-01T10:00:00+00:00"}
        ])))
        .expect(1)
        .mount(&h.server)
        .await;

    let sales = h.store.list_sales("emp-1", Some(20)).await.expect("sales");
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].discount, 0.0);
    assert_eq!(sales[0].notes, "");
    let lines = h.store.list_sale_items("sale-1").await.expect("lines");
    let order: Vec<(&str, i32)> = lines.iter().map(|l| (l.item_id.as_str(), l.position)).collect();
    assert_eq!(order, [("item-a", 0), ("item-b", 1)]);
}

#[tokio::test]
async fn expense_total_selects_amounts_only() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/expenses"))
        .and(query_param("select", "amount"))
        .and(query_param("employee_id", "eq.emp-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"amount": 49.99}, {"amount": 10.01}])))
        .mount(&h.server)
        .await;

    let amounts = h.store.expense_amounts("emp-1").await.expect("amounts");
    assert_eq!(amounts, [49.99, 10.01]);
}

#[tokio::test]
async fn insert_asks_for_the_stored_row() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/items"))
        .and(header("prefer", "return=representation"))
        .and(body_partial_json(json!({"name": "Theodolite", "price": 2500.0})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": "item-9",
            "name": "Theodolite",
            "price": 2500.0,
            "description": "",
            "created_at": "2024-05-01T10:00:00+00:00"
        }])))
        .expect(1)
        .mount(&h.server)
        .await;

    let item = h
        .store
        .insert_item(&NewItem {
            name: "Theodolite".to_string(),
            price: 2500.0,
            description: String::new(),
        })
        .await
        .expect("insert");
    assert_eq!(item.id, "item-9");
}

#[tokio::test]
async fn sale_is_written_through_one_rpc() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/create_sale_with_items"))
        .and(body_partial_json(json!({
            "p_sale": {"employee_id": "emp-1", "customer_name": "Acme", "total_amount": 230.0},
            "p_items": [
                {"item_id": "item-a", "quantity": 2, "price_at_sale": 100.0, "discount": 10.0},
                {"item_id": "item-b", "quantity": 1, "price_at_sale": 50.0, "discount": 0.0}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sale": {
                "id": "sale-1",
                "employee_id": "emp-1",
                "customer_name": "Acme",
                "date": "2024-05-01",
                "total_amount": 230.0,
                "discount": 0,
                "notes": "",
                "created_at": "2024-05-01T10:00:00+00:00"
            },
            "items": [
                {"id": "si-1", "sale_id": "sale-1", "item_id": "item-a", "quantity": 2, "price_at_sale": 100.0, "discount": 10.0, "created_at": "2024-05-01T10:00:00+00:00"},
                {"id": "si-2", "sale_id": "sale-1", "item_id": "item-b", "quantity": 1, "price_at_sale": 50.0, "discount": 0, "created_at": "2024-05-01T10:00:00+00:00"}
            ]
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let sale = NewSale {
        employee_id: "emp-1".to_string(),
        customer_name: "Acme".to_string(),
        date: None,
        total_amount: 230.0,
        discount: 0.0,
        notes: String::new(),
    };
    let lines = [
        NewSaleItem {
            item_id: "item-a".to_string(),
            quantity: 2,
            price_at_sale: 100.0,
            discount: 10.0,
        },
        NewSaleItem {
            item_id: "item-b".to_string(),
            quantity: 1,
            price_at_sale: 50.0,
            discount: 0.0,
        },
    ];
    let created = h.store.create_sale(&sale, &lines).await.expect("create");
    assert_eq!(created.sale.id, "sale-1");
    assert_eq!(created.items.len(), 2);
    assert!(created.items.iter().all(|i| i.sale_id == "sale-1"));
}

#[tokio::test]
async fn server_errors_carry_status_and_message() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/items"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "JWT expired"})))
        .mount(&h.server)
        .await;

    match h.store.list_items().await {
        Err(AppError::Store { op, status, message }) => {
            assert_eq!(op, "list_items");
            assert_eq!(status, Some(401));
            assert_eq!(message, "JWT expired");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn sign_in_switches_requests_to_session_token() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", ANON_KEY))
        .and(body_partial_json(json!({"email": "staff@example.com", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "user-jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh",
            "user": {"id": "emp-1", "email": "staff@example.com", "role": "authenticated"}
        })))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/items"))
        .and(header("authorization", "Bearer user-jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&h.server)
        .await;

    let user = h.auth.sign_in(" staff@example.com ", "secret").await.expect("sign in");
    assert_eq!(user.id, "emp-1");
    assert_eq!(h.auth.current_user().map(|u| u.id), Some("emp-1".to_string()));
    assert!(h.store.list_items().await.expect("items").is_empty());
}

#[tokio::test]
async fn rejected_sign_in_keeps_user_signed_out() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&h.server)
        .await;

    let err = h.auth.sign_in("staff@example.com", "wrong").await.unwrap_err();
    assert!(matches!(&err, AppError::Auth(m) if m == "Invalid login credentials"));
    assert_eq!(err.user_message(), "Invalid email or password.");
    assert!(h.auth.current_user().is_none());
}

#[tokio::test]
async fn sign_out_clears_session_when_logout_fails() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "user-jwt",
            "user": {"id": "emp-1", "email": null}
        })))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(header("authorization", "Bearer user-jwt"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&h.server)
        .await;

    h.auth.sign_in("staff@example.com", "secret").await.expect("sign in");
    h.auth.sign_out().await.expect("sign out");
    assert!(h.auth.current_user().is_none());
    assert!(h.auth.sessions().access_token().is_none());
}

async fn mount_sign_in(server: &MockServer, expires_in: i64) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "user-jwt",
            "expires_in": expires_in,
            "refresh_token": "refresh-1",
            "user": {"id": "emp-1", "email": "staff@example.com"}
        })))
        .mount(server)
        .await;
}

async fn mount_refresh(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(header("apikey", ANON_KEY))
        .and(body_partial_json(json!({"refresh_token": "refresh-1"})))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}

fn refreshed_session() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": "fresh-jwt",
        "expires_in": 3600,
        "refresh_token": "refresh-2",
        "user": {"id": "emp-1", "email": "staff@example.com"}
    }))
}

#[tokio::test]
async fn rejected_token_is_refreshed_and_request_retried() {
    let h = harness().await;
    mount_sign_in(&h.server, 3600).await;
    mount_refresh(&h.server, refreshed_session()).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/items"))
        .and(header("authorization", "Bearer user-jwt"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "JWT expired"})))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/items"))
        .and(header("authorization", "Bearer fresh-jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&h.server)
        .await;

    h.auth.sign_in("staff@example.com", "secret").await.expect("sign in");
    assert!(h.store.list_items().await.expect("items after refresh").is_empty());
    assert_eq!(h.auth.sessions().access_token().as_deref(), Some("fresh-jwt"));
    assert_eq!(h.auth.sessions().refresh_token().as_deref(), Some("refresh-2"));
    assert!(h.auth.current_user().is_some());
}

#[tokio::test]
async fn failed_refresh_signs_the_user_out() {
    let h = harness().await;
    mount_sign_in(&h.server, 3600).await;
    mount_refresh(
        &h.server,
        ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid Refresh Token: Already Used"
        })),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/items"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "JWT expired"})))
        .expect(1)
        .mount(&h.server)
        .await;

    h.auth.sign_in("staff@example.com", "secret").await.expect("sign in");
    let err = h.store.list_items().await.unwrap_err();
    assert!(matches!(err, AppError::Store { status: Some(401), .. }));
    assert!(h.auth.current_user().is_none());
    assert!(matches!(h.auth.sessions().require_user(), Err(AppError::NotSignedIn)));
}

#[tokio::test]
async fn expired_token_is_refreshed_before_the_request() {
    let h = harness().await;
    mount_sign_in(&h.server, 0).await;
    mount_refresh(&h.server, refreshed_session()).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/items"))
        .and(header("authorization", "Bearer user-jwt"))
        .respond_with(ResponseTemplate::new(401))
        .expect(0)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/items"))
        .and(header("authorization", "Bearer fresh-jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&h.server)
        .await;

    h.auth.sign_in("staff@example.com", "secret").await.expect("sign in");
    h.store.list_items().await.expect("items");
    assert_eq!(h.auth.sessions().access_token().as_deref(), Some("fresh-jwt"));
}
