//! Inventory, dashboard and staff endpoints.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::{json, Value};

fn number(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().expect("numeric string"),
        other => other.as_f64().expect("number"),
    }
}

async fn create_product(
    app: &TestApp,
    name: &str,
    sku: &str,
    category: &str,
    price: &str,
    in_stock: i32,
) -> Value {
    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": name,
                "sku": sku,
                "category": category,
                "price": price,
                "in_stock": in_stock,
            })),
            Some(app.manager_token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED, "create {sku}");
    response_json(response).await["data"].clone()
}

#[tokio::test]
async fn product_crud_round_trip() {
    let app = TestApp::new().await;

    let created = create_product(&app, "Brass Diya", "DIYA-01", "Decor", "4.50", 40).await;
    let id = created["id"].as_str().expect("id").to_string();
    assert_eq!(created["is_available"], true);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{id}"),
            None,
            Some(app.cashier_token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["data"]["sku"], "DIYA-01");

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{id}"),
            Some(json!({ "in_stock": 0 })),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = response_json(response).await["data"].clone();
    assert_eq!(updated["in_stock"], 0);
    assert_eq!(updated["is_available"], false);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/products/{id}"),
            None,
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{id}"),
            None,
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_sku_conflicts() {
    let app = TestApp::new().await;
    create_product(&app, "Candle", "CND-1", "Decor", "2.00", 20).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "name": "Other", "sku": "CND-1", "price": "1", "in_stock": 1 })),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn cashiers_read_but_cannot_write_inventory() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/products", None, Some(app.cashier_token()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "name": "Nope", "sku": "NOPE", "price": "1", "in_stock": 1 })),
            Some(app.cashier_token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn listing_filters_and_reports_low_stock() {
    let app = TestApp::new().await;
    create_product(&app, "Rangoli Colours", "RNG-1", "Decor", "3.00", 4).await;
    create_product(&app, "Kaju Katli", "SWT-1", "Sweets", "12.00", 60).await;
    create_product(&app, "Gift Hamper", "GFT-1", "Gifts", "25.00", 0).await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/products?search=katli",
            None,
            Some(app.cashier_token()),
        )
        .await;
    let body = response_json(response).await;
    let listed = body["data"]["products"].as_array().expect("products");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["sku"], "SWT-1");

    // alerts cover the whole inventory, lowest stock first
    let alerts = body["data"]["low_stock_alerts"].as_array().expect("alerts");
    let alert_skus: Vec<&str> = alerts.iter().map(|a| a["sku"].as_str().unwrap()).collect();
    assert_eq!(alert_skus, vec!["GFT-1", "RNG-1"]);

    let response = app
        .request(
            Method::GET,
            "/api/v1/products?stock_level=out",
            None,
            Some(app.cashier_token()),
        )
        .await;
    let body = response_json(response).await;
    let listed = body["data"]["products"].as_array().expect("products");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["sku"], "GFT-1");

    let response = app
        .request(
            Method::GET,
            "/api/v1/products?category=Sweets",
            None,
            Some(app.cashier_token()),
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["products"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn dashboard_figures_follow_inventory_and_staff() {
    let app = TestApp::new().await;
    create_product(&app, "Rangoli Colours", "RNG-1", "Decor", "3.00", 4).await;
    create_product(&app, "Kaju Katli", "SWT-1", "Sweets", "12.00", 60).await;
    create_product(&app, "Torans", "DEC-2", "Decor", "10.00", 20).await;

    let response = app
        .request(Method::GET, "/api/v1/dashboard/kpi", None, Some(app.manager_token()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let kpi = response_json(response).await["data"].clone();
    assert_eq!(kpi["total_products"], 3);
    assert_eq!(kpi["low_stock_count"], 1);
    assert_eq!(kpi["active_staff"], 2);
    // 3*4 + 12*60 + 10*20
    assert_eq!(number(&kpi["inventory_value"]), 932.0);
    assert!((number(&kpi["total_revenue"]) - 279.6).abs() < 1e-9);

    let response = app
        .request(
            Method::GET,
            "/api/v1/dashboard/category-chart",
            None,
            Some(app.manager_token()),
        )
        .await;
    let chart = response_json(response).await["data"].clone();
    assert_eq!(chart["labels"], json!(["Decor", "Sweets"]));
    let values: Vec<f64> = chart["values"].as_array().unwrap().iter().map(number).collect();
    assert_eq!(values, vec![212.0, 720.0]);

    let response = app
        .request(
            Method::GET,
            "/api/v1/dashboard/alerts",
            None,
            Some(app.manager_token()),
        )
        .await;
    let alerts = response_json(response).await["data"].clone();
    let alerts = alerts.as_array().expect("alerts");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["message"], "Low stock alert: Rangoli Colours (Stock: 4)");
    assert_eq!(alerts[0]["priority"], "critical");
}

#[tokio::test]
async fn dashboard_is_closed_to_cashiers() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/dashboard/kpi", None, Some(app.cashier_token()))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn managers_add_cashiers_with_temporary_passwords() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/staff",
            Some(json!({
                "first_name": "Anil",
                "last_name": "Kumar",
                "email": "anil.k@shop.test",
            })),
            Some(app.manager_token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = response_json(response).await["data"].clone();
    assert_eq!(created["staff"]["username"], "anil.k");
    assert_eq!(created["staff"]["role"], "cashier");
    let password = created["temporary_password"].as_str().unwrap().to_string();
    assert_eq!(password.len(), 12);

    let response = app
        .request(
            Method::POST,
            "/auth/cashier/login",
            Some(json!({ "username": "anil.k", "password": password })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::GET, "/api/v1/staff/summary", None, Some(app.admin_token()))
        .await;
    let summary = response_json(response).await["data"].clone();
    assert_eq!(summary["managers"], 1);
    assert_eq!(summary["cashiers"], 2);
    assert_eq!(summary["total_active_staff"], 3);

    let response = app
        .request(Method::GET, "/api/v1/staff", None, Some(app.admin_token()))
        .await;
    let staff = response_json(response).await["data"].clone();
    let usernames: Vec<&str> = staff
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["username"].as_str().unwrap())
        .collect();
    assert!(usernames.contains(&"anil.k"));
    assert!(usernames.contains(&"manager1"));
    assert!(!usernames.contains(&"admin1"));
}

#[tokio::test]
async fn oversized_prices_are_rejected_and_dashboard_stays_up() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "Gold Bar",
                "sku": "GLD-1",
                "price": "100000000000000000000",
                "in_stock": 2_000_000_000,
            })),
            Some(app.manager_token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let created = create_product(&app, "Silver Coin", "SLV-1", "Gifts", "80.00", 10).await;
    let id = created["id"].as_str().expect("id").to_string();
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{id}"),
            Some(json!({ "price": "-1" })),
            Some(app.manager_token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(Method::GET, "/api/v1/dashboard/kpi", None, Some(app.manager_token()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let kpi = response_json(response).await["data"].clone();
    assert_eq!(number(&kpi["inventory_value"]), 800.0);
}
