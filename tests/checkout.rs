mod common;

use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use common::{cart_cookie, checkout_payload, spawn_app, TestApp};

async fn stocked_product(app: &TestApp, admin: &str, name: &str, price: i64, stock: i32) -> i32 {
    let category = app.create_category(admin, &format!("Categoría {name}")).await;
    app.create_product(admin, category, name, price, stock).await
}

#[tokio::test]
async fn guest_checkout_creates_order_and_decrements_stock() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let harina = stocked_product(&app, &admin, "Harina", 1300, 10).await;

    let added = app
        .post("/api/cart", None, json!({ "product_id": harina, "quantity": 3 }))
        .await;
    let cookie = cart_cookie(&added);

    let response = app
        .with_cart(Method::POST, "/api/checkout", &cookie)
        .json(&checkout_payload())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let order: Value = response.json().await.unwrap();
    assert_eq!(order["status"], "pending_payment");
    assert_eq!(order["status_label"], "Pendiente de Pago");
    assert_eq!(order["total"], 3900);
    assert!(order["customer_id"].is_null());
    assert_eq!(order["lines"][0]["quantity"], 3);
    assert_eq!(order["lines"][0]["purchase_price"], 1300);
    assert_eq!(order["lines"][0]["product_name"], "Harina");

    assert_eq!(app.product_stock(&admin, harina).await, 7);

    let cart: Value = app
        .with_cart(Method::GET, "/api/cart", &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["items"].as_array().unwrap().len(), 0, "cart is emptied");

    let order_id = order["id"].as_i64().unwrap();
    let tracked = app
        .get(
            &format!("/api/orders/track?order_id={order_id}&email=invitada@EXAMPLE.com"),
            None,
        )
        .await;
    assert_eq!(tracked.status(), StatusCode::OK);
    let tracked: Value = tracked.json().await.unwrap();
    assert_eq!(tracked["status"], "pending_payment");

    let wrong_email = app
        .get(
            &format!("/api/orders/track?order_id={order_id}&email=otra@example.com"),
            None,
        )
        .await;
    assert_eq!(wrong_email.status(), StatusCode::NOT_FOUND);

    let other_local_case = app
        .get(
            &format!("/api/orders/track?order_id={order_id}&email=Invitada@example.com"),
            None,
        )
        .await;
    assert_eq!(other_local_case.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn checkout_rejects_empty_cart_missing_contact_and_webpay() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let azucar = stocked_product(&app, &admin, "Azúcar", 1200, 5).await;

    let empty = app.post("/api/checkout", None, checkout_payload()).await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let added = app
        .post("/api/cart", None, json!({ "product_id": azucar, "quantity": 1 }))
        .await;
    let cookie = cart_cookie(&added);

    let mut anonymous = checkout_payload();
    anonymous.as_object_mut().unwrap().remove("email");
    let response = app
        .with_cart(Method::POST, "/api/checkout", &cookie)
        .json(&anonymous)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut webpay = checkout_payload();
    webpay["payment_method"] = json!("webpay");
    let response = app
        .with_cart(Method::POST, "/api/checkout", &cookie)
        .json(&webpay)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("not available yet"));

    assert_eq!(app.product_stock(&admin, azucar).await, 5);
}

#[tokio::test]
async fn checkout_fails_when_stock_dropped_below_the_cart() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.customer_token("Karen", "karen@example.com").await;
    let cafe = stocked_product(&app, &admin, "Café", 5500, 5).await;
    let te = stocked_product(&app, &admin, "Té", 2000, 5).await;

    app.post("/api/cart", Some(&token), json!({ "product_id": te, "quantity": 2 }))
        .await;
    app.post("/api/cart", Some(&token), json!({ "product_id": cafe, "quantity": 4 }))
        .await;
    app.patch(
        &format!("/api/admin/product/{cafe}"),
        Some(&admin),
        json!({ "stock": 2 }),
    )
    .await;

    let response = app
        .post(
            "/api/checkout",
            Some(&token),
            json!({ "address": "Los Aromos 12", "region": "Valparaíso", "commune": "Viña del Mar" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Café"));

    // Nothing was taken from either product.
    assert_eq!(app.product_stock(&admin, cafe).await, 2);
    assert_eq!(app.product_stock(&admin, te).await, 5);
    let orders: Vec<Value> = app.get("/api/orders", Some(&token)).await.json().await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn customer_orders_cancel_and_restock() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.customer_token("Luis", "luis@example.com").await;
    let other = app.customer_token("Marta", "marta@example.com").await;
    let miel = stocked_product(&app, &admin, "Miel", 7000, 4).await;

    app.post("/api/cart", Some(&token), json!({ "product_id": miel, "quantity": 4 }))
        .await;
    let response = app
        .post(
            "/api/checkout",
            Some(&token),
            json!({
                "address": "Calle Larga 100",
                "region": "Biobío",
                "commune": "Concepción",
                "notes": "Dejar en conserjería"
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order: Value = response.json().await.unwrap();
    let order_id = order["id"].as_i64().unwrap();
    // Contact data comes from the profile.
    assert_eq!(order["customer_name"], "Luis");
    assert_eq!(order["customer_email"], "luis@example.com");
    assert_eq!(app.product_stock(&admin, miel).await, 0);

    let mine: Vec<Value> = app.get("/api/orders", Some(&token)).await.json().await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(
        app.get(&format!("/api/orders/{order_id}"), Some(&other))
            .await
            .status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.post(&format!("/api/orders/{order_id}/cancel"), Some(&other), json!({}))
            .await
            .status(),
        StatusCode::NOT_FOUND
    );

    let detail: Value = app
        .get(&format!("/api/orders/{order_id}"), Some(&token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(detail["can_cancel"], true);

    let cancelled = app
        .post(&format!("/api/orders/{order_id}/cancel"), Some(&token), json!({}))
        .await;
    assert_eq!(cancelled.status(), StatusCode::OK);
    let cancelled: Value = cancelled.json().await.unwrap();
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(app.product_stock(&admin, miel).await, 4);

    let again = app
        .post(&format!("/api/orders/{order_id}/cancel"), Some(&token), json!({}))
        .await;
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn staff_moves_orders_along_the_lifecycle() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.customer_token("Nora", "nora@example.com").await;
    let nueces = stocked_product(&app, &admin, "Nueces", 9000, 10).await;

    app.post("/api/cart", Some(&token), json!({ "product_id": nueces, "quantity": 1 }))
        .await;
    let order: Value = app
        .post(
            "/api/checkout",
            Some(&token),
            json!({ "address": "Pasaje 3", "region": "Maule", "commune": "Talca" }),
        )
        .await
        .json()
        .await
        .unwrap();
    let order_id = order["id"].as_i64().unwrap();
    let status_url = format!("/api/admin/order/{order_id}/status");

    let skip = app
        .patch(&status_url, Some(&admin), json!({ "status": "shipped" }))
        .await;
    assert_eq!(skip.status(), StatusCode::BAD_REQUEST);

    let paid: Value = app
        .patch(&status_url, Some(&admin), json!({ "status": "paid" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(paid["status"], "paid");
    assert!(paid["paid_at"].is_string());

    app.patch(&status_url, Some(&admin), json!({ "status": "preparing" }))
        .await;

    // Too late to cancel once preparing.
    let cancel = app
        .post(&format!("/api/orders/{order_id}/cancel"), Some(&token), json!({}))
        .await;
    assert_eq!(cancel.status(), StatusCode::BAD_REQUEST);

    let shipped: Value = app
        .patch(
            &status_url,
            Some(&admin),
            json!({ "status": "shipped", "tracking_number": "CHX-123456" }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(shipped["tracking_number"], "CHX-123456");
    assert!(shipped["shipped_at"].is_string());

    let completed: Value = app
        .patch(&status_url, Some(&admin), json!({ "status": "completed" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(completed["status"], "completed");
    assert!(completed["delivered_at"].is_string());
    assert_eq!(completed["can_cancel"], false);

    let completed_orders: Vec<Value> = app
        .get("/api/admin/order?status=completed", Some(&admin))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(completed_orders.len(), 1);
    let pending: Vec<Value> = app
        .get("/api/admin/order?status=pending_payment", Some(&admin))
        .await
        .json()
        .await
        .unwrap();
    assert!(pending.is_empty());

    let tracked: Value = app
        .get(
            &format!("/api/orders/track?order_id={order_id}&email=nora@example.com"),
            None,
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(tracked["tracking_number"], "CHX-123456");
    assert_eq!(tracked["status_label"], "Completado");
}

#[tokio::test]
async fn ordered_products_cannot_be_deleted() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.customer_token("Olga", "olga@example.com").await;
    let vino = stocked_product(&app, &admin, "Vino", 6500, 3).await;
    let pisco = stocked_product(&app, &admin, "Pisco", 8000, 3).await;

    app.post("/api/cart", Some(&token), json!({ "product_id": vino, "quantity": 1 }))
        .await;
    let response = app
        .post(
            "/api/checkout",
            Some(&token),
            json!({ "address": "Av. Central 5", "region": "Coquimbo", "commune": "La Serena" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let blocked = app
        .delete(&format!("/api/admin/product/{vino}"), Some(&admin))
        .await;
    assert_eq!(blocked.status(), StatusCode::CONFLICT);

    let deleted = app
        .delete(&format!("/api/admin/product/{pisco}"), Some(&admin))
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
}

#[tokio::test]
async fn deactivated_customers_cannot_shop() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.customer_token("Pablo", "pablo@example.com").await;
    let queso = stocked_product(&app, &admin, "Queso", 4800, 5).await;

    let added = app
        .post("/api/cart", Some(&token), json!({ "product_id": queso, "quantity": 1 }))
        .await;
    assert_eq!(added.status(), StatusCode::CREATED);

    let profile: Value = app.get("/api/profile", Some(&token)).await.json().await.unwrap();
    let customer_id = profile["id"].as_i64().unwrap();
    let response = app
        .patch(
            &format!("/api/admin/customer/{customer_id}"),
            Some(&admin),
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        app.get("/api/profile", Some(&token)).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.get("/api/cart", Some(&token)).await.status(),
        StatusCode::UNAUTHORIZED
    );
    let response = app
        .post(
            "/api/checkout",
            Some(&token),
            json!({ "address": "Av. Perú 40", "region": "Valparaíso", "commune": "Viña del Mar" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.product_stock(&admin, queso).await, 5);
}
