//! Shopper journeys against a real database: registration, cart, checkout,
//! order history and reviews.

#![allow(clippy::unwrap_used)]

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;

use brokeshop_core::Role;
use brokeshop_integration_tests::{TestApp, create_account, decimal, seed_products};
use brokeshop_storefront::db::CartRepository;

const CHECKOUT_FORM: &[(&str, &str)] = &[
    ("full_name", "Alice Liddell"),
    ("phone", "+44 20 7946 0000"),
    ("country", "UK"),
    ("city", "Oxford"),
    ("street", "High Street"),
    ("building", "1"),
    ("apartment", ""),
    ("postal_code", "OX1 4AA"),
    ("card_number", "4111 1111 1111 1111"),
    ("card_holder", "ALICE LIDDELL"),
    ("expiry_date", "12/29"),
    ("cvv", "123"),
];

async fn signed_in(pool: &PgPool, username: &str, password: &str, role: Role) -> TestApp {
    create_account(pool, username, password, role).await;
    let mut app = TestApp::new(pool.clone());
    app.login(username, password).await.assert_redirect("/shop");
    app
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_register_cart_checkout_history(pool: PgPool) {
    let products = seed_products(&pool, 3).await;
    let third = products[2];
    let mut app = TestApp::new(pool);

    let response = app.register("alice", "a@x.com", "secret1").await;
    response.assert_redirect("/auth/login");
    assert!(response.success().is_some());

    let response = app.login("alice", "secret1").await;
    response.assert_redirect("/shop");
    assert_eq!(response.success().as_deref(), Some("Welcome, alice!"));

    let catalog = app.get("/shop").await.json();
    assert_eq!(catalog["viewer"]["username"], "alice");
    assert_eq!(catalog["products"].as_array().unwrap().len(), 3);

    app.post_form(&format!("/cart/add/{third}"), &[("quantity", "2")])
        .await
        .assert_redirect("/shop");
    app.post_form(&format!("/cart/add/{third}"), &[("quantity", "1")])
        .await
        .assert_redirect("/shop");

    let cart = app.get("/cart").await.json();
    let lines = cart["cart"]["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["quantity"], 3);
    assert_eq!(decimal(&cart["cart"]["total"]), Decimal::from(900));
    assert_eq!(app.get("/cart/count").await.json()["count"], 3);

    let response = app.post_form("/cart/checkout", CHECKOUT_FORM).await;
    response.assert_redirect("/cart/orders");
    assert!(response.success().unwrap().contains("900"));

    let cart = app.get("/cart").await.json();
    assert!(cart["cart"]["lines"].as_array().unwrap().is_empty());

    let history = app.get("/cart/orders").await.json();
    let orders = history["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["status"], "pending");
    assert_eq!(decimal(&orders[0]["total"]), Decimal::from(900));
    assert_eq!(orders[0]["items"][0]["quantity"], 3);
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_register_rejects_duplicates_and_mismatch(pool: PgPool) {
    let mut app = TestApp::new(pool);
    app.register("alice", "a@x.com", "secret1")
        .await
        .assert_redirect("/auth/login");

    let response = app.register("alice", "other@x.com", "secret1").await;
    response.assert_redirect("/auth/register");
    assert!(response.error().is_some());

    let response = app
        .post_form(
            "/auth/register",
            &[
                ("username", "bob"),
                ("email", "b@x.com"),
                ("password", "secret1"),
                ("confirm_password", "secret2"),
                ("privacy", "on"),
            ],
        )
        .await;
    response.assert_redirect("/auth/register");

    let response = app.login("alice", "wrong-password").await;
    response.assert_redirect("/auth/login");
    assert!(response.error().is_some());
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_cart_add_and_set(pool: PgPool) {
    let products = seed_products(&pool, 2).await;
    let mut app = signed_in(&pool, "alice", "secret1", Role::User).await;
    let first = products[0];

    // Missing quantity adds one.
    app.post_form(&format!("/cart/add/{first}"), &[]).await;
    assert_eq!(app.get("/cart/count").await.json()["count"], 1);

    let response = app
        .post_form(&format!("/cart/add/{first}"), &[("quantity", "0")])
        .await;
    response.assert_redirect("/shop");
    assert!(response.error().is_some());

    let response = app
        .post_form("/cart/add/9999", &[("quantity", "1")])
        .await;
    assert_eq!(response.error().as_deref(), Some("product not found"));

    app.post_form(&format!("/cart/update/{first}"), &[("quantity", "5")])
        .await
        .assert_redirect("/cart");
    assert_eq!(app.get("/cart/count").await.json()["count"], 5);

    app.post_form(&format!("/cart/update/{first}"), &[("quantity", "0")])
        .await
        .assert_redirect("/cart");
    assert_eq!(app.get("/cart/count").await.json()["count"], 0);

    app.post_form(&format!("/cart/add/{first}"), &[("quantity", "2")]).await;
    app.post_form("/cart/clear", &[]).await.assert_redirect("/cart");
    assert_eq!(app.get("/cart/count").await.json()["count"], 0);
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_checkout_rejects_empty_cart_and_bad_card(pool: PgPool) {
    let products = seed_products(&pool, 1).await;
    let mut app = signed_in(&pool, "alice", "secret1", Role::User).await;

    app.get("/cart/checkout").await.assert_redirect("/cart");
    let response = app.post_form("/cart/checkout", CHECKOUT_FORM).await;
    response.assert_redirect("/cart");
    assert!(response.error().is_some());

    app.post_form(&format!("/cart/add/{}", products[0]), &[("quantity", "1")])
        .await;
    let mut form = CHECKOUT_FORM.to_vec();
    form.retain(|(k, _)| *k != "card_number");
    form.push(("card_number", "1234"));
    let response = app.post_form("/cart/checkout", &form).await;
    response.assert_redirect("/cart/checkout");
    assert!(response.error().is_some());

    // Nothing was placed and the cart is intact.
    assert!(app.get("/cart/orders").await.json()["orders"]
        .as_array()
        .unwrap()
        .is_empty());
    assert_eq!(app.get("/cart/count").await.json()["count"], 1);
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_order_keeps_price_at_checkout(pool: PgPool) {
    let products = seed_products(&pool, 1).await;
    let product = products[0];
    let mut shopper = signed_in(&pool, "alice", "secret1", Role::User).await;
    let mut root = signed_in(&pool, "boss", "rootpass", Role::Root).await;

    shopper
        .post_form(&format!("/cart/add/{product}"), &[("quantity", "2")])
        .await;
    shopper
        .post_form("/cart/checkout", CHECKOUT_FORM)
        .await
        .assert_redirect("/cart/orders");

    root.post_form(
        &format!("/admin/products/{product}"),
        &[("name", "Product 1"), ("price", "999.99")],
    )
    .await
    .assert_redirect("/admin/products");

    let history = shopper.get("/cart/orders").await.json();
    let item = &history["orders"][0]["items"][0];
    assert_eq!(decimal(&item["unit_price"]), Decimal::from(100));
    assert_eq!(decimal(&history["orders"][0]["total"]), Decimal::from(200));

    let page = shopper.get(&format!("/shop/product/{product}")).await.json();
    assert_eq!(decimal(&page["product"]["price"]), "999.99".parse().unwrap());
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_search_by_text_and_category(pool: PgPool) {
    seed_products(&pool, 4).await;
    let mut app = signed_in(&pool, "alice", "secret1", Role::User).await;

    let found = app.get("/shop/search?q=product%203").await.json();
    let names: Vec<_> = found["products"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(names, vec!["Product 3"]);

    let found = app.get("/shop/search?category=Even").await.json();
    assert_eq!(found["products"].as_array().unwrap().len(), 2);
    assert_eq!(found["category"], "Even");
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_one_review_per_product(pool: PgPool) {
    let products = seed_products(&pool, 1).await;
    let uri = format!("/shop/product/{}/review", products[0]);
    let mut app = signed_in(&pool, "alice", "secret1", Role::User).await;

    let response = app
        .post_json(&uri, &json!({"rating": 5, "comment": "Lovely"}))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.json()["status"], "pending");

    let response = app.post_json(&uri, &json!({"rating": 4})).await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let page = app.get(&format!("/shop/product/{}", products[0])).await.json();
    assert_eq!(page["has_reviewed"], true);
    // Pending reviews are not shown.
    assert!(page["reviews"].as_array().unwrap().is_empty());
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_review_validation(pool: PgPool) {
    let products = seed_products(&pool, 1).await;
    let uri = format!("/shop/product/{}/review", products[0]);
    let mut app = signed_in(&pool, "alice", "secret1", Role::User).await;

    let response = app.post_json(&uri, &json!({"rating": 6})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app.post_json(&uri, &json!({"rating": 3, "comment": "ok"})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app.post_json("/shop/product/9999/review", &json!({"rating": 3})).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app.post_form(&uri, &[("rating", "five")]).await;
    response.assert_redirect(&format!("/shop/product/{}", products[0]));
    assert!(response.error().is_some());
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_moderation_publishes_review_once(pool: PgPool) {
    let products = seed_products(&pool, 1).await;
    let product = products[0];
    let mut shopper = signed_in(&pool, "alice", "secret1", Role::User).await;
    let mut admin = signed_in(&pool, "carol", "adminpass", Role::Admin).await;

    let review = shopper
        .post_json(
            &format!("/shop/product/{product}/review"),
            &json!({"rating": 4, "comment": "Tasty"}),
        )
        .await
        .json();
    let review_id = review["id"].as_i64().unwrap();

    // Shoppers cannot moderate.
    shopper
        .post_form(&format!("/admin/reviews/{review_id}/approve"), &[])
        .await
        .assert_redirect("/shop");

    let queue = admin.get("/admin/reviews").await.json();
    assert_eq!(queue["reviews"].as_array().unwrap().len(), 1);
    assert_eq!(queue["reviews"][0]["username"], "alice");

    let response = admin
        .post_form(&format!("/admin/reviews/{review_id}/approve"), &[])
        .await;
    response.assert_redirect("/admin/reviews");
    assert_eq!(response.success().as_deref(), Some("Review approved"));

    let response = admin
        .post_form(&format!("/admin/reviews/{review_id}/reject"), &[])
        .await;
    response.assert_redirect("/admin/reviews");
    assert!(response.error().is_some());

    let page = shopper.get(&format!("/shop/product/{product}")).await.json();
    assert_eq!(page["reviews"].as_array().unwrap().len(), 1);
    assert_eq!(page["rating"]["count"], 1);
    assert_eq!(decimal(&page["rating"]["average"]), Decimal::from(4));

    // Deleting needs root.
    let response = admin
        .post_form(&format!("/admin/reviews/{review_id}/delete"), &[])
        .await;
    response.assert_redirect("/shop");
}

async fn row_count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_cart_line_is_capped(pool: PgPool) {
    let products = seed_products(&pool, 1).await;
    let mut app = signed_in(&pool, "alice", "secret1", Role::User).await;
    let add = format!("/cart/add/{}", products[0]);

    let response = app.post_form(&add, &[("quantity", "2147483647")]).await;
    response.assert_redirect("/shop");
    assert_eq!(
        response.error().as_deref(),
        Some("quantity cannot exceed 10000, got 2147483647")
    );

    app.post_form(&add, &[("quantity", "10000")])
        .await
        .assert_redirect("/shop");
    let response = app.post_form(&add, &[("quantity", "1")]).await;
    response.assert_redirect("/shop");
    assert_eq!(
        response.error().as_deref(),
        Some("a cart line holds at most 10000 units")
    );
    assert_eq!(app.get("/cart/count").await.json()["count"], 10_000);

    // An oversized update is refused rather than treated as a removal.
    let response = app
        .post_form(
            &format!("/cart/update/{}", products[0]),
            &[("quantity", "10001")],
        )
        .await;
    response.assert_redirect("/cart");
    assert!(response.error().is_some());
    assert_eq!(app.get("/cart/count").await.json()["count"], 10_000);
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_checkout_total_over_ledger_limit_is_refused(pool: PgPool) {
    let products = seed_products(&pool, 1).await;
    sqlx::query("UPDATE shop.product SET price = 2000000 WHERE id = $1")
        .bind(products[0])
        .execute(&pool)
        .await
        .unwrap();
    let mut app = signed_in(&pool, "alice", "secret1", Role::User).await;

    app.post_form(
        &format!("/cart/add/{}", products[0]),
        &[("quantity", "10000")],
    )
    .await
    .assert_redirect("/shop");

    let response = app.post_form("/cart/checkout", CHECKOUT_FORM).await;
    response.assert_redirect("/cart/checkout");
    assert_eq!(
        response.error().as_deref(),
        Some("order total exceeds 9999999999.99")
    );
    assert_eq!(row_count(&pool, "shop.customer_order").await, 0);
    assert_eq!(app.get("/cart/count").await.json()["count"], 10_000);
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_checkout_failure_rolls_back_every_step(pool: PgPool) {
    let products = seed_products(&pool, 2).await;
    let mut app = signed_in(&pool, "alice", "secret1", Role::User).await;
    for product in &products {
        app.post_form(&format!("/cart/add/{product}"), &[("quantity", "2")])
            .await
            .assert_redirect("/shop");
    }

    // The payment insert is the last write before the cart is emptied.
    sqlx::query(
        "CREATE FUNCTION shop.reject_payment() RETURNS trigger LANGUAGE plpgsql AS $$
         BEGIN RAISE EXCEPTION 'payment rejected'; END $$",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TRIGGER reject_payment BEFORE INSERT ON shop.payment
         FOR EACH ROW EXECUTE FUNCTION shop.reject_payment()",
    )
    .execute(&pool)
    .await
    .unwrap();

    let response = app.post_form("/cart/checkout", CHECKOUT_FORM).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), "Internal server error");

    assert_eq!(row_count(&pool, "shop.customer_order").await, 0);
    assert_eq!(row_count(&pool, "shop.order_item").await, 0);
    assert_eq!(row_count(&pool, "shop.delivery_address").await, 0);
    assert_eq!(row_count(&pool, "shop.payment").await, 0);
    assert_eq!(row_count(&pool, "shop.cart_line").await, 2);
    assert_eq!(app.get("/cart/count").await.json()["count"], 4);
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_adds_all_count(pool: PgPool) {
    let product = seed_products(&pool, 1).await[0];
    let user = create_account(&pool, "alice", "secret1", Role::User).await;

    let adds: Vec<_> = (0..20)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { CartRepository::new(&pool).add(user, product, 2).await })
        })
        .collect();
    for add in adds {
        add.await.unwrap().unwrap();
    }

    let cart = CartRepository::new(&pool);
    assert_eq!(cart.count(user).await.unwrap(), 40);
    assert_eq!(cart.get(user).await.unwrap().lines.len(), 1);
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_script_form_review_gets_json(pool: PgPool) {
    let products = seed_products(&pool, 1).await;
    let mut app = signed_in(&pool, "alice", "secret1", Role::User).await;

    let request = Request::post(format!("/shop/product/{}/review", products[0]))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-requested-with", "XMLHttpRequest")
        .body(Body::from("rating=4&comment=Lovely+pie"))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status, StatusCode::CREATED);
    let review = response.json();
    assert_eq!(review["rating"], 4);
    assert_eq!(review["status"], "pending");
}
