//! Back-office rules against a real database: role gates, user management,
//! catalog edits, order status and snapshots.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use axum::http::{StatusCode, header};
use chrono::Utc;
use serde_json::{Value, json};
use sqlx::PgPool;

use brokeshop_core::{Role, UserId};
use brokeshop_integration_tests::{TestApp, create_account, seed_products};
use brokeshop_storefront::db::UserRepository;
use brokeshop_storefront::models::CurrentUser;
use brokeshop_storefront::services::{AdminError, PrincipalCache, UserAdminService};

/// One app with a signed-in browser per `(username, role)`, all sharing the
/// same principal cache.
async fn browsers(pool: &PgPool, accounts: &[(&str, Role)]) -> Vec<TestApp> {
    let root = TestApp::new(pool.clone());
    let mut out = Vec::new();
    for (username, role) in accounts {
        create_account(pool, username, "password1", *role).await;
        let mut browser = root.new_browser();
        browser
            .login(username, "password1")
            .await
            .assert_redirect("/shop");
        out.push(browser);
    }
    out
}

fn user_id(users: &Value, username: &str) -> i64 {
    users["users"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["username"] == username)
        .and_then(|u| u["id"].as_i64())
        .unwrap()
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_shopper_cannot_enter_back_office(pool: PgPool) {
    let mut shopper = browsers(&pool, &[("alice", Role::User)]).await.remove(0);

    let response = shopper.get("/admin").await;
    response.assert_redirect("/shop");
    assert_eq!(
        response.error().as_deref(),
        Some("Access denied: insufficient privileges")
    );
    shopper.get("/admin/users").await.assert_redirect("/shop");
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_dashboard_counts(pool: PgPool) {
    seed_products(&pool, 3).await;
    let mut admin = browsers(&pool, &[("carol", Role::Admin)]).await.remove(0);

    let dashboard = admin.get("/admin").await.json();
    assert_eq!(dashboard["staff"]["username"], "carol");
    assert_eq!(dashboard["staff"]["is_root"], false);
    assert_eq!(dashboard["total_users"], 1);
    assert_eq!(dashboard["total_products"], 3);
    assert_eq!(dashboard["total_orders"], 0);
    assert_eq!(dashboard["pending_reviews"], 0);
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_admin_cannot_delete_root_or_self(pool: PgPool) {
    let mut tabs = browsers(&pool, &[("boss", Role::Root), ("carol", Role::Admin)]).await;
    let mut admin = tabs.remove(1);

    let users = admin.get("/admin/users").await.json();
    let root_id = user_id(&users, "boss");
    let own_id = user_id(&users, "carol");

    let response = admin
        .post_form(&format!("/admin/users/{root_id}/delete"), &[])
        .await;
    response.assert_redirect("/admin/users");
    assert_eq!(response.error().as_deref(), Some("insufficient privileges"));

    let response = admin
        .post_form(&format!("/admin/users/{own_id}/delete"), &[])
        .await;
    assert_eq!(
        response.error().as_deref(),
        Some("you cannot delete your own account")
    );

    let users = admin.get("/admin/users").await.json();
    assert_eq!(users["users"].as_array().unwrap().len(), 2);
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_admin_deletes_shopper_and_session_ends(pool: PgPool) {
    let mut tabs = browsers(&pool, &[("carol", Role::Admin), ("alice", Role::User)]).await;
    let mut shopper = tabs.remove(1);
    let mut admin = tabs.remove(0);

    let users = admin.get("/admin/users").await.json();
    let alice = user_id(&users, "alice");

    let response = admin
        .post_form(&format!("/admin/users/{alice}/delete"), &[])
        .await;
    response.assert_redirect("/admin/users");
    assert_eq!(response.success().as_deref(), Some("User deleted"));

    shopper.get("/shop").await.assert_redirect("/auth/login");
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_role_change_applies_to_live_session(pool: PgPool) {
    let mut tabs = browsers(&pool, &[("boss", Role::Root), ("alice", Role::User)]).await;
    let mut shopper = tabs.remove(1);
    let mut root = tabs.remove(0);

    shopper.get("/admin").await.assert_redirect("/shop");

    let users = root.get("/admin/users").await.json();
    let alice = user_id(&users, "alice");
    let response = root
        .post_form(&format!("/admin/users/{alice}/role"), &[("role", "admin")])
        .await;
    response.assert_redirect(&format!("/admin/users/{alice}"));
    assert_eq!(response.success().as_deref(), Some("alice is now admin"));

    assert_eq!(shopper.get("/admin").await.status, StatusCode::OK);

    // Admins cannot grant root.
    let users = shopper.get("/admin/users").await.json();
    let roles = users["assignable_roles"].as_array().unwrap();
    assert!(!roles.contains(&json!("root")));
    let response = shopper
        .post_form(&format!("/admin/users/{alice}/role"), &[("role", "root")])
        .await;
    assert!(response.error().is_some());

    let response = root
        .post_form(&format!("/admin/users/{alice}/role"), &[("role", "wizard")])
        .await;
    assert_eq!(response.error().as_deref(), Some("Unknown role"));
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_last_root_cannot_be_demoted(pool: PgPool) {
    let mut root = browsers(&pool, &[("boss", Role::Root)]).await.remove(0);

    let users = root.get("/admin/users").await.json();
    let own_id = user_id(&users, "boss");
    let response = root
        .post_form(&format!("/admin/users/{own_id}/role"), &[("role", "user")])
        .await;
    assert_eq!(response.error().as_deref(), Some("cannot demote the last root"));

    let detail = root.get(&format!("/admin/users/{own_id}")).await.json();
    assert_eq!(detail["user"]["role"], "root");
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_catalog_is_root_only(pool: PgPool) {
    let mut tabs = browsers(&pool, &[("boss", Role::Root), ("carol", Role::Admin)]).await;
    let mut admin = tabs.remove(1);
    let mut root = tabs.remove(0);

    admin.get("/admin/products").await.assert_redirect("/shop");

    let response = root
        .post_form(
            "/admin/products",
            &[
                ("name", "Pie"),
                ("description", "Apple"),
                ("price", "320"),
                ("category", "Desserts"),
                ("image", "pie.jpg"),
            ],
        )
        .await;
    response.assert_redirect("/admin/products");
    assert_eq!(response.success().as_deref(), Some("Added Pie"));

    let catalog = root.get("/admin/products").await.json();
    let product = &catalog["products"][0];
    assert_eq!(product["image"], "/images/pie.jpg");
    assert_eq!(catalog["categories"], json!(["Desserts"]));

    let id = product["id"].as_i64().unwrap();
    let response = root
        .post_form("/admin/products", &[("name", "Bad"), ("price", "-5")])
        .await;
    assert!(response.error().is_some());

    root.post_form(&format!("/admin/products/{id}/delete"), &[])
        .await
        .assert_redirect("/admin/products");
    let catalog = root.get("/admin/products").await.json();
    assert!(catalog["products"].as_array().unwrap().is_empty());
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_order_status_update(pool: PgPool) {
    let products = seed_products(&pool, 1).await;
    let mut tabs = browsers(&pool, &[("carol", Role::Admin), ("alice", Role::User)]).await;
    let mut shopper = tabs.remove(1);
    let mut admin = tabs.remove(0);

    shopper
        .post_form(&format!("/cart/add/{}", products[0]), &[("quantity", "1")])
        .await;
    shopper
        .post_form(
            "/cart/checkout",
            &[
                ("full_name", "Alice"),
                ("city", "Oxford"),
                ("street", "High Street"),
                ("card_number", "4111111111111111"),
                ("card_holder", "ALICE"),
                ("expiry_date", "01/30"),
                ("cvv", "321"),
            ],
        )
        .await
        .assert_redirect("/cart/orders");

    let orders = admin.get("/admin/orders").await.json();
    assert_eq!(orders["orders"][0]["username"], "alice");
    let order_id = orders["orders"][0]["id"].as_i64().unwrap();

    let response = admin
        .post_form(
            &format!("/admin/orders/{order_id}/status"),
            &[("status", "Bad Status!")],
        )
        .await;
    assert!(response.error().is_some());

    admin
        .post_form(
            &format!("/admin/orders/{order_id}/status"),
            &[("status", "delivered")],
        )
        .await
        .assert_redirect("/admin/orders");

    let history = shopper.get("/cart/orders").await.json();
    assert_eq!(history["orders"][0]["status"], "delivered");

    let dashboard = admin.get("/admin").await.json();
    assert_eq!(dashboard["paid_orders"], 1);
    assert_eq!(dashboard["pending_orders"], 0);
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_snapshot_export_and_import(pool: PgPool) {
    seed_products(&pool, 2).await;
    let mut tabs = browsers(&pool, &[("boss", Role::Root), ("carol", Role::Admin)]).await;
    let mut admin = tabs.remove(1);
    let mut root = tabs.remove(0);

    let response = admin.get("/admin/export").await;
    assert_eq!(response.status, StatusCode::OK);
    let disposition = response.headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"brokeshop-"));

    let mut snapshot = response.json();
    assert_eq!(snapshot["products"].as_array().unwrap().len(), 2);
    assert_eq!(snapshot["users"].as_array().unwrap().len(), 2);

    // Admins may export but not import.
    let response = admin.post_json("/admin/import", &snapshot).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    // A snapshot without a root account is refused.
    let mut rootless = snapshot.clone();
    rootless["users"]
        .as_array_mut()
        .unwrap()
        .retain(|u| u["role"] != "root");
    let response = root.post_json("/admin/import", &rootless).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    // Keep one product and both accounts.
    snapshot["products"].as_array_mut().unwrap().truncate(1);
    let response = root.post_json("/admin/import", &snapshot).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({"products": 1, "users": 2}));

    let catalog = root.get("/admin/products").await.json();
    assert_eq!(catalog["products"].as_array().unwrap().len(), 1);

    // Hashes were kept verbatim, so the old password still works.
    let mut fresh = root.new_browser();
    fresh.login("carol", "password1").await.assert_redirect("/shop");

    // New rows continue after the imported ids.
    seed_products(&pool, 1).await;
    let catalog = root.get("/admin/products").await.json();
    assert_eq!(catalog["products"].as_array().unwrap().len(), 2);
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_import_does_not_rebind_sessions_to_other_accounts(pool: PgPool) {
    let mut tabs = browsers(&pool, &[("boss", Role::Root), ("alice", Role::User)]).await;
    let mut shopper = tabs.remove(1);
    let mut root = tabs.remove(0);

    shopper.get("/admin").await.assert_redirect("/shop");

    // Alice's id now names a root account called eve.
    let mut snapshot = root.get("/admin/export").await.json();
    for user in snapshot["users"].as_array_mut().unwrap() {
        if user["username"] == "alice" {
            user["username"] = json!("eve");
            user["role"] = json!("root");
        }
    }
    let response = root.post_json("/admin/import", &snapshot).await;
    assert_eq!(response.status, StatusCode::OK);

    shopper.get("/admin").await.assert_redirect("/auth/login");
    shopper.get("/shop").await.assert_redirect("/auth/login");

    let dashboard = root.get("/admin").await.json();
    assert_eq!(dashboard["staff"]["username"], "boss");
}

/// Start `action` while another transaction holds bob's promotion to root
/// uncommitted, then commit the promotion.
async fn race_with_promotion<F, T>(pool: &PgPool, bob: UserId, action: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let mut promotion = pool.begin().await.unwrap();
    sqlx::query("UPDATE shop.user_account SET role = 'root' WHERE id = $1")
        .bind(bob)
        .execute(&mut *promotion)
        .await
        .unwrap();

    let commit = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        promotion.commit().await.unwrap();
    };
    let (result, ()) = tokio::join!(action, commit);
    result
}

async fn admin_actor(pool: &PgPool) -> CurrentUser {
    create_account(pool, "boss", "password1", Role::Root).await;
    let id = create_account(pool, "carol", "password1", Role::Admin).await;
    let user = UserRepository::new(pool).get_by_id(id).await.unwrap().unwrap();
    CurrentUser::from_user(&user, Utc::now())
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_delete_sees_concurrent_promotion(pool: PgPool) {
    let admin = admin_actor(&pool).await;
    let bob = create_account(&pool, "bob", "password1", Role::User).await;
    let principals = PrincipalCache::new();
    let service = UserAdminService::new(&pool, &principals);

    let result = race_with_promotion(&pool, bob, service.delete_user(&admin, bob)).await;

    assert!(matches!(result, Err(AdminError::InsufficientPrivilege)));
    let bob = UserRepository::new(&pool).get_by_id(bob).await.unwrap().unwrap();
    assert_eq!(bob.role, Role::Root);
}

#[sqlx::test(migrator = "brokeshop_storefront::db::MIGRATOR")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_demotion_sees_concurrent_promotion(pool: PgPool) {
    let admin = admin_actor(&pool).await;
    let bob = create_account(&pool, "bob", "password1", Role::User).await;
    let principals = PrincipalCache::new();
    let service = UserAdminService::new(&pool, &principals);

    let result =
        race_with_promotion(&pool, bob, service.update_role(&admin, bob, Role::User)).await;

    assert!(matches!(result, Err(AdminError::InsufficientPrivilege)));
    let bob = UserRepository::new(&pool).get_by_id(bob).await.unwrap().unwrap();
    assert_eq!(bob.role, Role::Root);
}
