//! Integration tests for the payment return pages.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (sc-cli migrate)
//! - The storefront running (cargo run -p second-chance-storefront)

use reqwest::StatusCode;

use second_chance_core::{CustomerName, Email, OrderStatus};
use second_chance_integration_tests::{base_url, client, pool, seed_product};
use second_chance_storefront::db::{NewOrder, OrderRepository};

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_canceled_page_fails_pending_order() {
    let pool = pool().await;
    let product = seed_product(&pool).await;
    let email = Email::parse("cancel@example.com").expect("valid email");
    let name = CustomerName::parse("Ana Cancel").expect("valid name");

    let orders = OrderRepository::new(&pool);
    let order = orders
        .create(&NewOrder {
            product_id: Some(product.id),
            customer_email: &email,
            customer_name: &name,
            amount: product.price,
            special_offer: false,
        })
        .await
        .expect("Failed to insert order");
    assert_eq!(order.status, OrderStatus::Pending);

    let resp = client()
        .get(format!("{}/payment-canceled?order_id={}", base_url(), order.id))
        .send()
        .await
        .expect("Failed to load canceled page");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.expect("body").contains("Pago Cancelado"));

    let recent = orders.list_recent(50).await.expect("query");
    let stored = recent
        .iter()
        .find(|s| s.order.id == order.id)
        .expect("order listed");
    assert_eq!(stored.order.status, OrderStatus::Failed);
    assert_eq!(stored.product_name.as_deref(), Some(product.name.as_str()));
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_success_page_tolerates_unknown_session() {
    let resp = client()
        .get(format!("{}/payment-success?session_id=cs_test_unknown", base_url()))
        .send()
        .await
        .expect("Failed to load success page");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.expect("body").contains("¡Pago Exitoso!"));
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_canceled_page_ignores_malformed_order_id() {
    let resp = client()
        .get(format!("{}/payment-canceled?order_id=garbage", base_url()))
        .send()
        .await
        .expect("Failed to load canceled page");
    assert_eq!(resp.status(), StatusCode::OK);
}
