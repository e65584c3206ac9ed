mod support;

use chrono::Utc;
use common::{
    error::AppError,
    misc::{OrderStatus, PaymentStatus},
};
use db::{
    Filter,
    models::{company::Company, order_header::OrderHeader, shopping_cart::ShoppingCart},
    repository::EntityKey,
};
use support::{TestDb, category, product, user};

#[tokio::test]
async fn unsaved_changes_are_invisible_to_other_units_of_work() {
    let Some(db) = TestDb::migrated().await else {
        return;
    };

    let mut writer = db.unit_of_work();
    let mut reader = db.unit_of_work();
    writer.companies().add(Company::named(0, "Initech"));

    assert!(reader.companies().get_all(None, false).await.unwrap().is_empty());

    writer.save().await.unwrap();
    let companies = reader.companies().get_all(None, false).await.unwrap();
    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0].name, "Initech");

    db.teardown().await;
}

#[tokio::test]
async fn failed_save_rolls_back_everything_and_keeps_staged_changes() {
    let Some(db) = TestDb::migrated().await else {
        return;
    };

    let mut uow = db.unit_of_work();
    uow.companies().add(Company::named(0, "Globex"));
    uow.users().add(user("orphan@example.com", Some(999)));

    let err = uow.save().await.unwrap_err();
    assert!(matches!(err, AppError::Database(_)), "{err}");
    assert_eq!(uow.pending().len(), 2);

    let mut other = db.unit_of_work();
    assert!(other.companies().get_all(None, false).await.unwrap().is_empty());
    assert!(other.users().get_all(None, false).await.unwrap().is_empty());

    db.teardown().await;
}

#[tokio::test]
async fn company_and_user_commit_together() {
    let Some(db) = TestDb::migrated().await else {
        return;
    };

    let u1 = user("u1@example.com", Some(1));
    let mut uow = db.unit_of_work();
    uow.companies().add(Company::named(1, "Acme"));
    uow.users().add(u1.clone());
    let outcome = uow.save().await.unwrap();
    assert_eq!(outcome.rows_affected, 2);
    assert_eq!(
        outcome.inserted,
        vec![EntityKey::Int(1), EntityKey::Uuid(u1.id)]
    );

    let stored = uow.users().get_one(Filter::by_id(u1.id), true).await.unwrap();
    assert_eq!(stored.company_id, Some(1));
    assert_eq!(stored.company.map(|c| c.name).as_deref(), Some("Acme"));

    // the sequence moved past the explicit key
    uow.companies().add(Company::named(0, "Hooli"));
    let outcome = uow.save().await.unwrap();
    assert_eq!(outcome.first_inserted_id(), Some(2));

    db.teardown().await;
}

#[tokio::test]
async fn deleting_a_company_deletes_its_users() {
    let Some(db) = TestDb::migrated().await else {
        return;
    };

    let u1 = user("u1@example.com", Some(1));
    let independent = user("solo@example.com", None);
    let mut uow = db.unit_of_work();
    uow.companies().add(Company::named(1, "Acme"));
    uow.users().add(u1.clone());
    uow.users().add(independent.clone());
    uow.save().await.unwrap();

    uow.companies().remove(Company::named(1, "Acme"));
    uow.save().await.unwrap();

    let err = uow
        .users()
        .get_one(Filter::by_id(u1.id), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(uow.users().get_one(Filter::by_id(independent.id), false).await.is_ok());

    db.teardown().await;
}

#[tokio::test]
async fn updating_a_missing_row_fails_the_whole_save() {
    let Some(db) = TestDb::migrated().await else {
        return;
    };

    let mut uow = db.unit_of_work();
    uow.categories().add(category(0, "Fiction"));
    uow.categories().update(category(41, "Ghost"));

    let err = uow.save().await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "{err}");
    assert!(uow.categories().get_all(None, false).await.unwrap().is_empty());

    uow.discard();
    assert!(uow.save().await.unwrap().inserted.is_empty());

    db.teardown().await;
}

#[tokio::test]
async fn get_one_rejects_ambiguous_filters() {
    let Some(db) = TestDb::migrated().await else {
        return;
    };

    let mut uow = db.unit_of_work();
    uow.categories().add(category(1, "Fiction"));
    uow.products().add(product(1, 1));
    uow.products().add(product(2, 1));
    uow.save().await.unwrap();

    let err = uow
        .products()
        .get_one(Filter::new().eq("category_id", 1), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = uow
        .products()
        .get_one(Filter::new().eq("no_such_column", 1), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let with_category = uow.products().get_one(Filter::by_id(2), true).await.unwrap();
    assert_eq!(
        with_category.category.map(|c| c.name).as_deref(),
        Some("Fiction")
    );

    db.teardown().await;
}

#[tokio::test]
async fn staged_commands_update_carts_and_orders() {
    let Some(db) = TestDb::migrated().await else {
        return;
    };

    let buyer = user("buyer@example.com", None);
    let mut uow = db.unit_of_work();
    uow.categories().add(category(1, "Fiction"));
    uow.products().add(product(1, 1));
    uow.users().add(buyer.clone());
    uow.shopping_carts().add(ShoppingCart {
        id: 0,
        product_id: 1,
        count: 2,
        application_user_id: buyer.id,
        product: None,
    });
    uow.order_headers().add(OrderHeader {
        id: 0,
        application_user_id: buyer.id,
        order_date: Utc::now(),
        shipping_date: None,
        order_total: 70.0,
        order_status: Some(OrderStatus::Pending.to_string()),
        payment_status: Some(PaymentStatus::Pending.to_string()),
        tracking_number: None,
        carrier: None,
        payment_date: None,
        payment_due_date: None,
        session_id: None,
        payment_intent_id: None,
        phone_number: "555-0100".into(),
        street_address: "1 Main St".into(),
        city: "Springfield".into(),
        state: "IL".into(),
        postal_code: "62701".into(),
        name: "Buyer".into(),
        application_user: None,
    });
    let outcome = uow.save().await.unwrap();
    let cart_id = match outcome.inserted[3] {
        EntityKey::Int(id) => id,
        EntityKey::Uuid(_) => unreachable!(),
    };
    let order_id = match outcome.inserted[4] {
        EntityKey::Int(id) => id,
        EntityKey::Uuid(_) => unreachable!(),
    };

    uow.shopping_carts().update_count(cart_id, 60);
    uow.order_headers()
        .update_stripe_payment_id(order_id, Some("cs_test_1".into()), None);
    uow.save().await.unwrap();

    let carts = uow.shopping_carts().for_user(buyer.id).await.unwrap();
    assert_eq!(carts[0].count, 60);
    assert_eq!(carts[0].unit_price(), Some(30.0));

    let order = uow.order_headers().get_one(Filter::by_id(order_id), true).await.unwrap();
    assert_eq!(order.session_id.as_deref(), Some("cs_test_1"));
    assert!(order.payment_date.is_none());
    assert_eq!(
        order.application_user.map(|u| u.email).as_deref(),
        Some("buyer@example.com")
    );

    uow.order_headers()
        .update_stripe_payment_id(order_id, None, Some("pi_test_1".into()));
    uow.order_headers()
        .update_status(order_id, OrderStatus::Approved, Some(PaymentStatus::Approved));
    uow.save().await.unwrap();

    let order = uow.order_headers().get_one(Filter::by_id(order_id), false).await.unwrap();
    assert_eq!(order.session_id.as_deref(), Some("cs_test_1"));
    assert_eq!(order.payment_intent_id.as_deref(), Some("pi_test_1"));
    assert!(order.payment_date.is_some());
    assert_eq!(order.order_status.as_deref(), Some("Approved"));
    assert_eq!(order.payment_status.as_deref(), Some("Approved"));

    uow.order_headers().update_status(order_id, OrderStatus::Shipped, None);
    uow.save().await.unwrap();
    let order = uow.order_headers().get_one(Filter::by_id(order_id), false).await.unwrap();
    assert_eq!(order.order_status.as_deref(), Some("Shipped"));
    assert_eq!(order.payment_status.as_deref(), Some("Approved"));

    db.teardown().await;
}
