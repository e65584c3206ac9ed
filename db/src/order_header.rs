use std::collections::HashMap;

use common::{
    error::Res,
    misc::{OrderStatus, PaymentStatus},
};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    models::{application_user::ApplicationUser, order_header::OrderHeader},
    repository::{
        Change, Command, Entity, EntityKey, OrderHeaderRepository, Record, fetch_by_uuids,
    },
};

impl Entity for OrderHeader {
    const TABLE: &'static str = "order_headers";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "application_user_id",
        "order_date",
        "shipping_date",
        "order_total",
        "order_status",
        "payment_status",
        "tracking_number",
        "carrier",
        "payment_date",
        "payment_due_date",
        "session_id",
        "payment_intent_id",
        "phone_number",
        "street_address",
        "city",
        "state",
        "postal_code",
        "name",
    ];

    fn key(&self) -> EntityKey {
        EntityKey::Int(self.id)
    }

    fn into_record(self) -> Record {
        Record::OrderHeader(self)
    }

    async fn load_related(items: &mut [Self], pool: &PgPool) -> Res<()> {
        let ids: Vec<Uuid> = items.iter().map(|o| o.application_user_id).collect();
        let users: HashMap<Uuid, ApplicationUser> = fetch_by_uuids::<ApplicationUser>(pool, ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();
        for order in items.iter_mut() {
            order.application_user = users.get(&order.application_user_id).cloned();
        }
        Ok(())
    }
}

impl OrderHeaderRepository<'_> {
    /// Draws the next key from the header sequence so the header and its
    /// details can be staged together. Unused keys leave a gap.
    pub async fn reserve_id(&self) -> Res<i32> {
        let id = sqlx::query_scalar(
            "SELECT nextval(pg_get_serial_sequence('order_headers', 'id'))::INT",
        )
        .fetch_one(self.pool())
        .await?;
        Ok(id)
    }

    /// Stages a status change. `payment_status` of `None` keeps the stored one.
    pub fn update_status(
        &mut self,
        id: i32,
        order_status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) {
        self.stage(Change::Command(Command::OrderStatus {
            id,
            order_status,
            payment_status,
        }));
    }

    /// Stages the processor references for an order. Recording a payment
    /// intent also stamps the payment date.
    pub fn update_stripe_payment_id(
        &mut self,
        id: i32,
        session_id: Option<String>,
        payment_intent_id: Option<String>,
    ) {
        self.stage(Change::Command(Command::OrderPayment {
            id,
            session_id,
            payment_intent_id,
        }));
    }
}

pub async fn insert<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    order: &OrderHeader,
) -> Res<i32> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO order_headers
            (id, application_user_id, order_date, shipping_date, order_total, order_status,
             payment_status, tracking_number, carrier, payment_date, payment_due_date,
             session_id, payment_intent_id, phone_number, street_address, city, state,
             postal_code, name)
        VALUES
            (COALESCE(NULLIF($1, 0), nextval(pg_get_serial_sequence('order_headers', 'id'))),
             $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        RETURNING id
        "#,
    )
    .bind(order.id)
    .bind(order.application_user_id)
    .bind(order.order_date)
    .bind(order.shipping_date)
    .bind(order.order_total)
    .bind(&order.order_status)
    .bind(&order.payment_status)
    .bind(&order.tracking_number)
    .bind(&order.carrier)
    .bind(order.payment_date)
    .bind(order.payment_due_date)
    .bind(&order.session_id)
    .bind(&order.payment_intent_id)
    .bind(&order.phone_number)
    .bind(&order.street_address)
    .bind(&order.city)
    .bind(&order.state)
    .bind(&order.postal_code)
    .bind(&order.name)
    .fetch_one(executor)
    .await?;
    Ok(id)
}

pub async fn update<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    order: &OrderHeader,
) -> Res<u64> {
    let result = sqlx::query(
        r#"
        UPDATE order_headers
        SET application_user_id = $2, order_date = $3, shipping_date = $4, order_total = $5,
            order_status = $6, payment_status = $7, tracking_number = $8, carrier = $9,
            payment_date = $10, payment_due_date = $11, session_id = $12,
            payment_intent_id = $13, phone_number = $14, street_address = $15, city = $16,
            state = $17, postal_code = $18, name = $19
        WHERE id = $1
        "#,
    )
    .bind(order.id)
    .bind(order.application_user_id)
    .bind(order.order_date)
    .bind(order.shipping_date)
    .bind(order.order_total)
    .bind(&order.order_status)
    .bind(&order.payment_status)
    .bind(&order.tracking_number)
    .bind(&order.carrier)
    .bind(order.payment_date)
    .bind(order.payment_due_date)
    .bind(&order.session_id)
    .bind(&order.payment_intent_id)
    .bind(&order.phone_number)
    .bind(&order.street_address)
    .bind(&order.city)
    .bind(&order.state)
    .bind(&order.postal_code)
    .bind(&order.name)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn set_status<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    id: i32,
    order_status: &OrderStatus,
    payment_status: Option<&PaymentStatus>,
) -> Res<u64> {
    let result = sqlx::query(
        r#"
        UPDATE order_headers
        SET order_status = $2, payment_status = COALESCE($3, payment_status)
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(order_status.as_str())
    .bind(payment_status.map(|s| s.as_str()))
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn set_payment_ids<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    id: i32,
    session_id: Option<&str>,
    payment_intent_id: Option<&str>,
) -> Res<u64> {
    let result = sqlx::query(
        r#"
        UPDATE order_headers
        SET session_id = COALESCE($2, session_id),
            payment_intent_id = COALESCE($3, payment_intent_id),
            payment_date = CASE WHEN $3::TEXT IS NULL THEN payment_date ELSE now() END
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(session_id)
    .bind(payment_intent_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
