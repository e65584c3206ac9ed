use std::collections::HashMap;

use common::error::Res;
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    models::{order_detail::OrderDetail, product::Product},
    repository::{Entity, EntityKey, Record, fetch_by_ids},
};

impl Entity for OrderDetail {
    const TABLE: &'static str = "order_details";
    const COLUMNS: &'static [&'static str] =
        &["id", "order_header_id", "product_id", "count", "price"];

    fn key(&self) -> EntityKey {
        EntityKey::Int(self.id)
    }

    fn into_record(self) -> Record {
        Record::OrderDetail(self)
    }

    async fn load_related(items: &mut [Self], pool: &PgPool) -> Res<()> {
        let ids = items.iter().map(|d| d.product_id).collect();
        let products: HashMap<i32, Product> = fetch_by_ids::<Product>(pool, ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        for detail in items.iter_mut() {
            detail.product = products.get(&detail.product_id).cloned();
        }
        Ok(())
    }
}

pub async fn insert<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    detail: &OrderDetail,
) -> Res<i32> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO order_details (id, order_header_id, product_id, count, price)
        VALUES (COALESCE(NULLIF($1, 0), nextval(pg_get_serial_sequence('order_details', 'id'))), $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(detail.id)
    .bind(detail.order_header_id)
    .bind(detail.product_id)
    .bind(detail.count)
    .bind(detail.price)
    .fetch_one(executor)
    .await?;
    Ok(id)
}

pub async fn update<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    detail: &OrderDetail,
) -> Res<u64> {
    let result = sqlx::query(
        "UPDATE order_details SET order_header_id = $2, product_id = $3, count = $4, price = $5 WHERE id = $1",
    )
    .bind(detail.id)
    .bind(detail.order_header_id)
    .bind(detail.product_id)
    .bind(detail.count)
    .bind(detail.price)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
