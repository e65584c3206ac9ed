use common::error::Res;
use sqlx::{Executor, Postgres};

use crate::{
    models::category::Category,
    repository::{Entity, EntityKey, Record},
};

impl Entity for Category {
    const TABLE: &'static str = "categories";
    const COLUMNS: &'static [&'static str] = &["id", "name", "display_order"];
    const ORDER_BY: &'static str = "display_order, id";

    fn key(&self) -> EntityKey {
        EntityKey::Int(self.id)
    }

    fn into_record(self) -> Record {
        Record::Category(self)
    }
}

pub async fn insert<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    category: &Category,
) -> Res<i32> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO categories (id, name, display_order)
        VALUES (COALESCE(NULLIF($1, 0), nextval(pg_get_serial_sequence('categories', 'id'))), $2, $3)
        RETURNING id
        "#,
    )
    .bind(category.id)
    .bind(&category.name)
    .bind(category.display_order)
    .fetch_one(executor)
    .await?;
    Ok(id)
}

pub async fn update<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    category: &Category,
) -> Res<u64> {
    let result = sqlx::query("UPDATE categories SET name = $2, display_order = $3 WHERE id = $1")
        .bind(category.id)
        .bind(&category.name)
        .bind(category.display_order)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
