use std::collections::HashMap;

use common::error::Res;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    models::{product::Product, shopping_cart::ShoppingCart},
    repository::{
        Change, Command, Entity, EntityKey, Filter, Record, ShoppingCartRepository, fetch_by_ids,
    },
};

impl Entity for ShoppingCart {
    const TABLE: &'static str = "shopping_carts";
    const COLUMNS: &'static [&'static str] =
        &["id", "product_id", "count", "application_user_id"];

    fn key(&self) -> EntityKey {
        EntityKey::Int(self.id)
    }

    fn into_record(self) -> Record {
        Record::ShoppingCart(self)
    }

    async fn load_related(items: &mut [Self], pool: &PgPool) -> Res<()> {
        let ids = items.iter().map(|c| c.product_id).collect();
        let products: HashMap<i32, Product> = fetch_by_ids::<Product>(pool, ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        for cart in items.iter_mut() {
            cart.product = products.get(&cart.product_id).cloned();
        }
        Ok(())
    }
}

impl ShoppingCartRepository<'_> {
    /// Stages a quantity change without rewriting the other columns.
    pub fn update_count(&mut self, id: i32, count: i32) {
        self.stage(Change::Command(Command::CartCount { id, count }));
    }

    pub async fn for_user(&self, user_id: Uuid) -> Res<Vec<ShoppingCart>> {
        self.get_all(Some(Filter::new().eq("application_user_id", user_id)), true)
            .await
    }
}

pub async fn insert<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    cart: &ShoppingCart,
) -> Res<i32> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO shopping_carts (id, product_id, count, application_user_id)
        VALUES (COALESCE(NULLIF($1, 0), nextval(pg_get_serial_sequence('shopping_carts', 'id'))), $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(cart.id)
    .bind(cart.product_id)
    .bind(cart.count)
    .bind(cart.application_user_id)
    .fetch_one(executor)
    .await?;
    Ok(id)
}

pub async fn update<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    cart: &ShoppingCart,
) -> Res<u64> {
    let result = sqlx::query(
        "UPDATE shopping_carts SET product_id = $2, count = $3, application_user_id = $4 WHERE id = $1",
    )
    .bind(cart.id)
    .bind(cart.product_id)
    .bind(cart.count)
    .bind(cart.application_user_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn set_count<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    id: i32,
    count: i32,
) -> Res<u64> {
    let result = sqlx::query("UPDATE shopping_carts SET count = $2 WHERE id = $1")
        .bind(id)
        .bind(count)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
