use std::collections::HashMap;

use common::error::Res;
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    models::{category::Category, product::Product},
    repository::{Entity, EntityKey, Record, fetch_by_ids},
};

impl Entity for Product {
    const TABLE: &'static str = "products";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title",
        "description",
        "isbn",
        "author",
        "list_price",
        "price",
        "price50",
        "price100",
        "category_id",
        "image_url",
    ];

    fn key(&self) -> EntityKey {
        EntityKey::Int(self.id)
    }

    fn into_record(self) -> Record {
        Record::Product(self)
    }

    async fn load_related(items: &mut [Self], pool: &PgPool) -> Res<()> {
        let ids = items.iter().map(|p| p.category_id).collect();
        let categories: HashMap<i32, Category> = fetch_by_ids::<Category>(pool, ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        for product in items.iter_mut() {
            product.category = categories.get(&product.category_id).cloned();
        }
        Ok(())
    }
}

pub async fn insert<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    product: &Product,
) -> Res<i32> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO products
            (id, title, description, isbn, author, list_price, price, price50, price100, category_id, image_url)
        VALUES
            (COALESCE(NULLIF($1, 0), nextval(pg_get_serial_sequence('products', 'id'))),
             $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id
        "#,
    )
    .bind(product.id)
    .bind(&product.title)
    .bind(&product.description)
    .bind(&product.isbn)
    .bind(&product.author)
    .bind(product.list_price)
    .bind(product.price)
    .bind(product.price50)
    .bind(product.price100)
    .bind(product.category_id)
    .bind(&product.image_url)
    .fetch_one(executor)
    .await?;
    Ok(id)
}

/// Leaves `image_url` alone when the new value is `None`, so an edit without
/// a new upload keeps the current image.
pub async fn update<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    product: &Product,
) -> Res<u64> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET title = $2, description = $3, isbn = $4, author = $5, list_price = $6,
            price = $7, price50 = $8, price100 = $9, category_id = $10,
            image_url = COALESCE($11, image_url)
        WHERE id = $1
        "#,
    )
    .bind(product.id)
    .bind(&product.title)
    .bind(&product.description)
    .bind(&product.isbn)
    .bind(&product.author)
    .bind(product.list_price)
    .bind(product.price)
    .bind(product.price50)
    .bind(product.price100)
    .bind(product.category_id)
    .bind(&product.image_url)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
