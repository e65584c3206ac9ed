#![allow(dead_code)]

use std::{str::FromStr, sync::Arc};

use db::{
    UnitOfWork,
    migrations::Migrator,
    models::{application_user::ApplicationUser, category::Category, product::Product},
};
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use uuid::Uuid;

/// A migrated schema of its own, so tests can run in parallel against one
/// database. Dropped by `teardown`.
pub struct TestDb {
    pub pool: Arc<PgPool>,
    admin: PgPool,
    schema: String,
}

impl TestDb {
    /// `None` when `DATABASE_URL` is unset; the caller returns early.
    pub async fn migrated() -> Option<TestDb> {
        let db = Self::empty().await?;
        Migrator::default().apply_pending(&db.pool).await.unwrap();
        Some(db)
    }

    pub async fn empty() -> Option<TestDb> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL is not set, skipping PostgreSQL test");
            return None;
        };

        let admin = PgPool::connect(&url).await.unwrap();
        let schema = format!("test_{}", Uuid::new_v4().simple());
        sqlx::query(&format!("CREATE SCHEMA {}", schema))
            .execute(&admin)
            .await
            .unwrap();

        let options = PgConnectOptions::from_str(&url)
            .unwrap()
            .options([("search_path", schema.as_str())]);
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .unwrap();

        Some(TestDb {
            pool: Arc::new(pool),
            admin,
            schema,
        })
    }

    pub fn unit_of_work(&self) -> UnitOfWork {
        UnitOfWork::new(self.pool.clone())
    }

    pub async fn teardown(self) {
        self.pool.close().await;
        sqlx::query(&format!("DROP SCHEMA {} CASCADE", self.schema))
            .execute(&self.admin)
            .await
            .unwrap();
    }
}

pub fn user(email: &str, company_id: Option<i32>) -> ApplicationUser {
    let mut user = ApplicationUser::new(email, "Test User");
    user.password_hash = "not-a-real-hash".to_string();
    user.security_stamp = Uuid::new_v4().to_string();
    user.company_id = company_id;
    user
}

pub fn category(id: i32, name: &str) -> Category {
    Category {
        id,
        name: name.to_string(),
        display_order: id,
    }
}

pub fn product(id: i32, category_id: i32) -> Product {
    Product {
        id,
        title: format!("Book {}", id),
        description: None,
        isbn: format!("ISBN{:06}", id),
        author: "Ada Writer".to_string(),
        list_price: 40.0,
        price: 35.0,
        price50: 30.0,
        price100: 25.0,
        category_id,
        image_url: None,
        category: None,
    }
}
