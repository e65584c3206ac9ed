use std::collections::HashMap;

use common::error::{AppError, Res};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    models::{
        application_user::{ApplicationUser, normalize_email},
        company::Company,
    },
    repository::{Entity, EntityKey, Record, fetch_by_ids},
};

impl Entity for ApplicationUser {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "email",
        "normalized_email",
        "email_confirmed",
        "name",
        "street_address",
        "city",
        "state",
        "postal_code",
        "phone_number",
        "company_id",
        "created_at",
    ];
    const ORDER_BY: &'static str = "created_at, id";

    fn key(&self) -> EntityKey {
        EntityKey::Uuid(self.id)
    }

    fn into_record(self) -> Record {
        Record::ApplicationUser(self)
    }

    async fn load_related(items: &mut [Self], pool: &PgPool) -> Res<()> {
        let ids: Vec<i32> = items.iter().filter_map(|u| u.company_id).collect();
        if ids.is_empty() {
            return Ok(());
        }
        let companies: HashMap<i32, Company> = fetch_by_ids::<Company>(pool, ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        for user in items.iter_mut() {
            user.company = user.company_id.and_then(|id| companies.get(&id).cloned());
        }
        Ok(())
    }
}

pub async fn get_user_by_email<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    email: &str,
) -> Res<Option<ApplicationUser>> {
    sqlx::query_as::<_, ApplicationUser>("SELECT * FROM users WHERE normalized_email = $1")
        .bind(normalize_email(email))
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_user_by_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<ApplicationUser>> {
    sqlx::query_as::<_, ApplicationUser>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn insert<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    id: Uuid,
    user: &ApplicationUser,
) -> Res<()> {
    sqlx::query(
        r#"
        INSERT INTO users
            (id, email, normalized_email, password_hash, security_stamp, email_confirmed, name,
             street_address, city, state, postal_code, phone_number, company_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(id)
    .bind(&user.email)
    .bind(normalize_email(&user.email))
    .bind(&user.password_hash)
    .bind(&user.security_stamp)
    .bind(user.email_confirmed)
    .bind(&user.name)
    .bind(&user.street_address)
    .bind(&user.city)
    .bind(&user.state)
    .bind(&user.postal_code)
    .bind(&user.phone_number)
    .bind(user.company_id)
    .bind(user.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Profile and company update. Credentials and the security stamp only change
/// through the identity functions below.
pub async fn update<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user: &ApplicationUser,
) -> Res<u64> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET email = $2, normalized_email = $3, email_confirmed = $4, name = $5,
            street_address = $6, city = $7, state = $8, postal_code = $9,
            phone_number = $10, company_id = $11
        WHERE id = $1
        "#,
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(normalize_email(&user.email))
    .bind(user.email_confirmed)
    .bind(&user.name)
    .bind(&user.street_address)
    .bind(&user.city)
    .bind(&user.state)
    .bind(&user.postal_code)
    .bind(&user.phone_number)
    .bind(user.company_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn set_email_confirmed<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<u64> {
    let result = sqlx::query("UPDATE users SET email_confirmed = TRUE WHERE id = $1")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Replaces the password hash and rotates the security stamp, which
/// invalidates every token issued against the old stamp.
pub async fn set_credentials<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    password_hash: &str,
    security_stamp: &str,
) -> Res<u64> {
    let result =
        sqlx::query("UPDATE users SET password_hash = $2, security_stamp = $3 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .bind(security_stamp)
            .execute(executor)
            .await?;
    Ok(result.rows_affected())
}
