use common::error::Res;
use sqlx::{Executor, Postgres};

use crate::{
    models::company::Company,
    repository::{Entity, EntityKey, Record},
};

impl Entity for Company {
    const TABLE: &'static str = "companies";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "street_address",
        "city",
        "state",
        "postal_code",
        "phone_number",
    ];

    fn key(&self) -> EntityKey {
        EntityKey::Int(self.id)
    }

    fn into_record(self) -> Record {
        Record::Company(self)
    }
}

pub async fn insert<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    company: &Company,
) -> Res<i32> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO companies (id, name, street_address, city, state, postal_code, phone_number)
        VALUES (COALESCE(NULLIF($1, 0), nextval(pg_get_serial_sequence('companies', 'id'))), $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(company.id)
    .bind(&company.name)
    .bind(&company.street_address)
    .bind(&company.city)
    .bind(&company.state)
    .bind(&company.postal_code)
    .bind(&company.phone_number)
    .fetch_one(executor)
    .await?;
    Ok(id)
}

pub async fn update<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    company: &Company,
) -> Res<u64> {
    let result = sqlx::query(
        r#"
        UPDATE companies
        SET name = $2, street_address = $3, city = $4, state = $5, postal_code = $6, phone_number = $7
        WHERE id = $1
        "#,
    )
    .bind(company.id)
    .bind(&company.name)
    .bind(&company.street_address)
    .bind(&company.city)
    .bind(&company.state)
    .bind(&company.postal_code)
    .bind(&company.phone_number)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
