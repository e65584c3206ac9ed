use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

/// Creates the role if missing. Returns true when it was created.
pub async fn ensure_role<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    name: &str,
) -> Res<bool> {
    let result = sqlx::query("INSERT INTO roles (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
        .bind(name)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Adds the user to a role. Fails with `NotFound` when the role is unknown.
pub async fn assign_role<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    role_name: &str,
) -> Res<()> {
    let role_id: Option<i32> = sqlx::query_scalar(
        r#"
        WITH role AS (SELECT id FROM roles WHERE name = $2),
        inserted AS (
            INSERT INTO user_roles (user_id, role_id)
            SELECT $1, id FROM role
            ON CONFLICT (user_id, role_id) DO NOTHING
        )
        SELECT id FROM role
        "#,
    )
    .bind(user_id)
    .bind(role_name)
    .fetch_optional(executor)
    .await?;

    match role_id {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("Role '{}' does not exist", role_name))),
    }
}

pub async fn get_user_roles<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Vec<String>> {
    sqlx::query_scalar(
        r#"
        SELECT r.name FROM roles r
        JOIN user_roles ur ON ur.role_id = r.id
        WHERE ur.user_id = $1
        ORDER BY r.name
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}
