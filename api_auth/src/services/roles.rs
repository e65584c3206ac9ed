use common::{error::Res, misc::Role};
use sqlx::PgPool;

/// Makes sure every static role exists. Safe to run on every start.
pub async fn seed_roles(pool: &PgPool) -> Res<()> {
    for role in Role::ALL {
        if db::role::ensure_role(pool, role.as_str()).await? {
            log::info!("Created role {}", role);
        }
    }
    Ok(())
}
