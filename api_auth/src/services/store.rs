use std::{future::Future, str::FromStr, sync::Arc};

use common::{
    error::{AppError, Res},
    misc::Role,
};
use db::models::application_user::ApplicationUser;
use sqlx::PgPool;
use uuid::Uuid;

/// Persistence the identity services need.
pub trait UserStore: Send + Sync {
    fn find_by_email(&self, email: &str) -> impl Future<Output = Res<Option<ApplicationUser>>> + Send;

    fn find_by_id(&self, user_id: Uuid) -> impl Future<Output = Res<Option<ApplicationUser>>> + Send;

    fn roles(&self, user_id: Uuid) -> impl Future<Output = Res<Vec<Role>>> + Send;

    /// Inserts the user and its first role atomically.
    fn create(&self, user: &ApplicationUser, role: Role) -> impl Future<Output = Res<()>> + Send;

    fn confirm_email(&self, user_id: Uuid) -> impl Future<Output = Res<()>> + Send;

    /// Replaces the password hash and security stamp together.
    fn set_credentials(
        &self,
        user_id: Uuid,
        password_hash: &str,
        security_stamp: &str,
    ) -> impl Future<Output = Res<()>> + Send;
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: Arc<PgPool>,
}

impl PgUserStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        PgUserStore { pool }
    }
}

impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Res<Option<ApplicationUser>> {
        db::user::get_user_by_email(&*self.pool, email).await
    }

    async fn find_by_id(&self, user_id: Uuid) -> Res<Option<ApplicationUser>> {
        db::user::get_user_by_id(&*self.pool, user_id).await
    }

    async fn roles(&self, user_id: Uuid) -> Res<Vec<Role>> {
        let names = db::role::get_user_roles(&*self.pool, user_id).await?;
        Ok(names
            .iter()
            .filter_map(|name| match Role::from_str(name) {
                Ok(role) => Some(role),
                Err(_) => {
                    log::warn!("Ignoring unknown role '{}' of user {}", name, user_id);
                    None
                }
            })
            .collect())
    }

    async fn create(&self, user: &ApplicationUser, role: Role) -> Res<()> {
        let mut tx = self.pool.begin().await?;

        db::user::insert(&mut *tx, user.id, user)
            .await
            .map_err(|e| match e {
                AppError::Database(sqlx::Error::Database(db_err))
                    if db_err.is_unique_violation() =>
                {
                    AppError::Conflict(format!("Email '{}' is already taken", user.email))
                }
                AppError::Database(sqlx::Error::Database(db_err))
                    if db_err.is_foreign_key_violation() =>
                {
                    AppError::BadRequest("Unknown company".to_string())
                }
                other => other,
            })?;
        db::role::assign_role(&mut *tx, user.id, role.as_str()).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn confirm_email(&self, user_id: Uuid) -> Res<()> {
        match db::user::set_email_confirmed(&*self.pool, user_id).await? {
            0 => Err(AppError::NotFound(format!("User {} does not exist", user_id))),
            _ => Ok(()),
        }
    }

    async fn set_credentials(
        &self,
        user_id: Uuid,
        password_hash: &str,
        security_stamp: &str,
    ) -> Res<()> {
        match db::user::set_credentials(&*self.pool, user_id, password_hash, security_stamp).await? {
            0 => Err(AppError::NotFound(format!("User {} does not exist", user_id))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::{collections::HashMap, sync::Mutex};

    use super::*;

    /// In-process store for service and route tests.
    #[derive(Default)]
    pub struct MemoryUserStore {
        users: Mutex<HashMap<Uuid, (ApplicationUser, Vec<Role>)>>,
    }

    impl MemoryUserStore {
        pub fn with(user: ApplicationUser, roles: Vec<Role>) -> Self {
            let store = MemoryUserStore::default();
            store.users.lock().unwrap().insert(user.id, (user, roles));
            store
        }
    }

    impl UserStore for MemoryUserStore {
        async fn find_by_email(&self, email: &str) -> Res<Option<ApplicationUser>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .values()
                .find(|(u, _)| u.email.eq_ignore_ascii_case(email.trim()))
                .map(|(u, _)| u.clone()))
        }

        async fn find_by_id(&self, user_id: Uuid) -> Res<Option<ApplicationUser>> {
            Ok(self.users.lock().unwrap().get(&user_id).map(|(u, _)| u.clone()))
        }

        async fn roles(&self, user_id: Uuid) -> Res<Vec<Role>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .get(&user_id)
                .map(|(_, r)| r.clone())
                .unwrap_or_default())
        }

        async fn create(&self, user: &ApplicationUser, role: Role) -> Res<()> {
            let mut users = self.users.lock().unwrap();
            if users.values().any(|(u, _)| u.email.eq_ignore_ascii_case(&user.email)) {
                return Err(AppError::Conflict(format!("Email '{}' is already taken", user.email)));
            }
            users.insert(user.id, (user.clone(), vec![role]));
            Ok(())
        }

        async fn confirm_email(&self, user_id: Uuid) -> Res<()> {
            match self.users.lock().unwrap().get_mut(&user_id) {
                Some((user, _)) => {
                    user.email_confirmed = true;
                    Ok(())
                }
                None => Err(AppError::NotFound(format!("User {} does not exist", user_id))),
            }
        }

        async fn set_credentials(
            &self,
            user_id: Uuid,
            password_hash: &str,
            security_stamp: &str,
        ) -> Res<()> {
            match self.users.lock().unwrap().get_mut(&user_id) {
                Some((user, _)) => {
                    user.password_hash = password_hash.to_string();
                    user.security_stamp = security_stamp.to_string();
                    Ok(())
                }
                None => Err(AppError::NotFound(format!("User {} does not exist", user_id))),
            }
        }
    }
}
