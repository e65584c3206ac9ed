//! Repository capability set shared by every entity.
//!
//! Reads go straight to the pool. Writes are staged on the [`UnitOfWork`]
//! and reach the database only through [`UnitOfWork::save`], which applies
//! everything staged in one transaction.

use std::{future::Future, marker::PhantomData};

use common::error::{AppError, Res};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, postgres::PgRow};
use uuid::Uuid;

mod extract;
pub mod filter;
pub mod unit_of_work;

pub use filter::{Filter, FilterValue};
pub use unit_of_work::{Change, Command, Record, SaveOutcome, UnitOfWork};

use crate::models::{
    application_user::ApplicationUser, category::Category, company::Company,
    order_detail::OrderDetail, order_header::OrderHeader, product::Product,
    shopping_cart::ShoppingCart,
};

/// Primary key of a stored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum EntityKey {
    Int(i32),
    Uuid(Uuid),
}

/// A table-backed entity the generic repository can read and stage.
pub trait Entity: for<'r> FromRow<'r, PgRow> + Clone + Send + Sync + Unpin + 'static {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];
    const ORDER_BY: &'static str = "id";

    fn key(&self) -> EntityKey;

    fn into_record(self) -> Record;

    /// Fills navigation properties for a batch of loaded rows.
    fn load_related(
        _items: &mut [Self],
        _pool: &PgPool,
    ) -> impl Future<Output = Res<()>> + Send {
        async { Ok(()) }
    }
}

pub struct Repository<'u, E> {
    uow: &'u mut UnitOfWork,
    _entity: PhantomData<E>,
}

pub type CategoryRepository<'u> = Repository<'u, Category>;
pub type ProductRepository<'u> = Repository<'u, Product>;
pub type CompanyRepository<'u> = Repository<'u, Company>;
pub type ApplicationUserRepository<'u> = Repository<'u, ApplicationUser>;
pub type ShoppingCartRepository<'u> = Repository<'u, ShoppingCart>;
pub type OrderHeaderRepository<'u> = Repository<'u, OrderHeader>;
pub type OrderDetailRepository<'u> = Repository<'u, OrderDetail>;

impl<'u, E: Entity> Repository<'u, E> {
    pub(crate) fn new(uow: &'u mut UnitOfWork) -> Self {
        Repository {
            uow,
            _entity: PhantomData,
        }
    }

    pub async fn get_all(&self, filter: Option<Filter>, include_related: bool) -> Res<Vec<E>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT * FROM {}", E::TABLE));
        if let Some(filter) = &filter {
            filter.validate(E::COLUMNS)?;
            filter.push_where(&mut qb);
        }
        qb.push(" ORDER BY ").push(E::ORDER_BY);

        let mut items = qb
            .build_query_as::<E>()
            .fetch_all(self.uow.pool())
            .await?;
        if include_related && !items.is_empty() {
            E::load_related(&mut items, self.uow.pool()).await?;
        }
        Ok(items)
    }

    /// Exactly one match, otherwise `NotFound`.
    pub async fn get_one(&self, filter: Filter, include_related: bool) -> Res<E> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT * FROM {}", E::TABLE));
        filter.validate(E::COLUMNS)?;
        filter.push_where(&mut qb);
        qb.push(" LIMIT 2");

        let mut items = qb
            .build_query_as::<E>()
            .fetch_all(self.uow.pool())
            .await?;
        if items.len() != 1 {
            return Err(AppError::NotFound(format!(
                "Expected one row in {}, found {}",
                E::TABLE,
                if items.is_empty() { "none" } else { "several" }
            )));
        }
        if include_related {
            E::load_related(&mut items, self.uow.pool()).await?;
        }
        items
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("No row in {}", E::TABLE)))
    }

    pub fn add(&mut self, entity: E) {
        self.uow.stage(Change::Add(entity.into_record()));
    }

    pub fn update(&mut self, entity: E) {
        self.uow.stage(Change::Update(entity.into_record()));
    }

    pub fn remove(&mut self, entity: E) {
        self.uow.stage(Change::Remove(entity.into_record()));
    }

    pub fn remove_range(&mut self, entities: impl IntoIterator<Item = E>) {
        for entity in entities {
            self.remove(entity);
        }
    }

    /// Commits everything staged on the underlying unit of work, including
    /// changes staged through other repositories.
    pub async fn save(&mut self) -> Res<SaveOutcome> {
        self.uow.save().await
    }

    pub(crate) fn stage(&mut self, change: Change) {
        self.uow.stage(change);
    }

    pub(crate) fn pool(&self) -> &PgPool {
        self.uow.pool()
    }
}

/// Loads rows of `T` whose integer key is in `ids`.
pub(crate) async fn fetch_by_ids<T: Entity>(pool: &PgPool, mut ids: Vec<i32>) -> Res<Vec<T>> {
    ids.sort_unstable();
    ids.dedup();
    let sql = format!("SELECT * FROM {} WHERE id = ANY($1)", T::TABLE);
    Ok(sqlx::query_as::<_, T>(&sql).bind(ids).fetch_all(pool).await?)
}

/// Loads rows of `T` whose UUID key is in `ids`.
pub(crate) async fn fetch_by_uuids<T: Entity>(pool: &PgPool, mut ids: Vec<Uuid>) -> Res<Vec<T>> {
    ids.sort_unstable();
    ids.dedup();
    let sql = format!("SELECT * FROM {} WHERE id = ANY($1)", T::TABLE);
    Ok(sqlx::query_as::<_, T>(&sql).bind(ids).fetch_all(pool).await?)
}
