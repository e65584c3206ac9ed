use std::sync::Arc;

use common::{
    error::{AppError, Res},
    misc::{OrderStatus, PaymentStatus},
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{
    ApplicationUserRepository, CategoryRepository, CompanyRepository, Entity, EntityKey,
    OrderDetailRepository, OrderHeaderRepository, ProductRepository, Repository,
    ShoppingCartRepository,
};
use crate::models::{
    application_user::ApplicationUser, category::Category, company::Company,
    order_detail::OrderDetail, order_header::OrderHeader, product::Product,
    shopping_cart::ShoppingCart,
};

/// An entity value captured at staging time.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Category(Category),
    Product(Product),
    Company(Company),
    ApplicationUser(ApplicationUser),
    ShoppingCart(ShoppingCart),
    OrderHeader(OrderHeader),
    OrderDetail(OrderDetail),
}

/// Targeted column updates that do not need the whole entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    OrderStatus {
        id: i32,
        order_status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    },
    OrderPayment {
        id: i32,
        session_id: Option<String>,
        payment_intent_id: Option<String>,
    },
    CartCount {
        id: i32,
        count: i32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Add(Record),
    Update(Record),
    Remove(Record),
    Command(Command),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveOutcome {
    pub rows_affected: u64,
    /// Keys of the inserted rows, in staging order.
    pub inserted: Vec<EntityKey>,
}

impl SaveOutcome {
    pub fn first_inserted_id(&self) -> Option<i32> {
        self.inserted.iter().find_map(|key| match key {
            EntityKey::Int(id) => Some(*id),
            EntityKey::Uuid(_) => None,
        })
    }
}

/// Request-scoped staging area shared by every repository of one request.
pub struct UnitOfWork {
    pool: Arc<PgPool>,
    pending: Vec<Change>,
}

impl UnitOfWork {
    pub fn new(pool: Arc<PgPool>) -> Self {
        UnitOfWork {
            pool,
            pending: Vec::new(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn repository<E: Entity>(&mut self) -> Repository<'_, E> {
        Repository::new(self)
    }

    pub fn categories(&mut self) -> CategoryRepository<'_> {
        self.repository()
    }

    pub fn products(&mut self) -> ProductRepository<'_> {
        self.repository()
    }

    pub fn companies(&mut self) -> CompanyRepository<'_> {
        self.repository()
    }

    pub fn users(&mut self) -> ApplicationUserRepository<'_> {
        self.repository()
    }

    pub fn shopping_carts(&mut self) -> ShoppingCartRepository<'_> {
        self.repository()
    }

    pub fn order_headers(&mut self) -> OrderHeaderRepository<'_> {
        self.repository()
    }

    pub fn order_details(&mut self) -> OrderDetailRepository<'_> {
        self.repository()
    }

    pub fn pending(&self) -> &[Change] {
        &self.pending
    }

    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn discard(&mut self) {
        self.pending.clear();
    }

    pub(crate) fn stage(&mut self, change: Change) {
        self.pending.push(change);
    }

    /// Applies every staged change in one transaction.
    ///
    /// On failure the transaction is rolled back and the staged changes are
    /// kept, so the caller can inspect or discard them.
    pub async fn save(&mut self) -> Res<SaveOutcome> {
        if self.pending.is_empty() {
            return Ok(SaveOutcome::default());
        }

        let mut tx = self.pool.begin().await?;
        let mut outcome = SaveOutcome::default();
        for change in &self.pending {
            if let Err(err) = change.apply(&mut tx, &mut outcome).await {
                log::warn!(
                    "Rolling back {} staged change(s): {}",
                    self.pending.len(),
                    err
                );
                if let Err(rollback) = tx.rollback().await {
                    log::error!("Rollback failed: {}", rollback);
                }
                return Err(err);
            }
        }
        tx.commit().await?;

        log::debug!(
            "Saved {} change(s), {} row(s) affected",
            self.pending.len(),
            outcome.rows_affected
        );
        self.pending.clear();
        Ok(outcome)
    }
}

impl Change {
    async fn apply(&self, conn: &mut PgConnection, outcome: &mut SaveOutcome) -> Res<()> {
        match self {
            Change::Add(record) => {
                let key = record.insert(conn).await?;
                outcome.rows_affected += 1;
                outcome.inserted.push(key);
            }
            Change::Update(record) => {
                let rows = record.update(conn).await?;
                outcome.rows_affected += expect_rows(rows, record.table(), record.key())?;
            }
            Change::Remove(record) => {
                let rows = record.delete(conn).await?;
                outcome.rows_affected += expect_rows(rows, record.table(), record.key())?;
            }
            Change::Command(command) => {
                let rows = command.run(conn).await?;
                outcome.rows_affected += expect_rows(rows, command.table(), command.key())?;
            }
        }
        Ok(())
    }
}

fn expect_rows(rows: u64, table: &str, key: EntityKey) -> Res<u64> {
    if rows == 0 {
        return Err(AppError::NotFound(format!(
            "No row in {} with key {:?}",
            table, key
        )));
    }
    Ok(rows)
}

impl Record {
    pub fn table(&self) -> &'static str {
        match self {
            Record::Category(_) => Category::TABLE,
            Record::Product(_) => Product::TABLE,
            Record::Company(_) => Company::TABLE,
            Record::ApplicationUser(_) => ApplicationUser::TABLE,
            Record::ShoppingCart(_) => ShoppingCart::TABLE,
            Record::OrderHeader(_) => OrderHeader::TABLE,
            Record::OrderDetail(_) => OrderDetail::TABLE,
        }
    }

    pub fn key(&self) -> EntityKey {
        match self {
            Record::Category(e) => e.key(),
            Record::Product(e) => e.key(),
            Record::Company(e) => e.key(),
            Record::ApplicationUser(e) => e.key(),
            Record::ShoppingCart(e) => e.key(),
            Record::OrderHeader(e) => e.key(),
            Record::OrderDetail(e) => e.key(),
        }
    }

    /// Inserts the row. Integer key `0` and the nil UUID mean "generate one".
    async fn insert(&self, conn: &mut PgConnection) -> Res<EntityKey> {
        let id = match self {
            Record::Category(e) => crate::category::insert(&mut *conn, e).await?,
            Record::Product(e) => crate::product::insert(&mut *conn, e).await?,
            Record::Company(e) => crate::company::insert(&mut *conn, e).await?,
            Record::ShoppingCart(e) => crate::shopping_cart::insert(&mut *conn, e).await?,
            Record::OrderHeader(e) => crate::order_header::insert(&mut *conn, e).await?,
            Record::OrderDetail(e) => crate::order_detail::insert(&mut *conn, e).await?,
            Record::ApplicationUser(e) => {
                let id = if e.id.is_nil() { Uuid::new_v4() } else { e.id };
                crate::user::insert(&mut *conn, id, e).await?;
                return Ok(EntityKey::Uuid(id));
            }
        };

        if self.key() != EntityKey::Int(0) {
            sync_sequence(conn, self.table()).await?;
        }
        Ok(EntityKey::Int(id))
    }

    async fn update(&self, conn: &mut PgConnection) -> Res<u64> {
        match self {
            Record::Category(e) => crate::category::update(conn, e).await,
            Record::Product(e) => crate::product::update(conn, e).await,
            Record::Company(e) => crate::company::update(conn, e).await,
            Record::ApplicationUser(e) => crate::user::update(conn, e).await,
            Record::ShoppingCart(e) => crate::shopping_cart::update(conn, e).await,
            Record::OrderHeader(e) => crate::order_header::update(conn, e).await,
            Record::OrderDetail(e) => crate::order_detail::update(conn, e).await,
        }
    }

    async fn delete(&self, conn: &mut PgConnection) -> Res<u64> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table());
        let query = sqlx::query(&sql);
        let query = match self.key() {
            EntityKey::Int(id) => query.bind(id),
            EntityKey::Uuid(id) => query.bind(id),
        };
        Ok(query.execute(conn).await?.rows_affected())
    }
}

impl Command {
    fn table(&self) -> &'static str {
        match self {
            Command::OrderStatus { .. } | Command::OrderPayment { .. } => OrderHeader::TABLE,
            Command::CartCount { .. } => ShoppingCart::TABLE,
        }
    }

    fn key(&self) -> EntityKey {
        match self {
            Command::OrderStatus { id, .. }
            | Command::OrderPayment { id, .. }
            | Command::CartCount { id, .. } => EntityKey::Int(*id),
        }
    }

    async fn run(&self, conn: &mut PgConnection) -> Res<u64> {
        match self {
            Command::OrderStatus {
                id,
                order_status,
                payment_status,
            } => crate::order_header::set_status(conn, *id, order_status, payment_status.as_ref())
                .await,
            Command::OrderPayment {
                id,
                session_id,
                payment_intent_id,
            } => {
                crate::order_header::set_payment_ids(
                    conn,
                    *id,
                    session_id.as_deref(),
                    payment_intent_id.as_deref(),
                )
                .await
            }
            Command::CartCount { id, count } => {
                crate::shopping_cart::set_count(conn, *id, *count).await
            }
        }
    }
}

/// Moves a serial sequence past rows inserted with explicit keys. Never
/// moves it backwards, so keys reserved but not yet inserted stay unique.
async fn sync_sequence(conn: &mut PgConnection, table: &str) -> Res<()> {
    let sql = format!(
        "SELECT setval(pg_get_serial_sequence('{0}', 'id'), GREATEST(\
            (SELECT MAX(id) FROM {0}), \
            pg_sequence_last_value(pg_get_serial_sequence('{0}', 'id')::regclass), \
            1))",
        table
    );
    sqlx::query(&sql).execute(conn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> Arc<PgPool> {
        Arc::new(
            PgPoolOptions::new()
                .connect_lazy("postgres://localhost/unused")
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn staging_does_not_touch_the_database() {
        let mut uow = UnitOfWork::new(lazy_pool());
        uow.companies().add(Company::named(1, "Acme"));
        uow.companies().remove(Company::named(2, "Globex"));
        uow.order_headers()
            .update_status(7, OrderStatus::Shipped, None);

        assert_eq!(uow.pending().len(), 3);
        assert!(matches!(
            &uow.pending()[0],
            Change::Add(Record::Company(c)) if c.name == "Acme"
        ));
        assert_eq!(
            uow.pending()[2],
            Change::Command(Command::OrderStatus {
                id: 7,
                order_status: OrderStatus::Shipped,
                payment_status: None,
            })
        );

        uow.discard();
        assert!(!uow.has_changes());
    }

    #[tokio::test]
    async fn saving_nothing_is_a_no_op() {
        let mut uow = UnitOfWork::new(lazy_pool());
        let outcome = uow.save().await.unwrap();
        assert_eq!(outcome, SaveOutcome::default());
    }

    #[test]
    fn first_inserted_id_skips_uuid_keys() {
        let outcome = SaveOutcome {
            rows_affected: 2,
            inserted: vec![EntityKey::Uuid(Uuid::nil()), EntityKey::Int(42)],
        };
        assert_eq!(outcome.first_inserted_id(), Some(42));
    }

    #[test]
    fn zero_rows_is_not_found() {
        let err = expect_rows(0, "companies", EntityKey::Int(9)).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(expect_rows(1, "companies", EntityKey::Int(9)).unwrap(), 1);
    }
}
