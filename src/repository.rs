use crate::models::{Customer, CustomerSnapshot, Movie, MovieSnapshot, RentalRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// StoreError
///
/// Failures reported by a `Repository`. The conditional-write outcomes
/// (`OutOfStock`, `AlreadyReturned`, ...) are expected results of the atomic
/// paired writes; `Unavailable` and `Database` are genuine faults.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("movie {0} not found")]
    MovieNotFound(Uuid),
    #[error("movie {0} has no stock left")]
    OutOfStock(Uuid),
    #[error("rental {0} not found")]
    RentalNotFound(Uuid),
    #[error("rental {0} was already returned")]
    AlreadyReturned(Uuid),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Repository Trait
///
/// The abstract keyed record store the rental ledger runs against. Handlers and the
/// ledger only see this contract, so the Postgres and in-memory backends are
/// interchangeable.
///
/// The two paired writes (`checkout_rental`, `settle_rental`) must each be atomic:
/// either both the rental change and the stock change become visible, or neither does.
///
/// **Send + Sync + async_trait** are required to share the trait object
/// (`Arc<dyn Repository>`) across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Catalog lookups ---
    async fn get_customer(&self, id: Uuid) -> StoreResult<Option<Customer>>;
    async fn get_movie(&self, id: Uuid) -> StoreResult<Option<Movie>>;

    // --- Rental lifecycle ---

    /// Persists `rental` and decrements the stock of `rental.movie.id` by one, atomically.
    /// The decrement is conditional on the stock being above zero; if it is not, nothing
    /// is written and `StoreError::OutOfStock` is returned.
    async fn checkout_rental(&self, rental: RentalRecord) -> StoreResult<RentalRecord>;

    /// Sets `return_time` and `fee` on an open rental and increments the movie stock by one,
    /// atomically. Fails with `StoreError::AlreadyReturned` if the rental was closed
    /// in the meantime.
    async fn settle_rental(
        &self,
        rental_id: Uuid,
        returned_at: DateTime<Utc>,
        fee: f64,
    ) -> StoreResult<RentalRecord>;

    /// First rental (in insertion order) for the pair, whether returned or not.
    async fn find_rental(&self, customer_id: Uuid, movie_id: Uuid)
    -> StoreResult<Option<RentalRecord>>;

    // --- Reads & administration ---

    /// All rentals, newest checkout first.
    async fn list_rentals(&self) -> StoreResult<Vec<RentalRecord>>;
    async fn get_rental(&self, id: Uuid) -> StoreResult<Option<RentalRecord>>;
    /// Plain remove-by-id. Stock is not touched. Returns the removed record, if any.
    async fn delete_rental(&self, id: Uuid) -> StoreResult<Option<RentalRecord>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// RentalRow
///
/// Flat database row for the `rentals` table. Snapshot columns are prefixed with
/// their owner (`customer_*`, `movie_*`).
#[derive(Debug, FromRow)]
struct RentalRow {
    id: Uuid,
    customer_id: Uuid,
    customer_name: String,
    customer_is_gold: bool,
    customer_phone: String,
    movie_id: Uuid,
    movie_title: String,
    movie_daily_rental_rate: f64,
    checked_out_at: DateTime<Utc>,
    returned_at: Option<DateTime<Utc>>,
    rental_fee: Option<f64>,
}

impl From<RentalRow> for RentalRecord {
    fn from(row: RentalRow) -> Self {
        RentalRecord {
            id: row.id,
            customer: CustomerSnapshot {
                id: row.customer_id,
                name: row.customer_name,
                is_gold: row.customer_is_gold,
                phone: row.customer_phone,
            },
            movie: MovieSnapshot {
                id: row.movie_id,
                title: row.movie_title,
                daily_rental_rate: row.movie_daily_rental_rate,
            },
            checkout_time: row.checked_out_at,
            return_time: row.returned_at,
            fee: row.rental_fee,
        }
    }
}

const RENTAL_COLUMNS: &str = "id, customer_id, customer_name, customer_is_gold, customer_phone, \
     movie_id, movie_title, movie_daily_rental_rate, checked_out_at, returned_at, rental_fee";

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. Paired writes run inside a
/// single transaction and rely on conditional `UPDATE ... WHERE` clauses instead of
/// read-then-write, so concurrent requests on the same movie cannot oversell it.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn movie_exists(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM movies WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, name, is_gold, phone FROM customers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(customer)
    }

    async fn get_movie(&self, id: Uuid) -> StoreResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>(
            "SELECT id, title, number_in_stock, daily_rental_rate FROM movies WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(movie)
    }

    /// checkout_rental
    ///
    /// Conditional decrement first, then the insert, both in one transaction. When the
    /// decrement matches no row we look again to tell a missing movie from an empty
    /// shelf; the transaction is dropped (rolled back) on every early return.
    async fn checkout_rental(&self, rental: RentalRecord) -> StoreResult<RentalRecord> {
        let mut tx = self.pool.begin().await?;
        let movie_id = rental.movie.id;

        let reserved = sqlx::query(
            "UPDATE movies SET number_in_stock = number_in_stock - 1 \
             WHERE id = $1 AND number_in_stock > 0",
        )
        .bind(movie_id)
        .execute(&mut *tx)
        .await?;

        if reserved.rows_affected() == 0 {
            return if Self::movie_exists(&mut tx, movie_id).await? {
                Err(StoreError::OutOfStock(movie_id))
            } else {
                Err(StoreError::MovieNotFound(movie_id))
            };
        }

        let row = sqlx::query_as::<_, RentalRow>(&format!(
            "INSERT INTO rentals ({RENTAL_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {RENTAL_COLUMNS}"
        ))
        .bind(rental.id)
        .bind(rental.customer.id)
        .bind(&rental.customer.name)
        .bind(rental.customer.is_gold)
        .bind(&rental.customer.phone)
        .bind(rental.movie.id)
        .bind(&rental.movie.title)
        .bind(rental.movie.daily_rental_rate)
        .bind(rental.checkout_time)
        .bind(rental.return_time)
        .bind(rental.fee)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// settle_rental
    ///
    /// `returned_at IS NULL` in the WHERE clause makes the close a one-shot update:
    /// a second concurrent return matches no row and reports `AlreadyReturned`.
    async fn settle_rental(
        &self,
        rental_id: Uuid,
        returned_at: DateTime<Utc>,
        fee: f64,
    ) -> StoreResult<RentalRecord> {
        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query_as::<_, RentalRow>(&format!(
            "UPDATE rentals SET returned_at = $2, rental_fee = $3 \
             WHERE id = $1 AND returned_at IS NULL \
             RETURNING {RENTAL_COLUMNS}"
        ))
        .bind(rental_id)
        .bind(returned_at)
        .bind(fee)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = closed else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM rentals WHERE id = $1)")
                    .bind(rental_id)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if exists {
                StoreError::AlreadyReturned(rental_id)
            } else {
                StoreError::RentalNotFound(rental_id)
            });
        };

        // A movie removed from the catalog after checkout leaves nothing to restock;
        // the rental is still closed.
        let restocked = sqlx::query(
            "UPDATE movies SET number_in_stock = number_in_stock + 1 WHERE id = $1",
        )
        .bind(row.movie_id)
        .execute(&mut *tx)
        .await?;
        if restocked.rows_affected() == 0 {
            tracing::warn!(movie_id = %row.movie_id, "returned rental references a missing movie");
        }

        tx.commit().await?;
        Ok(row.into())
    }

    async fn find_rental(
        &self,
        customer_id: Uuid,
        movie_id: Uuid,
    ) -> StoreResult<Option<RentalRecord>> {
        let row = sqlx::query_as::<_, RentalRow>(&format!(
            "SELECT {RENTAL_COLUMNS} FROM rentals \
             WHERE customer_id = $1 AND movie_id = $2 \
             ORDER BY seq ASC LIMIT 1"
        ))
        .bind(customer_id)
        .bind(movie_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_rentals(&self) -> StoreResult<Vec<RentalRecord>> {
        let rows = sqlx::query_as::<_, RentalRow>(&format!(
            "SELECT {RENTAL_COLUMNS} FROM rentals ORDER BY checked_out_at DESC, seq DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_rental(&self, id: Uuid) -> StoreResult<Option<RentalRecord>> {
        let row = sqlx::query_as::<_, RentalRow>(&format!(
            "SELECT {RENTAL_COLUMNS} FROM rentals WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn delete_rental(&self, id: Uuid) -> StoreResult<Option<RentalRecord>> {
        let row = sqlx::query_as::<_, RentalRow>(&format!(
            "DELETE FROM rentals WHERE id = $1 RETURNING {RENTAL_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }
}
