use crate::models::{Customer, Movie, RentalRecord};
use crate::repository::{Repository, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    customers: HashMap<Uuid, Customer>,
    movies: HashMap<Uuid, Movie>,
    // Kept in insertion order so `find_rental` returns the first match.
    rentals: Vec<RentalRecord>,
}

/// MemoryRepository
///
/// In-memory `Repository` used for local runs without `DATABASE_URL` and for tests.
/// Not durable. Every paired write takes the single write lock for its whole
/// duration, which gives the same all-or-nothing behaviour as a Postgres transaction
/// within one process.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `StoreError::Unavailable`, to exercise
    /// the server-fault path.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn insert_customer(&self, customer: Customer) {
        self.tables.write().await.customers.insert(customer.id, customer);
    }

    pub async fn insert_movie(&self, movie: Movie) {
        self.tables.write().await.movies.insert(movie.id, movie);
    }

    /// Seeds a rental as-is, without touching stock.
    pub async fn insert_rental(&self, rental: RentalRecord) {
        self.tables.write().await.rentals.push(rental);
    }

    pub async fn rental_count(&self) -> usize {
        self.tables.read().await.rentals.len()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        self.check_available()?;
        Ok(self.tables.read().await.customers.get(&id).cloned())
    }

    async fn get_movie(&self, id: Uuid) -> StoreResult<Option<Movie>> {
        self.check_available()?;
        Ok(self.tables.read().await.movies.get(&id).cloned())
    }

    async fn checkout_rental(&self, rental: RentalRecord) -> StoreResult<RentalRecord> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        let movie = tables
            .movies
            .get_mut(&rental.movie.id)
            .ok_or(StoreError::MovieNotFound(rental.movie.id))?;
        if movie.number_in_stock <= 0 {
            return Err(StoreError::OutOfStock(movie.id));
        }
        movie.number_in_stock -= 1;

        tables.rentals.push(rental.clone());
        Ok(rental)
    }

    async fn settle_rental(
        &self,
        rental_id: Uuid,
        returned_at: DateTime<Utc>,
        fee: f64,
    ) -> StoreResult<RentalRecord> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        let rental = tables
            .rentals
            .iter_mut()
            .find(|r| r.id == rental_id)
            .ok_or(StoreError::RentalNotFound(rental_id))?;
        if rental.is_returned() {
            return Err(StoreError::AlreadyReturned(rental_id));
        }
        rental.return_time = Some(returned_at);
        rental.fee = Some(fee);
        let settled = rental.clone();

        match tables.movies.get_mut(&settled.movie.id) {
            Some(movie) => movie.number_in_stock += 1,
            None => {
                tracing::warn!(movie_id = %settled.movie.id, "returned rental references a missing movie")
            }
        }
        Ok(settled)
    }

    async fn find_rental(
        &self,
        customer_id: Uuid,
        movie_id: Uuid,
    ) -> StoreResult<Option<RentalRecord>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .rentals
            .iter()
            .find(|r| r.customer.id == customer_id && r.movie.id == movie_id)
            .cloned())
    }

    async fn list_rentals(&self) -> StoreResult<Vec<RentalRecord>> {
        self.check_available()?;
        let mut rentals = self.tables.read().await.rentals.clone();
        // Reverse first so that, among equal checkout times, later inserts come first.
        rentals.reverse();
        rentals.sort_by(|a, b| b.checkout_time.cmp(&a.checkout_time));
        Ok(rentals)
    }

    async fn get_rental(&self, id: Uuid) -> StoreResult<Option<RentalRecord>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.rentals.iter().find(|r| r.id == id).cloned())
    }

    async fn delete_rental(&self, id: Uuid) -> StoreResult<Option<RentalRecord>> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let position = tables.rentals.iter().position(|r| r.id == id);
        Ok(position.map(|index| tables.rentals.remove(index)))
    }
}
