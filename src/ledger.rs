use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::RentalRecord,
    repository::{RepositoryState, StoreError},
};

/// LedgerError
///
/// Business outcomes of the rental lifecycle, plus the store faults that abort it.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("movie not found")]
    MovieNotFound,
    #[error("customer not found")]
    CustomerNotFound,
    #[error("no rental for this customer and movie")]
    RentalNotFound,
    #[error("movie not in stock")]
    OutOfStock,
    #[error("rental already processed")]
    AlreadyProcessed,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            // Conditional writes that lost a race surface as the business outcome.
            StoreError::OutOfStock(_) => LedgerError::OutOfStock,
            StoreError::MovieNotFound(_) => LedgerError::MovieNotFound,
            StoreError::AlreadyReturned(_) => LedgerError::AlreadyProcessed,
            StoreError::RentalNotFound(_) => LedgerError::RentalNotFound,
            other => LedgerError::Store(other),
        }
    }
}

/// Fee for a rental: whole elapsed days (truncated, never negative) times the daily rate.
pub fn rental_fee(checkout: DateTime<Utc>, returned: DateTime<Utc>, daily_rate: f64) -> f64 {
    let days = (returned - checkout).num_days().max(0);
    days as f64 * daily_rate
}

/// RentalLedger
///
/// Owns the checkout/return state machine. Identifiers are expected to be
/// reference-validated already; the ledger only checks business preconditions and
/// delegates each paired write to one atomic repository call.
#[derive(Clone)]
pub struct RentalLedger {
    repo: RepositoryState,
}

impl RentalLedger {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// checkout
    ///
    /// Snapshots the customer and movie into a new open rental and takes one copy off
    /// the shelf. The early stock check only avoids a pointless write; the
    /// authoritative check is the conditional decrement inside `checkout_rental`, so
    /// concurrent checkouts of the last copy produce exactly one success.
    pub async fn checkout(
        &self,
        customer_id: Uuid,
        movie_id: Uuid,
    ) -> Result<RentalRecord, LedgerError> {
        let movie = self
            .repo
            .get_movie(movie_id)
            .await?
            .ok_or(LedgerError::MovieNotFound)?;
        let customer = self
            .repo
            .get_customer(customer_id)
            .await?
            .ok_or(LedgerError::CustomerNotFound)?;

        if movie.number_in_stock <= 0 {
            tracing::info!(%movie_id, "checkout refused: out of stock");
            return Err(LedgerError::OutOfStock);
        }

        let rental = RentalRecord::open(&customer, &movie, Utc::now());
        let rental = self.repo.checkout_rental(rental).await?;

        tracing::info!(rental_id = %rental.id, %customer_id, %movie_id, "rental checked out");
        Ok(rental)
    }

    /// return_processing
    ///
    /// Closes the *first* rental recorded for the pair. That match ignores return
    /// status, so a pair rented twice keeps hitting the first (already closed) record
    /// and reports `AlreadyProcessed`.
    pub async fn return_processing(
        &self,
        customer_id: Uuid,
        movie_id: Uuid,
    ) -> Result<RentalRecord, LedgerError> {
        let rental = self
            .repo
            .find_rental(customer_id, movie_id)
            .await?
            .ok_or(LedgerError::RentalNotFound)?;

        if rental.is_returned() {
            return Err(LedgerError::AlreadyProcessed);
        }

        let returned_at = Utc::now();
        let fee = rental_fee(rental.checkout_time, returned_at, rental.movie.daily_rental_rate);
        let rental = self.repo.settle_rental(rental.id, returned_at, fee).await?;

        tracing::info!(rental_id = %rental.id, fee, "rental returned");
        Ok(rental)
    }
}
