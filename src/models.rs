use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Catalog Entities (read by the ledger) ---

/// Customer
///
/// A customer record from the `customers` table. The ledger only reads it in order
/// to copy its fields into a rental snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    // Gold customers are flagged on the snapshot; pricing does not depend on it.
    pub is_gold: bool,
    pub phone: String,
}

/// Movie
///
/// A movie record from the `movies` table. `number_in_stock` is the stock counter:
/// it is only ever changed by checkout (-1) and return (+1) and never drops below zero.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub number_in_stock: i32,
    pub daily_rental_rate: f64,
}

// --- Rental Records ---

/// CustomerSnapshot
///
/// By-value copy of the customer's fields taken at checkout time.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CustomerSnapshot {
    pub id: Uuid,
    pub name: String,
    pub is_gold: bool,
    pub phone: String,
}

impl From<&Customer> for CustomerSnapshot {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id,
            name: customer.name.clone(),
            is_gold: customer.is_gold,
            phone: customer.phone.clone(),
        }
    }
}

/// MovieSnapshot
///
/// By-value copy of the movie's title and rate taken at checkout time. Later price
/// changes on the movie do not affect the fee of an open rental.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MovieSnapshot {
    pub id: Uuid,
    pub title: String,
    pub daily_rental_rate: f64,
}

impl From<&Movie> for MovieSnapshot {
    fn from(movie: &Movie) -> Self {
        Self {
            id: movie.id,
            title: movie.title.clone(),
            daily_rental_rate: movie.daily_rental_rate,
        }
    }
}

/// RentalRecord
///
/// The audit artifact produced by checkout and closed by return processing.
///
/// Invariants:
/// - `fee` is `Some` if and only if `return_time` is `Some`.
/// - Once `return_time` is set it is never cleared or changed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RentalRecord {
    pub id: Uuid,
    pub customer: CustomerSnapshot,
    pub movie: MovieSnapshot,
    #[ts(type = "string")]
    pub checkout_time: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub return_time: Option<DateTime<Utc>>,
    pub fee: Option<f64>,
}

impl RentalRecord {
    /// Opens a new rental from the current catalog values.
    pub fn open(customer: &Customer, movie: &Movie, checkout_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer: customer.into(),
            movie: movie.into(),
            checkout_time,
            return_time: None,
            fee: None,
        }
    }

    /// True once return processing has closed the rental.
    pub fn is_returned(&self) -> bool {
        self.return_time.is_some()
    }
}

// --- Request Payloads ---

/// RentalRequest
///
/// Input payload for both checkout (POST /api/rentals) and return (POST /api/returns).
/// Fields stay as raw strings so that missing or malformed ids surface as a 400
/// validation error rather than a generic deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RentalRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "3f2a8c1e-6b4d-4e1a-9c7f-1a2b3c4d5e6f")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "8d9e0f1a-2b3c-4d5e-8f7a-6b5c4d3e2f1a")]
    pub movie_id: Option<String>,
}

// --- Error Schema (Output) ---

/// ErrorResponse
///
/// JSON body of every non-2xx response. `code` is stable and machine-readable,
/// `message` is for humans.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}
