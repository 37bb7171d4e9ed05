use chrono::{Duration, Utc};
use movie_rentals::{
    ledger::{LedgerError, RentalLedger},
    memory::MemoryRepository,
    models::{Customer, Movie, RentalRecord},
    repository::Repository,
};
use std::sync::Arc;
use uuid::Uuid;

// --- Fixtures ---

struct Shop {
    repo: Arc<MemoryRepository>,
    ledger: RentalLedger,
    customer: Customer,
    movie: Movie,
}

async fn shop_with_stock(stock: i32) -> Shop {
    let repo = Arc::new(MemoryRepository::new());
    let customer = Customer {
        id: Uuid::new_v4(),
        name: "Ada Lovelace".to_string(),
        is_gold: true,
        phone: "123456789".to_string(),
    };
    let movie = Movie {
        id: Uuid::new_v4(),
        title: "Metropolis".to_string(),
        number_in_stock: stock,
        daily_rental_rate: 2.0,
    };
    repo.insert_customer(customer.clone()).await;
    repo.insert_movie(movie.clone()).await;

    Shop {
        ledger: RentalLedger::new(repo.clone()),
        repo,
        customer,
        movie,
    }
}

async fn stock_of(repo: &MemoryRepository, movie_id: Uuid) -> i32 {
    repo.get_movie(movie_id).await.unwrap().unwrap().number_in_stock
}

// --- Checkout ---

#[tokio::test]
async fn checkout_creates_open_rental_and_decrements_stock() {
    let shop = shop_with_stock(10).await;

    let rental = shop.ledger.checkout(shop.customer.id, shop.movie.id).await.unwrap();

    assert_eq!(rental.customer.id, shop.customer.id);
    assert_eq!(rental.customer.name, "Ada Lovelace");
    assert!(rental.customer.is_gold);
    assert_eq!(rental.movie.title, "Metropolis");
    assert_eq!(rental.movie.daily_rental_rate, 2.0);
    assert!(rental.return_time.is_none());
    assert!(rental.fee.is_none());
    assert!(Utc::now() - rental.checkout_time < Duration::seconds(10));

    assert_eq!(stock_of(&shop.repo, shop.movie.id).await, 9);
    let stored = shop.repo.get_rental(rental.id).await.unwrap();
    assert_eq!(stored, Some(rental));
}

#[tokio::test]
async fn checkout_out_of_stock_has_no_side_effects() {
    let shop = shop_with_stock(0).await;

    let result = shop.ledger.checkout(shop.customer.id, shop.movie.id).await;

    assert!(matches!(result, Err(LedgerError::OutOfStock)));
    assert_eq!(shop.repo.rental_count().await, 0);
    assert_eq!(stock_of(&shop.repo, shop.movie.id).await, 0);
}

#[tokio::test]
async fn checkout_unknown_movie_or_customer_is_not_found() {
    let shop = shop_with_stock(3).await;

    let missing_movie = shop.ledger.checkout(shop.customer.id, Uuid::new_v4()).await;
    assert!(matches!(missing_movie, Err(LedgerError::MovieNotFound)));

    let missing_customer = shop.ledger.checkout(Uuid::new_v4(), shop.movie.id).await;
    assert!(matches!(missing_customer, Err(LedgerError::CustomerNotFound)));

    assert_eq!(shop.repo.rental_count().await, 0);
    assert_eq!(stock_of(&shop.repo, shop.movie.id).await, 3);
}

#[tokio::test]
async fn snapshot_is_immune_to_later_catalog_edits() {
    let shop = shop_with_stock(2).await;
    let rental = shop.ledger.checkout(shop.customer.id, shop.movie.id).await.unwrap();

    // Re-price and rename the movie after checkout.
    shop.repo
        .insert_movie(Movie {
            title: "Metropolis (Restored)".to_string(),
            daily_rental_rate: 9.0,
            number_in_stock: 1,
            ..shop.movie.clone()
        })
        .await;

    let stored = shop.repo.get_rental(rental.id).await.unwrap().unwrap();
    assert_eq!(stored.movie.title, "Metropolis");
    assert_eq!(stored.movie.daily_rental_rate, 2.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_of_last_copy_yield_one_success() {
    let shop = shop_with_stock(1).await;

    let attempts: Vec<_> = (0..16)
        .map(|_| {
            let ledger = shop.ledger.clone();
            let (customer_id, movie_id) = (shop.customer.id, shop.movie.id);
            tokio::spawn(async move { ledger.checkout(customer_id, movie_id).await })
        })
        .collect();

    let mut successes = 0;
    let mut out_of_stock = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => successes += 1,
            Err(LedgerError::OutOfStock) => out_of_stock += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(out_of_stock, 15);
    assert_eq!(stock_of(&shop.repo, shop.movie.id).await, 0);
    assert_eq!(shop.repo.rental_count().await, 1);
}

// --- Return processing ---

async fn seed_open_rental(shop: &Shop, days_ago: i64) -> RentalRecord {
    let rental = RentalRecord::open(
        &shop.customer,
        &shop.movie,
        Utc::now() - Duration::days(days_ago),
    );
    shop.repo.insert_rental(rental.clone()).await;
    rental
}

#[tokio::test]
async fn return_after_seven_days_charges_fourteen() {
    let shop = shop_with_stock(10).await;
    let rental = seed_open_rental(&shop, 7).await;

    let returned = shop
        .ledger
        .return_processing(shop.customer.id, shop.movie.id)
        .await
        .unwrap();

    assert_eq!(returned.id, rental.id);
    assert_eq!(returned.fee, Some(14.0));
    let return_time = returned.return_time.expect("return time set");
    assert!(Utc::now() - return_time < Duration::seconds(10));
    assert_eq!(stock_of(&shop.repo, shop.movie.id).await, 11);
}

#[tokio::test]
async fn return_without_rental_is_not_found() {
    let shop = shop_with_stock(10).await;

    let result = shop.ledger.return_processing(shop.customer.id, shop.movie.id).await;

    assert!(matches!(result, Err(LedgerError::RentalNotFound)));
    assert_eq!(stock_of(&shop.repo, shop.movie.id).await, 10);
}

#[tokio::test]
async fn second_return_is_already_processed_and_changes_nothing() {
    let shop = shop_with_stock(10).await;
    seed_open_rental(&shop, 3).await;

    let first = shop
        .ledger
        .return_processing(shop.customer.id, shop.movie.id)
        .await
        .unwrap();
    let second = shop.ledger.return_processing(shop.customer.id, shop.movie.id).await;

    assert!(matches!(second, Err(LedgerError::AlreadyProcessed)));
    let stored = shop.repo.get_rental(first.id).await.unwrap().unwrap();
    assert_eq!(stored.return_time, first.return_time);
    assert_eq!(stored.fee, Some(6.0));
    assert_eq!(stock_of(&shop.repo, shop.movie.id).await, 11);
}

#[tokio::test]
async fn checkout_then_return_restores_stock() {
    let shop = shop_with_stock(4).await;

    shop.ledger.checkout(shop.customer.id, shop.movie.id).await.unwrap();
    assert_eq!(stock_of(&shop.repo, shop.movie.id).await, 3);

    let returned = shop
        .ledger
        .return_processing(shop.customer.id, shop.movie.id)
        .await
        .unwrap();

    // Returned the same day: zero whole days elapsed.
    assert_eq!(returned.fee, Some(0.0));
    assert_eq!(stock_of(&shop.repo, shop.movie.id).await, 4);
}

#[tokio::test]
async fn return_matches_first_rental_even_when_closed() {
    let shop = shop_with_stock(5).await;

    shop.ledger.checkout(shop.customer.id, shop.movie.id).await.unwrap();
    shop.ledger
        .return_processing(shop.customer.id, shop.movie.id)
        .await
        .unwrap();
    let second = shop.ledger.checkout(shop.customer.id, shop.movie.id).await.unwrap();

    // The lookup keeps hitting the first (closed) rental for the pair.
    let result = shop.ledger.return_processing(shop.customer.id, shop.movie.id).await;
    assert!(matches!(result, Err(LedgerError::AlreadyProcessed)));

    let still_open = shop.repo.get_rental(second.id).await.unwrap().unwrap();
    assert!(still_open.return_time.is_none());
}

#[tokio::test]
async fn store_faults_are_reported_as_store_errors() {
    let shop = shop_with_stock(5).await;
    shop.repo.set_unavailable(true);

    let result = shop.ledger.checkout(shop.customer.id, shop.movie.id).await;

    assert!(matches!(result, Err(LedgerError::Store(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_returns_close_the_rental_once() {
    let shop = shop_with_stock(3).await;
    seed_open_rental(&shop, 2).await;

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let ledger = shop.ledger.clone();
            let (customer_id, movie_id) = (shop.customer.id, shop.movie.id);
            tokio::spawn(async move { ledger.return_processing(customer_id, movie_id).await })
        })
        .collect();

    let mut successes = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(rental) => {
                successes += 1;
                assert_eq!(rental.fee, Some(4.0));
            }
            Err(LedgerError::AlreadyProcessed) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(stock_of(&shop.repo, shop.movie.id).await, 4);
}
