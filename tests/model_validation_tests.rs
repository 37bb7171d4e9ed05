use chrono::{TimeZone, Utc};
use movie_rentals::{
    error::ApiError,
    models::{Customer, Movie, RentalRecord, RentalRequest},
};
use serde_json::json;
use uuid::Uuid;

// --- Test Utilities ---

fn customer() -> Customer {
    Customer {
        id: Uuid::from_u128(7),
        name: "Hedy Lamarr".to_string(),
        is_gold: false,
        phone: "0123456".to_string(),
    }
}

fn movie() -> Movie {
    Movie {
        id: Uuid::from_u128(9),
        title: "Sunrise".to_string(),
        number_in_stock: 3,
        daily_rental_rate: 1.25,
    }
}

fn request(body: serde_json::Value) -> RentalRequest {
    serde_json::from_value(body).unwrap()
}

fn validation_message(result: Result<(Uuid, Uuid), ApiError>) -> String {
    match result {
        Err(ApiError::Validation(message)) => message,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

// --- Serialization ---

#[test]
fn open_rental_serializes_camel_case_with_null_return() {
    let checkout = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
    let rental = RentalRecord::open(&customer(), &movie(), checkout);

    let value = serde_json::to_value(&rental).unwrap();

    assert_eq!(value["customer"]["isGold"], json!(false));
    assert_eq!(value["customer"]["name"], "Hedy Lamarr");
    assert_eq!(value["movie"]["dailyRentalRate"], json!(1.25));
    assert!(value["movie"].get("numberInStock").is_none());
    assert_eq!(value["checkoutTime"], "2024-03-01T10:00:00Z");
    assert!(value["returnTime"].is_null());
    assert!(value["fee"].is_null());
}

#[test]
fn snapshot_copies_catalog_values() {
    let rental = RentalRecord::open(&customer(), &movie(), Utc::now());

    assert_eq!(rental.customer.id, customer().id);
    assert_eq!(rental.customer.phone, "0123456");
    assert_eq!(rental.movie.title, "Sunrise");
    assert!(!rental.is_returned());
}

// --- RentalRequest validation ---

#[test]
fn valid_request_yields_both_ids() {
    let customer_id = Uuid::new_v4();
    let movie_id = Uuid::new_v4();

    let ids = request(json!({ "customerId": customer_id, "movieId": movie_id }))
        .validate()
        .unwrap();

    assert_eq!(ids, (customer_id, movie_id));
}

#[test]
fn missing_ids_are_reported_by_name() {
    let message = validation_message(request(json!({})).validate());
    assert!(message.contains("customerId"), "got: {message}");

    let message =
        validation_message(request(json!({ "customerId": Uuid::new_v4() })).validate());
    assert!(message.contains("movieId"), "got: {message}");
}

#[test]
fn malformed_ids_are_rejected() {
    for bad in ["", "1", "not-a-uuid", "zzzzzzzz-zzzz-zzzz-zzzz-zzzzzzzzzzzz"] {
        let result = request(json!({ "customerId": bad, "movieId": Uuid::new_v4() })).validate();
        assert!(
            matches!(result, Err(ApiError::Validation(_))),
            "accepted customerId {bad:?}"
        );
    }
}
