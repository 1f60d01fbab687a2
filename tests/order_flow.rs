//! End-to-end reservation tests against a real Postgres.
//!
//! Run with a disposable database:
//!   DATABASE_URL=postgres://... cargo test -- --ignored

use pothichor::auth::dto::{CompleteProfile, Profile};
use pothichor::auth::repo as users;
use pothichor::error::ApiError;
use pothichor::meals::dto::FoodItem;
use pothichor::meals::repo::{self as meals, NewMeal};
use pothichor::orders::repo as orders;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("connect");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrate");
    pool
}

async fn make_user(pool: &PgPool, role: &str, name: &str) -> CompleteProfile {
    let subject = format!("sub-{}", Uuid::new_v4());
    let email = format!("{}@test.edu", Uuid::new_v4());
    let row = users::ensure_user(pool, &subject, &email).await.expect("insert user");
    users::set_role(pool, row.id, role).await.expect("set role");
    let row = users::set_details(
        pool,
        row.id,
        name,
        "9876543210",
        Some("Kattangal"),
        Some("House 12, NIT Rd"),
    )
    .await
    .expect("set details")
    .expect("user exists");
    match Profile::from(row) {
        Profile::Complete(p) => p,
        other => panic!("expected complete profile, got {other:?}"),
    }
}

async fn make_meal(pool: &PgPool, house: &CompleteProfile, quantity: i32) -> Uuid {
    let now = OffsetDateTime::now_utc();
    make_meal_at(pool, house, quantity, now + Duration::hours(2), now + Duration::hours(1)).await
}

async fn make_meal_at(
    pool: &PgPool,
    house: &CompleteProfile,
    quantity: i32,
    pickup_time: OffsetDateTime,
    order_deadline: OffsetDateTime,
) -> Uuid {
    let location = house.location.clone().expect("house has a location");
    let meal = meals::insert_meal(
        pool,
        NewMeal {
            house_id: house.id,
            house_name: &house.name,
            house_phone: &house.phone,
            house_area: &location.area,
            house_address: &location.address,
            title: "Fish Curry Meals",
            price: 80.0,
            pickup_time,
            order_deadline,
            quantity_prepared: quantity,
            food_items: vec![FoodItem {
                name: "rice".into(),
                calories: 200.0,
                protein: 4.0,
                is_veg: true,
            }],
            total_calories: 200.0,
            total_protein: 4.0,
            is_veg: true,
        },
    )
    .await
    .expect("insert meal");
    meal.id
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable Postgres"]
async fn concurrent_orders_never_exceed_capacity() {
    let pool = pool().await;
    let house = make_user(&pool, "house", "Ammas Kitchen").await;
    let capacity = 3;
    let attempts = 8;
    let meal_id = make_meal(&pool, &house, capacity).await;

    let mut tasks = Vec::new();
    for i in 0..attempts {
        let pool = pool.clone();
        let student = make_user(&pool, "student", &format!("Student {i}")).await;
        tasks.push(tokio::spawn(async move {
            orders::place_order(&pool, &student, meal_id, 1).await
        }));
    }

    let mut ok = 0;
    let mut capacity_exceeded = 0;
    for task in tasks {
        match task.await.expect("join") {
            Ok(_) => ok += 1,
            Err(ApiError::CapacityExceeded { .. }) => capacity_exceeded += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(ok, capacity);
    assert_eq!(capacity_exceeded, attempts - capacity);

    let meal = meals::find_by_id(&pool, meal_id).await.unwrap().unwrap();
    assert_eq!(meal.orders_accepted, capacity);
    assert!(!meal.is_available);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable Postgres"]
async fn rejected_order_leaves_no_partial_state() {
    let pool = pool().await;
    let house = make_user(&pool, "house", "Ammas Kitchen").await;
    let meal_id = make_meal(&pool, &house, 2).await;

    let a = make_user(&pool, "student", "Student A").await;
    let b = make_user(&pool, "student", "Student B").await;

    let (order, meal) = orders::place_order(&pool, &a, meal_id, 2).await.expect("a's order");
    assert_eq!(order.quantity, 2);
    assert_eq!(meal.orders_accepted, 2);
    assert!(!meal.is_available);

    let err = orders::place_order(&pool, &b, meal_id, 1).await.unwrap_err();
    assert!(matches!(err, ApiError::CapacityExceeded { remaining: 0 }));

    // No orphaned order row, no capacity drift.
    let b_orders = orders::list_my_orders(&pool, b.id).await.unwrap();
    assert!(b_orders.is_empty());
    let meal = meals::find_by_id(&pool, meal_id).await.unwrap().unwrap();
    assert_eq!(meal.orders_accepted, 2);
    assert_eq!(meal.orders.0.len(), 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable Postgres"]
async fn settlement_is_idempotent_per_meal() {
    let pool = pool().await;
    let house = make_user(&pool, "house", "Ammas Kitchen").await;
    let now = OffsetDateTime::now_utc();
    // Pickup window already closed, grace period elapsed.
    let meal_id = make_meal_at(
        &pool,
        &house,
        5,
        now - Duration::hours(2),
        now - Duration::hours(3),
    )
    .await;

    let first = meals::settle_due(&pool, Some(house.id)).await.expect("first sweep");
    assert!(first.iter().any(|p| p.meal_id == meal_id));

    let second = meals::settle_due(&pool, Some(house.id)).await.expect("second sweep");
    assert!(second.iter().all(|p| p.meal_id != meal_id));

    let snapshots = meals::list_past_orders(&pool, house.id).await.unwrap();
    assert_eq!(snapshots.iter().filter(|p| p.meal_id == meal_id).count(), 1);

    let meal = meals::find_by_id(&pool, meal_id).await.unwrap().unwrap();
    assert!(!meal.is_available);
    assert!(meal.settled_at.is_some());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable Postgres"]
async fn past_deadline_orders_are_rejected_before_any_write() {
    let pool = pool().await;
    let house = make_user(&pool, "house", "Ammas Kitchen").await;
    let now = OffsetDateTime::now_utc();
    let meal_id = make_meal_at(
        &pool,
        &house,
        5,
        now + Duration::hours(1),
        now - Duration::minutes(1),
    )
    .await;

    let student = make_user(&pool, "student", "Student").await;
    let err = orders::place_order(&pool, &student, meal_id, 1).await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    let meal = meals::find_by_id(&pool, meal_id).await.unwrap().unwrap();
    assert_eq!(meal.orders_accepted, 0);
}
