use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::meals::dto::{FoodItem, MealRow, PastOrderRow};

pub const MEAL_COLUMNS: &str = "id, house_id, house_name, house_phone, house_area, house_address, \
     title, price, pickup_time, order_deadline, quantity_prepared, orders_accepted, is_available, \
     food_items, total_calories, total_protein, is_veg, orders, settled_at, created_at";

const PAST_ORDER_COLUMNS: &str =
    "id, meal_id, house_id, meal_title, pickup_time, total_orders, total_revenue, food_items, created_at";

/// Grace period after pickup before a listing is settled into history.
pub const SETTLEMENT_GRACE_MINUTES: i32 = 60;

pub struct NewMeal<'a> {
    pub house_id: Uuid,
    pub house_name: &'a str,
    pub house_phone: &'a str,
    pub house_area: &'a str,
    pub house_address: &'a str,
    pub title: &'a str,
    pub price: f64,
    pub pickup_time: time::OffsetDateTime,
    pub order_deadline: time::OffsetDateTime,
    pub quantity_prepared: i32,
    pub food_items: Vec<FoodItem>,
    pub total_calories: f64,
    pub total_protein: f64,
    pub is_veg: bool,
}

pub async fn insert_meal(db: &PgPool, meal: NewMeal<'_>) -> Result<MealRow, sqlx::Error> {
    sqlx::query_as::<_, MealRow>(&format!(
        r#"
        INSERT INTO meals (house_id, house_name, house_phone, house_area, house_address,
                           title, price, pickup_time, order_deadline, quantity_prepared,
                           food_items, total_calories, total_protein, is_veg)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING {MEAL_COLUMNS}
        "#
    ))
    .bind(meal.house_id)
    .bind(meal.house_name)
    .bind(meal.house_phone)
    .bind(meal.house_area)
    .bind(meal.house_address)
    .bind(meal.title)
    .bind(meal.price)
    .bind(meal.pickup_time)
    .bind(meal.order_deadline)
    .bind(meal.quantity_prepared)
    .bind(Json(meal.food_items))
    .bind(meal.total_calories)
    .bind(meal.total_protein)
    .bind(meal.is_veg)
    .fetch_one(db)
    .await
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<MealRow>, sqlx::Error> {
    sqlx::query_as::<_, MealRow>(&format!(
        r#"
        SELECT {MEAL_COLUMNS}
        FROM meals
        WHERE id = $1
        "#
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn list_by_house(db: &PgPool, house_id: Uuid) -> Result<Vec<MealRow>, sqlx::Error> {
    sqlx::query_as::<_, MealRow>(&format!(
        r#"
        SELECT {MEAL_COLUMNS}
        FROM meals
        WHERE house_id = $1
        "#
    ))
    .bind(house_id)
    .fetch_all(db)
    .await
}

/// Open catalog: still available and still inside the ordering window,
/// soonest deadline first.
pub async fn list_open(db: &PgPool) -> Result<Vec<MealRow>, sqlx::Error> {
    sqlx::query_as::<_, MealRow>(&format!(
        r#"
        SELECT {MEAL_COLUMNS}
        FROM meals
        WHERE is_available AND order_deadline > now()
        ORDER BY order_deadline ASC
        "#
    ))
    .fetch_all(db)
    .await
}

pub async fn list_past_orders(db: &PgPool, house_id: Uuid) -> Result<Vec<PastOrderRow>, sqlx::Error> {
    sqlx::query_as::<_, PastOrderRow>(&format!(
        r#"
        SELECT {PAST_ORDER_COLUMNS}
        FROM past_orders
        WHERE house_id = $1
        ORDER BY pickup_time DESC
        "#
    ))
    .bind(house_id)
    .fetch_all(db)
    .await
}

/// Settle every meal whose pickup window has closed: one settlement snapshot
/// per meal, availability forced off.
///
/// The claim is a conditional update on `settled_at IS NULL`, so concurrent
/// sweeps (multiple house clients, the background timer, restarts) settle
/// each meal exactly once. The unique `past_orders.meal_id` index backstops
/// the snapshot insert.
pub async fn settle_due(
    db: &PgPool,
    house_id: Option<Uuid>,
) -> Result<Vec<PastOrderRow>, sqlx::Error> {
    let mut tx = db.begin().await?;

    let claimed = sqlx::query_as::<_, MealRow>(&format!(
        r#"
        UPDATE meals
        SET is_available = FALSE, settled_at = now()
        WHERE settled_at IS NULL
          AND pickup_time + make_interval(mins => $1) <= now()
          AND ($2::uuid IS NULL OR house_id = $2)
        RETURNING {MEAL_COLUMNS}
        "#
    ))
    .bind(SETTLEMENT_GRACE_MINUTES)
    .bind(house_id)
    .fetch_all(&mut *tx)
    .await?;

    let mut snapshots = Vec::with_capacity(claimed.len());
    for meal in &claimed {
        let snapshot = sqlx::query_as::<_, PastOrderRow>(&format!(
            r#"
            INSERT INTO past_orders (meal_id, house_id, meal_title, pickup_time,
                                     total_orders, total_revenue, food_items)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (meal_id) DO NOTHING
            RETURNING {PAST_ORDER_COLUMNS}
            "#
        ))
        .bind(meal.id)
        .bind(meal.house_id)
        .bind(&meal.title)
        .bind(meal.pickup_time)
        .bind(meal.orders_accepted)
        .bind(meal.price * f64::from(meal.orders_accepted))
        .bind(Json(meal.food_item_names()))
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(s) = snapshot {
            snapshots.push(s);
        }
    }

    tx.commit().await?;
    Ok(snapshots)
}
