//! Reservation against a listing's remaining capacity.
//!
//! The capacity invariant (`orders_accepted <= quantity_prepared`) is
//! enforced by a single conditional UPDATE whose guard re-states the
//! precondition server-side. Two concurrent orders for the last portion can
//! never both pass the guard; the loser sees zero rows and is re-read to
//! report the precise reason.

use sqlx::types::Json;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::dto::CompleteProfile;
use crate::error::ApiError;
use crate::meals::dto::{MealRow, OrderSummary};
use crate::meals::repo::MEAL_COLUMNS;
use crate::orders::dto::{MyOrderRow, OrderRow};

const ORDER_COLUMNS: &str = "id, student_id, student_name, student_phone, meal_id, quantity, created_at";

/// Reserve `quantity` portions of a meal and record the order, atomically.
/// Either both the order row and the incremented meal are committed, or
/// neither is.
pub async fn place_order(
    db: &PgPool,
    student: &CompleteProfile,
    meal_id: Uuid,
    quantity: i32,
) -> Result<(OrderRow, MealRow), ApiError> {
    let mut tx = db.begin().await?;

    let summary = Json(vec![OrderSummary {
        student_name: student.name.clone(),
        student_phone: student.phone.clone(),
        quantity,
    }]);

    // Guarded increment; the right-hand `orders_accepted` reads the old
    // value, so availability flips exactly when the last portion goes.
    let meal = sqlx::query_as::<_, MealRow>(&format!(
        r#"
        UPDATE meals
        SET orders_accepted = orders_accepted + $2,
            is_available = orders_accepted + $2 < quantity_prepared,
            orders = orders || $3
        WHERE id = $1
          AND order_deadline > now()
          AND orders_accepted + $2 <= quantity_prepared
        RETURNING {MEAL_COLUMNS}
        "#
    ))
    .bind(meal_id)
    .bind(quantity)
    .bind(summary)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(meal) = meal else {
        // The guard failed; nothing was written. Re-read inside the same
        // transaction to say why.
        let current = sqlx::query_as::<_, MealRow>(&format!(
            r#"
            SELECT {MEAL_COLUMNS}
            FROM meals
            WHERE id = $1
            "#
        ))
        .bind(meal_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.rollback().await?;
        return Err(match current {
            None => ApiError::NotFound("meal"),
            Some(m) if m.order_deadline <= OffsetDateTime::now_utc() => {
                ApiError::Validation("the order deadline for this meal has passed".into())
            }
            Some(m) => ApiError::CapacityExceeded {
                remaining: m.remaining(),
            },
        });
    };

    let order = sqlx::query_as::<_, OrderRow>(&format!(
        r#"
        INSERT INTO orders (student_id, student_name, student_phone, meal_id, quantity)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {ORDER_COLUMNS}
        "#
    ))
    .bind(student.id)
    .bind(&student.name)
    .bind(&student.phone)
    .bind(meal_id)
    .bind(quantity)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((order, meal))
}

pub async fn list_my_orders(db: &PgPool, student_id: Uuid) -> Result<Vec<MyOrderRow>, sqlx::Error> {
    sqlx::query_as::<_, MyOrderRow>(
        r#"
        SELECT o.id AS order_id, o.quantity, o.created_at,
               m.id AS meal_id, m.title, m.price, m.pickup_time,
               m.house_name, m.house_phone, m.house_area, m.house_address,
               m.food_items
        FROM orders o
        JOIN meals m ON m.id = o.meal_id
        WHERE o.student_id = $1
        ORDER BY o.created_at DESC
        "#,
    )
    .bind(student_id)
    .fetch_all(db)
    .await
}
