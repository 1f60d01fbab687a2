use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::meals::dto::MealRow;

/// Reminders fire this long before pickup.
pub const REMINDER_LEAD_MINUTES: i64 = 15;

const REMINDER_COLUMNS: &str =
    "id, recipient_email, meal_title, pickup_time, food_items, reminder_time, sent, created_at";

#[derive(Debug, Clone, FromRow)]
pub struct ReminderRow {
    pub id: Uuid,
    pub recipient_email: String,
    pub meal_title: String,
    pub pickup_time: OffsetDateTime,
    pub food_items: Json<Vec<String>>,
    pub reminder_time: OffsetDateTime,
    pub sent: bool,
    pub created_at: OffsetDateTime,
}

pub fn reminder_time_for(pickup_time: OffsetDateTime) -> OffsetDateTime {
    pickup_time - Duration::minutes(REMINDER_LEAD_MINUTES)
}

/// Append a deferred pickup reminder for one placed order. Pure insert;
/// callers treat failure as best-effort.
pub async fn schedule(db: &PgPool, recipient_email: &str, meal: &MealRow) -> Result<ReminderRow, sqlx::Error> {
    sqlx::query_as::<_, ReminderRow>(&format!(
        r#"
        INSERT INTO scheduled_reminders (recipient_email, meal_title, pickup_time, food_items, reminder_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {REMINDER_COLUMNS}
        "#
    ))
    .bind(recipient_email)
    .bind(&meal.title)
    .bind(meal.pickup_time)
    .bind(Json(meal.food_item_names()))
    .bind(reminder_time_for(meal.pickup_time))
    .fetch_one(db)
    .await
}

/// Everything due and not yet delivered.
pub async fn due(db: &PgPool) -> Result<Vec<ReminderRow>, sqlx::Error> {
    sqlx::query_as::<_, ReminderRow>(&format!(
        r#"
        SELECT {REMINDER_COLUMNS}
        FROM scheduled_reminders
        WHERE NOT sent AND reminder_time <= now()
        ORDER BY reminder_time ASC
        "#
    ))
    .fetch_all(db)
    .await
}

/// Flip `sent` after a successful dispatch. A reminder whose dispatch failed
/// is never marked, so the next poll retries it.
pub async fn mark_sent(db: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE scheduled_reminders
        SET sent = TRUE
        WHERE id = $1 AND NOT sent
        "#,
    )
    .bind(id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn reminder_fires_fifteen_minutes_before_pickup() {
        let pickup = datetime!(2026-09-01 13:00 UTC);
        assert_eq!(reminder_time_for(pickup), datetime!(2026-09-01 12:45 UTC));
    }
}
