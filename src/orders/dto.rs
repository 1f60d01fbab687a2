use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::meals::dto::FoodItem;

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub meal_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub student_phone: String,
    pub meal_id: Uuid,
    pub quantity: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct PlacedOrderResponse {
    pub order: OrderRow,
    pub meal: crate::meals::dto::MealView,
}

/// One row of the student's order history, joined with its meal.
#[derive(Debug, Clone, FromRow)]
pub struct MyOrderRow {
    pub order_id: Uuid,
    pub quantity: i32,
    pub created_at: OffsetDateTime,
    pub meal_id: Uuid,
    pub title: String,
    pub price: f64,
    pub pickup_time: OffsetDateTime,
    pub house_name: String,
    pub house_phone: String,
    pub house_area: String,
    pub house_address: String,
    pub food_items: Json<Vec<FoodItem>>,
}

#[derive(Debug, Serialize)]
pub struct MyOrderView {
    pub order_id: Uuid,
    pub quantity: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub meal_id: Uuid,
    pub title: String,
    pub price: f64,
    pub amount: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub pickup_time: OffsetDateTime,
    pub house_name: String,
    pub house_phone: String,
    pub house_area: String,
    pub house_address: String,
    pub food_items: Vec<FoodItem>,
}

impl From<MyOrderRow> for MyOrderView {
    fn from(r: MyOrderRow) -> Self {
        let amount = r.price * f64::from(r.quantity);
        Self {
            order_id: r.order_id,
            quantity: r.quantity,
            created_at: r.created_at,
            meal_id: r.meal_id,
            title: r.title,
            price: r.price,
            amount,
            pickup_time: r.pickup_time,
            house_name: r.house_name,
            house_phone: r.house_phone,
            house_area: r.house_area,
            house_address: r.house_address,
            food_items: r.food_items.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MyOrdersResponse {
    pub orders: Vec<MyOrderView>,
    pub total_amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn order_amount_is_price_times_quantity() {
        let row = MyOrderRow {
            order_id: Uuid::new_v4(),
            quantity: 3,
            created_at: OffsetDateTime::now_utc(),
            meal_id: Uuid::new_v4(),
            title: "Veg Thali".into(),
            price: 60.0,
            pickup_time: OffsetDateTime::now_utc(),
            house_name: "Ammas Kitchen".into(),
            house_phone: "9876543210".into(),
            house_area: "Kattangal".into(),
            house_address: "House 12".into(),
            food_items: Json(vec![]),
        };
        let view = MyOrderView::from(row);
        assert_eq!(view.amount, 180.0);
    }
}
