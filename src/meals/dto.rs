use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::advisor::NutritionInfo;

/// One food item on a listing, with the advisor's nutrition estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodItem {
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub is_veg: bool,
}

/// Embedded order summary kept on the meal document itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub student_name: String,
    pub student_phone: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct MealRow {
    pub id: Uuid,
    pub house_id: Uuid,
    pub house_name: String,
    pub house_phone: String,
    pub house_area: String,
    pub house_address: String,
    pub title: String,
    pub price: f64,
    pub pickup_time: OffsetDateTime,
    pub order_deadline: OffsetDateTime,
    pub quantity_prepared: i32,
    pub orders_accepted: i32,
    pub is_available: bool,
    pub food_items: Json<Vec<FoodItem>>,
    pub total_calories: f64,
    pub total_protein: f64,
    pub is_veg: bool,
    pub orders: Json<Vec<OrderSummary>>,
    pub settled_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl MealRow {
    pub fn remaining(&self) -> i32 {
        self.quantity_prepared - self.orders_accepted
    }

    pub fn food_item_names(&self) -> Vec<String> {
        self.food_items.0.iter().map(|i| i.name.clone()).collect()
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PastOrderRow {
    pub id: Uuid,
    pub meal_id: Uuid,
    pub house_id: Uuid,
    pub meal_title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pickup_time: OffsetDateTime,
    pub total_orders: i32,
    pub total_revenue: f64,
    pub food_items: Json<Vec<String>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub title: String,
    pub price: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub pickup_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub order_deadline: OffsetDateTime,
    pub quantity_prepared: i32,
    pub food_items: Vec<String>,
}

/// Listing as served to houses and to the student catalog. House contact
/// fields are the frozen copy captured at creation time.
#[derive(Debug, Serialize)]
pub struct MealView {
    pub id: Uuid,
    pub house_name: String,
    pub house_phone: String,
    pub house_area: String,
    pub house_address: String,
    pub title: String,
    pub price: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub pickup_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub order_deadline: OffsetDateTime,
    pub quantity_prepared: i32,
    pub orders_accepted: i32,
    pub remaining: i32,
    pub is_available: bool,
    pub food_items: Vec<FoodItem>,
    pub total_calories: f64,
    pub total_protein: f64,
    pub is_veg: bool,
}

impl From<MealRow> for MealView {
    fn from(m: MealRow) -> Self {
        let remaining = m.remaining();
        Self {
            id: m.id,
            house_name: m.house_name,
            house_phone: m.house_phone,
            house_area: m.house_area,
            house_address: m.house_address,
            title: m.title,
            price: m.price,
            pickup_time: m.pickup_time,
            order_deadline: m.order_deadline,
            quantity_prepared: m.quantity_prepared,
            orders_accepted: m.orders_accepted,
            remaining,
            is_available: m.is_available,
            food_items: m.food_items.0,
            total_calories: m.total_calories,
            total_protein: m.total_protein,
            is_veg: m.is_veg,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub settled: Vec<PastOrderRow>,
}

/// Sum calories and protein over the items; a listing is vegetarian only if
/// every item is.
pub fn aggregate_nutrition(items: &[FoodItem]) -> (f64, f64, bool) {
    let calories = items.iter().map(|i| i.calories).sum();
    let protein = items.iter().map(|i| i.protein).sum();
    let is_veg = items.iter().all(|i| i.is_veg);
    (calories, protein, is_veg)
}

pub fn food_item(name: String, nutrition: NutritionInfo) -> FoodItem {
    FoodItem {
        name,
        calories: nutrition.calories,
        protein: nutrition.protein,
        is_veg: nutrition.is_veg,
    }
}

/// The listing time window must satisfy `now < order_deadline < pickup_time`.
pub fn validate_listing_times(
    now: OffsetDateTime,
    order_deadline: OffsetDateTime,
    pickup_time: OffsetDateTime,
) -> Result<(), String> {
    if order_deadline <= now {
        return Err("order deadline must be in the future".into());
    }
    if order_deadline >= pickup_time {
        return Err("pickup time must be after the order deadline".into());
    }
    Ok(())
}
