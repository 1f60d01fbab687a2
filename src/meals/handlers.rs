use axum::{extract::State, http::StatusCode, Json};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::advisor::NutritionInfo;
use crate::auth::dto::Role;
use crate::auth::session::ActiveProfile;
use crate::error::ApiError;
use crate::meals::dto::{
    aggregate_nutrition, food_item, validate_listing_times, CreateListingRequest, MealView,
    PastOrderRow, SweepResponse,
};
use crate::meals::repo::{self, NewMeal};
use crate::state::AppState;

/// POST /meals
#[instrument(skip(state, body), fields(title = %body.title))]
pub async fn create_listing(
    State(state): State<AppState>,
    ActiveProfile(profile): ActiveProfile,
    Json(body): Json<CreateListingRequest>,
) -> Result<(StatusCode, Json<MealView>), ApiError> {
    profile.require_role(Role::House)?;
    let location = profile
        .location
        .as_ref()
        .ok_or_else(|| ApiError::Validation("set your kitchen location first".into()))?;

    validate_listing_times(OffsetDateTime::now_utc(), body.order_deadline, body.pickup_time)
        .map_err(ApiError::Validation)?;
    if body.price <= 0.0 {
        return Err(ApiError::Validation("price must be positive".into()));
    }
    if body.quantity_prepared < 1 {
        return Err(ApiError::Validation("prepare at least one portion".into()));
    }
    let names: Vec<String> = body
        .food_items
        .iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        return Err(ApiError::Validation("list at least one food item".into()));
    }

    // One advisor call per item; a failed estimate degrades that item to
    // zeroed values instead of aborting the listing.
    let mut items = Vec::with_capacity(names.len());
    for name in names {
        let nutrition = match state.advisor.analyze(&name).await {
            Ok(n) => n,
            Err(e) => {
                warn!(item = %name, error = %e, "nutrition advisor failed, degrading item");
                NutritionInfo::default()
            }
        };
        items.push(food_item(name, nutrition));
    }
    let (total_calories, total_protein, is_veg) = aggregate_nutrition(&items);

    let meal = repo::insert_meal(
        &state.db,
        NewMeal {
            house_id: profile.id,
            house_name: &profile.name,
            house_phone: &profile.phone,
            house_area: &location.area,
            house_address: &location.address,
            title: body.title.trim(),
            price: body.price,
            pickup_time: body.pickup_time,
            order_deadline: body.order_deadline,
            quantity_prepared: body.quantity_prepared,
            food_items: items,
            total_calories,
            total_protein,
            is_veg,
        },
    )
    .await?;

    info!(meal_id = %meal.id, house_id = %profile.id, "listing created");
    Ok((StatusCode::CREATED, Json(MealView::from(meal))))
}

/// GET /meals/mine
#[instrument(skip(state))]
pub async fn my_listings(
    State(state): State<AppState>,
    ActiveProfile(profile): ActiveProfile,
) -> Result<Json<Vec<MealView>>, ApiError> {
    profile.require_role(Role::House)?;
    let meals = repo::list_by_house(&state.db, profile.id).await?;
    Ok(Json(meals.into_iter().map(MealView::from).collect()))
}

/// GET /meals/past
#[instrument(skip(state))]
pub async fn past_orders(
    State(state): State<AppState>,
    ActiveProfile(profile): ActiveProfile,
) -> Result<Json<Vec<PastOrderRow>>, ApiError> {
    profile.require_role(Role::House)?;
    let rows = repo::list_past_orders(&state.db, profile.id).await?;
    Ok(Json(rows))
}

/// POST /meals/sweep — settle this house's closed listings now. The
/// background scheduler performs the same sweep for all houses every minute,
/// so calling this twice is a no-op for already-settled meals.
#[instrument(skip(state))]
pub async fn sweep(
    State(state): State<AppState>,
    ActiveProfile(profile): ActiveProfile,
) -> Result<Json<SweepResponse>, ApiError> {
    profile.require_role(Role::House)?;
    let settled = repo::settle_due(&state.db, Some(profile.id)).await?;
    if !settled.is_empty() {
        info!(house_id = %profile.id, count = settled.len(), "listings settled");
    }
    Ok(Json(SweepResponse { settled }))
}
