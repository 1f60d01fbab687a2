use axum::{extract::State, http::StatusCode, Json};
use tracing::{info, instrument, warn};

use crate::advisor::MealSummary;
use crate::auth::dto::Role;
use crate::auth::session::ActiveProfile;
use crate::error::ApiError;
use crate::mailer;
use crate::meals::dto::MealView;
use crate::meals::repo as meals_repo;
use crate::orders::dto::{
    AskRequest, MyOrderView, MyOrdersResponse, PlaceOrderRequest, PlacedOrderResponse,
};
use crate::orders::repo;
use crate::reminders;
use crate::state::AppState;

/// GET /catalog — open listings, soonest deadline first. Contact info is the
/// meal's frozen copy, not a live join against the house profile.
#[instrument(skip(state))]
pub async fn catalog(
    State(state): State<AppState>,
    ActiveProfile(profile): ActiveProfile,
) -> Result<Json<Vec<MealView>>, ApiError> {
    profile.require_role(Role::Student)?;
    let meals = meals_repo::list_open(&state.db).await?;
    Ok(Json(meals.into_iter().map(MealView::from).collect()))
}

/// POST /catalog/ask — natural-language question over the open catalog.
#[instrument(skip(state, body), fields(question = %body.question))]
pub async fn ask(
    State(state): State<AppState>,
    ActiveProfile(profile): ActiveProfile,
    Json(body): Json<AskRequest>,
) -> Result<Json<Vec<MealView>>, ApiError> {
    profile.require_role(Role::Student)?;
    if body.question.trim().is_empty() {
        return Err(ApiError::Validation("ask a question".into()));
    }

    let meals = meals_repo::list_open(&state.db).await?;
    let summaries: Vec<MealSummary> = meals
        .iter()
        .map(|m| MealSummary {
            id: m.id,
            title: m.title.clone(),
            price: m.price,
            food_items: m.food_item_names(),
            total_calories: m.total_calories,
            total_protein: m.total_protein,
            is_veg: m.is_veg,
        })
        .collect();

    let relevant = state
        .advisor
        .relevant_meals(&body.question, &summaries)
        .await
        .map_err(|e| ApiError::Dependency(format!("query advisor failed: {e}")))?;

    let matched = meals
        .into_iter()
        .filter(|m| relevant.contains(&m.id))
        .map(MealView::from)
        .collect();
    Ok(Json(matched))
}

/// POST /orders
#[instrument(skip(state), fields(meal_id = %body.meal_id, quantity = body.quantity))]
pub async fn place_order(
    State(state): State<AppState>,
    ActiveProfile(profile): ActiveProfile,
    Json(body): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<PlacedOrderResponse>), ApiError> {
    profile.require_role(Role::Student)?;
    if body.quantity < 1 {
        return Err(ApiError::Validation("order at least one portion".into()));
    }

    let (order, meal) = repo::place_order(&state.db, &profile, body.meal_id, body.quantity).await?;
    info!(order_id = %order.id, meal_id = %meal.id, "order placed");

    // Confirmation email and pickup reminder are best-effort: the
    // reservation stands whether or not they go through.
    let food_names = meal.food_item_names();
    let params = mailer::confirmation_params(
        &profile.email,
        &meal.title,
        meal.price,
        meal.pickup_time,
        &food_names,
    );
    if let Err(e) = state
        .mailer
        .send(&state.config.email.order_template_id, &params)
        .await
    {
        warn!(order_id = %order.id, error = %e, "order confirmation email failed");
    }
    if let Err(e) = reminders::repo::schedule(&state.db, &profile.email, &meal).await {
        warn!(order_id = %order.id, error = %e, "pickup reminder scheduling failed");
    }

    Ok((
        StatusCode::CREATED,
        Json(PlacedOrderResponse {
            order,
            meal: MealView::from(meal),
        }),
    ))
}

/// GET /orders/mine
#[instrument(skip(state))]
pub async fn my_orders(
    State(state): State<AppState>,
    ActiveProfile(profile): ActiveProfile,
) -> Result<Json<MyOrdersResponse>, ApiError> {
    profile.require_role(Role::Student)?;
    let rows = repo::list_my_orders(&state.db, profile.id).await?;
    let orders: Vec<MyOrderView> = rows.into_iter().map(MyOrderView::from).collect();
    let total_amount = orders.iter().map(|o| o.amount).sum();
    Ok(Json(MyOrdersResponse {
        orders,
        total_amount,
    }))
}
