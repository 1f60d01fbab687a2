use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    Json,
};
use tracing::{info, instrument, warn};

use crate::auth::dto::{
    Profile, ProfileDetailsRequest, Role, SessionResponse, SetRoleRequest, SignInRequest,
};
use crate::auth::repo;
use crate::auth::session::{is_valid_email, AuthUser, JwtKeys};
use crate::error::ApiError;
use crate::state::AppState;

/// POST /auth/signin
///
/// Hands the ID token to the identity provider; first-ever sign-in creates a
/// bare profile, later sign-ins load the existing one.
#[instrument(skip(state, body))]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(body): Json<SignInRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let identity = state.identity.resolve(&body.id_token).await.map_err(|e| {
        warn!(error = %e, "identity provider rejected sign-in");
        ApiError::NotAuthenticated
    })?;

    if !is_valid_email(&identity.email) {
        return Err(ApiError::Validation("provider returned an invalid email".into()));
    }

    let user = repo::ensure_user(&state.db, &identity.subject, &identity.email).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, "signed in");
    Ok(Json(SessionResponse {
        token,
        profile: Profile::from(user),
    }))
}

/// POST /auth/signout — sessions are stateless tokens, so this is a no-op on
/// the server and idempotent by construction.
#[instrument]
pub async fn sign_out() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// GET /me
#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Profile>, ApiError> {
    let row = repo::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotAuthenticated)?;
    Ok(Json(Profile::from(row)))
}

/// PUT /me/role — the role is chosen exactly once, right after sign-up.
#[instrument(skip(state))]
pub async fn set_role(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<Profile>, ApiError> {
    match repo::set_role(&state.db, user_id, body.role.as_str()).await? {
        Some(row) => {
            info!(user_id = %user_id, role = body.role.as_str(), "role chosen");
            Ok(Json(Profile::from(row)))
        }
        None => match repo::find_by_id(&state.db, user_id).await? {
            Some(_) => Err(ApiError::Validation("role has already been chosen".into())),
            None => Err(ApiError::NotAuthenticated),
        },
    }
}

/// PUT /me/details
#[instrument(skip(state, body))]
pub async fn set_details(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<ProfileDetailsRequest>,
) -> Result<Json<Profile>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::Validation("name must not be empty".into()));
    }
    if body.phone.trim().is_empty() {
        return Err(ApiError::Validation("phone number must not be empty".into()));
    }

    if body.location.is_some() {
        let row = repo::find_by_id(&state.db, user_id)
            .await?
            .ok_or(ApiError::NotAuthenticated)?;
        if row.role.as_deref().and_then(Role::parse) != Some(Role::House) {
            return Err(ApiError::Validation(
                "only house accounts carry a location".into(),
            ));
        }
    }

    let (area, address) = match &body.location {
        Some(loc) => (Some(loc.area.as_str()), Some(loc.address.as_str())),
        None => (None, None),
    };

    let row = repo::set_details(
        &state.db,
        user_id,
        body.name.trim(),
        body.phone.trim(),
        area,
        address,
    )
    .await?
    .ok_or(ApiError::NotAuthenticated)?;

    Ok(Json(Profile::from(row)))
}
