use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{error::ApiError, state::AppState};

use super::dto::{PageInfo, SearchParams, SearchResponse, UserRequest, UserResponse};
use super::search::PageRequest;
use super::services;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(search_users).post(create_user))
        .route("/users/:id", put(update_user).delete(delete_user))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = services::validate(body(payload)?).map_err(client_error)?;

    let user = services::create_user(&state, fields)
        .await
        .map_err(client_error)?;

    let location = format!("/api/v1/users/{}", user.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(UserResponse::from(user)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = services::parse_user_id(&id).map_err(client_error)?;
    let fields = services::validate(body(payload)?).map_err(client_error)?;

    let user = services::update_user(&state, id, fields)
        .await
        .map_err(client_error)?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = services::parse_user_id(&id).map_err(client_error)?;
    services::delete_user(&state, id)
        .await
        .map_err(client_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, params))]
pub async fn search_users(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(params) = params.map_err(|e| {
        warn!(error = %e, "unable to bind search query");
        ApiError::Validation(e.body_text())
    })?;

    let page_size = services::effective_page_size(params.page_size, &state.config.paging);
    let request = PageRequest {
        token: params.next_page_token.clone(),
        page_size,
    };

    let page = services::search_users(&state, &params.filters(), &request)
        .await
        .map_err(client_error)?;

    Ok(Json(SearchResponse {
        users: page.users.into_iter().map(UserResponse::from).collect(),
        page_info: PageInfo {
            next_page_token: page.next_page_token,
            page_size,
        },
    }))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(v)| v).map_err(|e| {
        warn!(error = %e, "unable to bind request");
        ApiError::Validation(e.body_text())
    })
}

/// Log caller mistakes at warn; storage failures are logged when rendered.
fn client_error(e: ApiError) -> ApiError {
    if !matches!(e, ApiError::Storage(_)) {
        warn!(error = %e, "request rejected");
    }
    e
}
