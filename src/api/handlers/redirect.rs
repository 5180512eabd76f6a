//! Handler for short URL redirect.

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tracing::debug;

use crate::api::dto::resolve::ResolveQuery;
use crate::application::services::{Resolution, ResolveRequest};
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::client_info::client_info_from_request;

const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

/// Redirects a short code to its destination.
///
/// # Endpoint
///
/// `GET /{code}?revalidate=true`
///
/// # Responses
///
/// - **301**: live link, `Location` is the destination
/// - **307**: unknown or expired code, `Location` is the not-found page
/// - **301**: maintenance active, `Location` is the maintenance page
/// - **429**: client quota exhausted, with `Retry-After`
///
/// Every redirect carries `Cache-Control: no-cache, no-store, must-revalidate`
/// so browsers keep asking, and clicks keep being counted.
pub async fn redirect_handler(
    Path(code): Path<String>,
    Query(query): Query<ResolveQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Result<Response, AppError> {
    let request = ResolveRequest {
        code,
        force_revalidate: query.force_revalidate(),
        client: client_info_from_request(&headers, Some(addr), state.behind_proxy),
    };

    let response = match state.resolver.resolve(&request).await? {
        Resolution::Found(link) => redirect(StatusCode::MOVED_PERMANENTLY, &link.destination),
        Resolution::NotFound => {
            debug!("No live link for {}", request.code);
            redirect(StatusCode::TEMPORARY_REDIRECT, &state.not_found_url)
        }
        Resolution::Maintenance => redirect(StatusCode::MOVED_PERMANENTLY, &state.maintenance_url),
    };

    Ok(response)
}

fn redirect(status: StatusCode, location: &str) -> Response {
    let Ok(location) = HeaderValue::from_str(location) else {
        return AppError::store("Invalid redirect target", serde_json::json!({}))
            .into_response();
    };

    (
        status,
        [
            (header::LOCATION, location),
            (header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE)),
        ],
    )
        .into_response()
}
