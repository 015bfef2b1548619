use std::convert::Infallible;
use std::time::Duration;

use actix_web::http::header;
use actix_web::web::{self, Bytes};
use actix_web::{HttpRequest, HttpResponse};
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::IntervalStream;
use uuid::Uuid;

use super::error::ApiError;
use super::AppState;
use crate::actors::GetSystemHealth;
use crate::broadcast::{sse_frame, SSE_KEEP_ALIVE};
use crate::domain::order::{AdvanceStatus, Operator, OrderStatus, PlaceOrder};

pub const OPERATOR_ID_HEADER: &str = "x-operator-id";
pub const OPERATOR_NAME_HEADER: &str = "x-operator-name";

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Serialize)]
struct DataBody<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Operator set by the authentication layer in front of this service.
fn operator(req: &HttpRequest) -> Result<Option<Operator>, ApiError> {
    let Some(raw_id) = req.headers().get(OPERATOR_ID_HEADER) else {
        return Ok(None);
    };
    let id = raw_id
        .to_str()
        .ok()
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .ok_or_else(|| ApiError::BadRequest(format!("{OPERATOR_ID_HEADER} must be a UUID")))?;

    let name = req
        .headers()
        .get(OPERATOR_NAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    Ok(Some(Operator { id, name }))
}

/// `status` may repeat; values that are not a known status are ignored.
fn status_filter(query: &[(String, String)]) -> Vec<OrderStatus> {
    let mut statuses = Vec::new();
    for (key, value) in query {
        if key != "status" {
            continue;
        }
        match value.parse::<OrderStatus>() {
            Ok(status) if !statuses.contains(&status) => statuses.push(status),
            Ok(_) => {}
            Err(_) => tracing::debug!(value = %value, "Ignoring unknown status filter"),
        }
    }
    statuses
}

pub async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, ApiError> {
    let command = PlaceOrder::from_json(&body)
        .inspect_err(|e| state.metrics.record_rejection("create", e.reason()))?;
    let order = state.service.create(command).await?;
    Ok(HttpResponse::Created().json(DataBody { data: order }))
}

pub async fn list_orders(
    state: web::Data<AppState>,
    query: web::Query<Vec<(String, String)>>,
) -> Result<HttpResponse, ApiError> {
    let orders = state.service.list(&status_filter(&query)).await?;
    Ok(HttpResponse::Ok().json(DataBody { data: orders }))
}

pub async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let order = state.service.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(DataBody { data: order }))
}

pub async fn update_status(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<StatusUpdate>,
) -> Result<HttpResponse, ApiError> {
    let StatusUpdate { status, note } = body.into_inner();
    let command = AdvanceStatus::parse(path.into_inner(), &status)?
        .by(operator(&req)?)
        .with_note(note);

    let order = state.service.advance(command).await?;
    Ok(HttpResponse::Ok().json(DataBody { data: order }))
}

pub async fn delete_catalog_item(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    state.service.delete_catalog_item(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Server-Sent Events feed of every committed order change.
pub async fn stream_orders(state: web::Data<AppState>) -> HttpResponse {
    let events = state.service.subscribe().filter_map(|event| async move {
        match sse_frame(&event) {
            Ok(frame) => Some(Ok::<_, Infallible>(Bytes::from(frame))),
            Err(e) => {
                tracing::warn!(order_id = %event.order_id(), error = %e, "Failed to encode order event");
                None
            }
        }
    });

    let mut interval = tokio::time::interval(KEEP_ALIVE_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let keep_alive = IntervalStream::new(interval)
        .skip(1)
        .map(|_| Ok::<_, Infallible>(Bytes::from_static(SSE_KEEP_ALIVE.as_bytes())));

    let opening = stream::once(async { Ok::<_, Infallible>(Bytes::from_static(b": connected\n\n")) });

    tracing::debug!(subscribers = state.service.subscriber_count(), "SSE client connected");

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(opening.chain(stream::select(events, keep_alive)))
}

pub async fn health(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let health = state
        .health
        .send(GetSystemHealth)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("health monitor unavailable: {e}")))?;

    let mut response = if health.overall_status.is_unhealthy() {
        HttpResponse::ServiceUnavailable()
    } else {
        HttpResponse::Ok()
    };
    Ok(response.json(health.to_json()))
}

pub async fn metrics(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let buffer = state.metrics.render()?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_status_filter_ignores_unknown_and_duplicates() {
        let query = vec![
            ("status".to_string(), "ready".to_string()),
            ("status".to_string(), "cooking".to_string()),
            ("page".to_string(), "2".to_string()),
            ("status".to_string(), "ready".to_string()),
            ("status".to_string(), "received".to_string()),
        ];

        assert_eq!(status_filter(&query), vec![OrderStatus::Ready, OrderStatus::Received]);
        assert!(status_filter(&[("status".to_string(), "nope".to_string())]).is_empty());
    }

    #[test]
    fn test_operator_headers() {
        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header((OPERATOR_ID_HEADER, id.to_string()))
            .insert_header((OPERATOR_NAME_HEADER, " Admin "))
            .to_http_request();
        assert_eq!(
            operator(&req).unwrap(),
            Some(Operator { id, name: Some("Admin".to_string()) })
        );

        let anonymous = TestRequest::default().to_http_request();
        assert_eq!(operator(&anonymous).unwrap(), None);

        let garbage = TestRequest::default()
            .insert_header((OPERATOR_ID_HEADER, "admin"))
            .to_http_request();
        assert!(matches!(operator(&garbage), Err(ApiError::BadRequest(_))));
    }
}
