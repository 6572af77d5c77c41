use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::api::dto::{BidCreated, CustomerSelectRequest, SelectionResponse, StatusView, VendorJobView};
use crate::api::error::{ApiError, ApiResult};
use crate::api::ApiState;
use crate::engine::{JobUpdate, Selector};
use crate::error::DispatchError;
use crate::lifecycle::Requester;
use crate::model::{BidSubmission, JobDraft};

pub const REQUESTER_HEADER: &str = "x-requester-role";

fn requester(headers: &HeaderMap) -> ApiResult<Requester> {
    let Some(value) = headers.get(REQUESTER_HEADER) else {
        return Ok(Requester::default());
    };
    value
        .to_str()
        .ok()
        .and_then(Requester::parse)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid {} header", REQUESTER_HEADER)))
}

/// Ids that do not parse can never exist.
fn parse_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| DispatchError::NotFound(format!("{} {}", what, raw)).into())
}

pub async fn create_job(
    State(state): State<ApiState>,
    payload: Result<Json<JobDraft>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(draft) = payload?;
    let job = state.engine.create_job(draft).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn list_jobs(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.list_jobs().await?))
}

pub async fn get_job(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "job")?;
    Ok(Json(state.engine.get_job(id).await?))
}

pub async fn update_job(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<JobUpdate>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let requester = requester(&headers)?;
    let id = parse_id(&id, "job")?;
    let Json(update) = payload?;
    Ok(Json(state.engine.update_job(id, update, requester).await?))
}

pub async fn cancel_job(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "job")?;
    Ok(Json(state.engine.cancel_job(id).await?))
}

pub async fn open_bidding(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "job")?;
    Ok(Json(state.engine.open_bidding(id).await?))
}

pub async fn get_links(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "job")?;
    Ok(Json(state.engine.links(id).await?))
}

pub async fn list_job_bids(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "job")?;
    Ok(Json(state.engine.list_bids(id).await?))
}

/// `POST /bids/:key` where the key is a vendor token.
pub async fn submit_bid(
    State(state): State<ApiState>,
    Path(token): Path<String>,
    payload: Result<Json<BidSubmission>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(submission) = payload?;
    let bid = state.engine.submit_bid(&token, submission).await?;
    Ok((StatusCode::CREATED, Json(BidCreated::from(&bid))))
}

/// `POST /bids/:key/select` where the key is a bid id.
pub async fn select_bid(
    State(state): State<ApiState>,
    Path(bid_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let bid_id = parse_id(&bid_id, "bid")?;
    let assignment = state.engine.select_bid(bid_id, &Selector::Admin).await?;
    Ok(Json(SelectionResponse::from(&assignment)))
}

pub async fn customer_bids(
    State(state): State<ApiState>,
    Path(token): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.customer_bids(&token).await?))
}

pub async fn customer_select(
    State(state): State<ApiState>,
    Path(token): Path<String>,
    payload: Result<Json<CustomerSelectRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let raw = request
        .bid_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| DispatchError::Validation("bidId is required".to_string()))?;
    let bid_id = parse_id(raw.trim(), "bid")?;
    let assignment = state
        .engine
        .select_bid(bid_id, &Selector::Customer(token))
        .await?;
    Ok(Json(SelectionResponse::from(&assignment)))
}

pub async fn public_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "job")?;
    let job = state.engine.get_job(id).await?;
    Ok(Json(StatusView::from(job)))
}

pub async fn vendor_view(
    State(state): State<ApiState>,
    Path(token): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let job = state.engine.vendor_view(&token).await?;
    Ok(Json(VendorJobView::from(job)))
}

pub async fn list_alerts(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.list_alerts().await?))
}

pub async fn list_vendors(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.list_vendors().await?))
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
