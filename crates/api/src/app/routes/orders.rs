use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use terminal_core::OrderId;
use terminal_infra::workflows::{AppServices, NewOrder, OrderUpdate};
use terminal_orders::OrderStatus;

use crate::app::{dto, errors};
use crate::context::StaffContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(store_list).post(publish_order))
        .route("/new", get(order_form).post(create_order))
        .route("/admin", get(admin_list))
        .route("/search", get(search))
        .route("/export", get(export))
        .route("/delete", post(delete_orders))
        .route("/executor-assign", post(assign_executor))
        .route("/:id", get(order_card).post(update_order))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/fail", post(fail_order))
}

pub async fn order_form(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(staff): Extension<StaffContext>,
    Query(params): Query<dto::FormParams>,
) -> axum::response::Response {
    match services
        .order_form(staff.profile(), params.store_id, params.department_id)
        .await
    {
        Ok(form) => (StatusCode::OK, Json(form)).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(staff): Extension<StaffContext>,
    Json(body): Json<NewOrder>,
) -> axum::response::Response {
    match services.create_order(staff.profile(), body, Utc::now()).await {
        Ok(id) => (StatusCode::CREATED, Json(json!({ "id": id }))).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn order_card(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match id.parse::<OrderId>() {
        Ok(id) => id,
        Err(e) => return errors::bad_request(e),
    };
    match services.order_card(staff.profile(), id).await {
        Ok(card) => (StatusCode::OK, Json(card)).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn update_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
    Json(body): Json<OrderUpdate>,
) -> axum::response::Response {
    let id = match id.parse::<OrderId>() {
        Ok(id) => id,
        Err(e) => return errors::bad_request(e),
    };
    match services.update_order(staff.profile(), id, body, Utc::now()).await {
        Ok(id) => (StatusCode::OK, Json(json!({ "id": id }))).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn publish_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(staff): Extension<StaffContext>,
    Json(body): Json<dto::PublishRequest>,
) -> axum::response::Response {
    match services
        .publish_order(staff.profile(), body.order_id, Utc::now())
        .await
    {
        Ok(id) => (StatusCode::OK, Json(json!({ "id": id }))).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn store_list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(staff): Extension<StaffContext>,
    Query(params): Query<dto::StoreListParams>,
) -> axum::response::Response {
    let query = match params.into_query() {
        Ok(q) => q,
        Err(e) => return errors::bad_request(e),
    };
    match services.store_list(staff.profile(), &query).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn admin_list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(staff): Extension<StaffContext>,
    Query(params): Query<dto::AdminListParams>,
) -> axum::response::Response {
    let query = match params.into_query() {
        Ok(q) => q,
        Err(e) => return errors::bad_request(e),
    };
    match services.admin_list(staff.profile(), &query).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn search(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(staff): Extension<StaffContext>,
    Query(params): Query<dto::SearchParams>,
) -> axum::response::Response {
    match services.search(staff.profile(), &params.q).await {
        Ok(orders) => (StatusCode::OK, Json(json!({ "orders": orders }))).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn export(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(staff): Extension<StaffContext>,
    Query(params): Query<dto::ExportParams>,
) -> axum::response::Response {
    let query = match params.into_query() {
        Ok(q) => q,
        Err(e) => return errors::bad_request(e),
    };
    match services.export_orders(staff.profile(), &query, Utc::now()).await {
        Ok(link) => (StatusCode::OK, Json(json!({ "link": link }))).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn delete_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(staff): Extension<StaffContext>,
    Query(params): Query<dto::DeleteParams>,
) -> axum::response::Response {
    let ids = match params.ids() {
        Ok(ids) => ids,
        Err(e) => return errors::bad_request(e),
    };
    match services.delete_orders(staff.profile(), &ids).await {
        Ok(deleted) => (StatusCode::OK, Json(json!({ "deleted": deleted }))).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn assign_executor(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(staff): Extension<StaffContext>,
    Json(body): Json<dto::ExecutorAssignRequest>,
) -> axum::response::Response {
    match services
        .assign_executor(staff.profile(), body.order_id, &body.executor_phone, Utc::now())
        .await
    {
        Ok(assignment) => (StatusCode::OK, Json(assignment)).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    change_status(services, staff, id, OrderStatus::Cancelled).await
}

pub async fn fail_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    change_status(services, staff, id, OrderStatus::NotCompleted).await
}

async fn change_status(
    services: Arc<AppServices>,
    staff: StaffContext,
    id: String,
    status: OrderStatus,
) -> axum::response::Response {
    let id = match id.parse::<OrderId>() {
        Ok(id) => id,
        Err(e) => return errors::bad_request(e),
    };
    match services.change_status(staff.profile(), id, status, Utc::now()).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}
