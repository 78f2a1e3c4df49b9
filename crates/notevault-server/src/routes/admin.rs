//! Admin back-office: session, dashboard, orders and refunds.
//!
//! Material management lives in [`super::admin_materials`] and is merged
//! into the same router.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::{clear_session_cookie, create_token, session_cookie, verify_password, AdminUser};
use crate::error::AppError;
use crate::gateway::to_paise;
use crate::models::{Admin, Order, OrderStatus, OrderWithMaterial};
use crate::purchase::ORDER_COLUMNS;
use crate::routes::admin_materials;
use crate::routes::materials::page_count;
use crate::state::AppState;

const DEFAULT_ORDERS_PAGE_SIZE: i64 = 50;
const MAX_ORDERS_PAGE_SIZE: i64 = 500;

/// Creates the admin router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/change-password", post(change_password))
        .route("/dashboard", get(dashboard))
        .route("/orders", get(list_orders))
        .route("/orders/csv", get(export_orders_csv))
        .route("/refund/{order_id}", post(refund_order))
        .merge(admin_materials::routes())
        .with_state(state)
}

/// `SELECT` list for orders with their material title.
fn order_with_title_columns() -> String {
    format!(
        "{}, (SELECT title FROM materials WHERE materials.id = orders.material_id) AS material_title",
        ORDER_COLUMNS
    )
}

// ===== Session =====

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// POST /api/admin/login
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (Some(username), Some(password)) = (
        req.username.as_deref().map(str::trim).filter(|u| !u.is_empty()),
        req.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::BadRequest(
            "Username and password required".to_string(),
        ));
    };

    let login = username.to_lowercase();
    let admin: Option<Admin> = sqlx::query_as(
        "SELECT id, username, email, password_hash, created_at FROM admins WHERE username = $1 OR LOWER(email) = $1 LIMIT 1",
    )
    .bind(&login)
    .fetch_optional(&state.pool)
    .await?;

    let admin = match admin {
        Some(admin) if verify_password(password, &admin.password_hash) => admin,
        _ => {
            tracing::warn!(username = %login, "Failed admin login");
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }
    };

    let hours = state.config.jwt_expires_hours;
    let token = create_token(admin.id, &admin.username, &state.config.jwt_secret, hours)?;
    let cookie = session_cookie(&token, hours * 3600, state.config.is_production());

    tracing::info!(admin_id = %admin.id, "Admin logged in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "success": true,
            "token": token,
            "admin": {
                "id": admin.id,
                "username": admin.username,
                "email": admin.email,
            }
        })),
    ))
}

/// POST /api/admin/logout
async fn logout(State(state): State<AppState>, admin: AdminUser) -> impl IntoResponse {
    tracing::info!(admin_id = %admin.id, "Admin logged out");
    (
        [(
            header::SET_COOKIE,
            clear_session_cookie(state.config.is_production()),
        )],
        Json(json!({ "success": true, "message": "Logged out successfully" })),
    )
}

/// POST /api/admin/change-password
///
/// Disabled: passwords are rotated by an operator directly in the database.
async fn change_password(_admin: AdminUser) -> Result<Json<Value>, AppError> {
    Err(AppError::Forbidden(
        "Password changes are disabled. Please contact the system administrator to change your password.".to_string(),
    ))
}

// ===== Dashboard =====

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TopMaterial {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub download_count: i64,
    #[serde(rename = "priceINR", with = "crate::models::money")]
    pub price_inr: BigDecimal,
}

/// Captured revenue and order count for one UTC day.
#[derive(Debug, Serialize, FromRow)]
pub struct DailyRevenue {
    /// `YYYY-MM-DD`
    #[serde(rename = "_id")]
    pub day: String,
    #[serde(with = "crate::models::money")]
    pub revenue: BigDecimal,
    pub count: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct DailyCount {
    #[serde(rename = "_id")]
    pub day: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_materials: i64,
    pub total_orders: i64,
    #[serde(with = "crate::models::money")]
    pub total_revenue: BigDecimal,
    pub today_orders: i64,
    #[serde(with = "crate::models::money")]
    pub today_revenue: BigDecimal,
    pub top_materials: Vec<TopMaterial>,
    pub recent_orders: Vec<OrderWithMaterial>,
    #[serde(rename = "revenueTrend7Days")]
    pub revenue_trend_7_days: Vec<DailyRevenue>,
    #[serde(rename = "revenueTrend30Days")]
    pub revenue_trend_30_days: Vec<DailyRevenue>,
    #[serde(rename = "ordersTrend7Days")]
    pub orders_trend_7_days: Vec<DailyCount>,
}

async fn revenue_trend(state: &AppState, days: i32) -> Result<Vec<DailyRevenue>, AppError> {
    let rows = sqlx::query_as(
        r#"
        SELECT to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD') AS day,
               COALESCE(SUM(amount_paid_inr), 0) AS revenue,
               COUNT(*) AS count
        FROM orders
        WHERE status = 'captured' AND created_at >= NOW() - make_interval(days => $1)
        GROUP BY day
        ORDER BY day
        "#,
    )
    .bind(days)
    .fetch_all(&state.pool)
    .await?;
    Ok(rows)
}

/// GET /api/admin/dashboard
async fn dashboard(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Value>, AppError> {
    let (total_materials,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM materials")
        .fetch_one(&state.pool)
        .await?;

    let (total_orders, total_revenue): (i64, BigDecimal) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(amount_paid_inr), 0) FROM orders WHERE status = 'captured'",
    )
    .fetch_one(&state.pool)
    .await?;

    let (today_orders, today_revenue): (i64, BigDecimal) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(amount_paid_inr), 0)
        FROM orders
        WHERE status = 'captured'
          AND created_at >= date_trunc('day', NOW() AT TIME ZONE 'UTC') AT TIME ZONE 'UTC'
        "#,
    )
    .fetch_one(&state.pool)
    .await?;

    let top_materials: Vec<TopMaterial> = sqlx::query_as(
        "SELECT id, title, download_count, price_inr FROM materials ORDER BY download_count DESC, created_at DESC LIMIT 5",
    )
    .fetch_all(&state.pool)
    .await?;

    let recent_orders: Vec<OrderWithMaterial> = sqlx::query_as(&format!(
        "SELECT {} FROM orders WHERE status = 'captured' ORDER BY created_at DESC LIMIT 10",
        order_with_title_columns()
    ))
    .fetch_all(&state.pool)
    .await?;

    let orders_trend_7_days: Vec<DailyCount> = sqlx::query_as(
        r#"
        SELECT to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD') AS day, COUNT(*) AS count
        FROM orders
        WHERE status = 'captured' AND created_at >= NOW() - INTERVAL '7 days'
        GROUP BY day
        ORDER BY day
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let stats = DashboardStats {
        total_materials,
        total_orders,
        total_revenue,
        today_orders,
        today_revenue,
        top_materials,
        recent_orders,
        revenue_trend_7_days: revenue_trend(&state, 7).await?,
        revenue_trend_30_days: revenue_trend(&state, 30).await?,
        orders_trend_7_days,
    };

    Ok(Json(json!({ "success": true, "stats": stats })))
}

// ===== Orders =====

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub status: Option<String>,
    pub email: Option<String>,
    pub material_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Default, PartialEq)]
pub struct OrderFilter {
    pub page: i64,
    pub limit: i64,
    pub status: Option<OrderStatus>,
    pub email: Option<String>,
    pub material_id: Option<Uuid>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl OrderFilter {
    pub fn from_query(query: &ListOrdersQuery) -> Result<Self, AppError> {
        let page = present(&query.page)
            .and_then(|p| p.parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let limit = present(&query.limit)
            .and_then(|l| l.parse::<i64>().ok())
            .filter(|l| *l >= 1)
            .unwrap_or(DEFAULT_ORDERS_PAGE_SIZE)
            .min(MAX_ORDERS_PAGE_SIZE);

        let status = present(&query.status)
            .map(OrderStatus::from_str)
            .transpose()
            .map_err(AppError::BadRequest)?;
        let material_id = present(&query.material_id)
            .map(|id| {
                Uuid::parse_str(id)
                    .map_err(|_| AppError::BadRequest("Invalid materialId".to_string()))
            })
            .transpose()?;
        let start = present(&query.start_date)
            .map(|d| parse_date(d).ok_or_else(|| AppError::BadRequest("Invalid startDate".to_string())))
            .transpose()?;
        let end = present(&query.end_date)
            .map(|d| parse_date(d).ok_or_else(|| AppError::BadRequest("Invalid endDate".to_string())))
            .transpose()?;

        Ok(Self {
            page,
            limit,
            status,
            email: present(&query.email).map(str::to_lowercase),
            material_id,
            start,
            end,
        })
    }
}

const ORDER_FILTER_SQL: &str = r#"
    ($1::order_status IS NULL OR status = $1)
    AND ($2::TEXT IS NULL OR buyer_email = $2)
    AND ($3::UUID IS NULL OR material_id = $3)
    AND ($4::TIMESTAMPTZ IS NULL OR created_at >= $4)
    AND ($5::TIMESTAMPTZ IS NULL OR created_at <= $5)
"#;

/// GET /api/admin/orders
async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Value>, AppError> {
    let filter = OrderFilter::from_query(&query)?;

    let (total,): (i64,) = sqlx::query_as(&format!(
        "SELECT COUNT(*) FROM orders WHERE {}",
        ORDER_FILTER_SQL
    ))
    .bind(filter.status)
    .bind(&filter.email)
    .bind(filter.material_id)
    .bind(filter.start)
    .bind(filter.end)
    .fetch_one(&state.pool)
    .await?;

    let orders: Vec<OrderWithMaterial> = sqlx::query_as(&format!(
        "SELECT {} FROM orders WHERE {} ORDER BY created_at DESC LIMIT $6 OFFSET $7",
        order_with_title_columns(),
        ORDER_FILTER_SQL
    ))
    .bind(filter.status)
    .bind(&filter.email)
    .bind(filter.material_id)
    .bind(filter.start)
    .bind(filter.end)
    .bind(filter.limit)
    .bind((filter.page - 1) * filter.limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(json!({
        "success": true,
        "orders": orders,
        "pagination": {
            "page": filter.page,
            "limit": filter.limit,
            "total": total,
            "pages": page_count(total, filter.limit),
        }
    })))
}

const CSV_HEADER: &str =
    "Order ID,Date,Material,Buyer Email,Buyer Mobile,Amount (₹),Status,Payment ID";

fn csv_cell(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Renders orders as CSV, every cell quoted.
pub fn orders_csv(orders: &[OrderWithMaterial]) -> String {
    let mut lines = Vec::with_capacity(orders.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for row in orders {
        let order = &row.order;
        let cells = [
            order.id.to_string(),
            order.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            row.material_title.clone().unwrap_or_else(|| "N/A".to_string()),
            order.buyer_email.clone(),
            order
                .buyer_mobile
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "N/A".to_string()),
            order.amount_paid_inr.to_string(),
            order.status.as_str().to_string(),
            order.payment_id.clone(),
        ];
        lines.push(
            cells
                .iter()
                .map(|c| csv_cell(c))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    lines.join("\n")
}

/// GET /api/admin/orders/csv
async fn export_orders_csv(
    State(state): State<AppState>,
    admin: AdminUser,
) -> Result<impl IntoResponse, AppError> {
    let orders: Vec<OrderWithMaterial> = sqlx::query_as(&format!(
        "SELECT {} FROM orders ORDER BY created_at DESC",
        order_with_title_columns()
    ))
    .fetch_all(&state.pool)
    .await?;

    tracing::info!(admin_id = %admin.id, rows = orders.len(), "Orders exported");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=orders.csv"),
        ],
        orders_csv(&orders),
    ))
}

// ===== Refunds =====

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Text(s) => s.trim() == "true",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RefundRequest {
    /// Partial refund in INR; the full amount when absent.
    #[serde(default, deserialize_with = "crate::models::money::option::deserialize")]
    pub amount: Option<BigDecimal>,
    #[serde(default)]
    manual: Option<Flag>,
}

impl RefundRequest {
    /// Parses an optional JSON body.
    pub fn from_body(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid refund request: {}", e)))
    }

    pub fn is_manual(&self) -> bool {
        self.manual.as_ref().is_some_and(Flag::is_set)
    }

    /// Refund amount in paise, `None` for a full refund.
    pub fn amount_paise(&self) -> Result<Option<i64>, AppError> {
        match &self.amount {
            None => Ok(None),
            Some(amount) if amount <= &BigDecimal::zero() => Err(AppError::BadRequest(
                "Refund amount must be positive".to_string(),
            )),
            Some(amount) => to_paise(amount)
                .map(Some)
                .ok_or_else(|| AppError::BadRequest("Invalid refund amount".to_string())),
        }
    }
}

async fn mark_refunded(state: &AppState, order_id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE orders SET status = 'refunded' WHERE id = $1")
        .bind(order_id)
        .execute(&state.pool)
        .await?;
    Ok(())
}

/// POST /api/admin/refund/{order_id}
async fn refund_order(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let req = RefundRequest::from_body(&body)?;
    let order_id = Uuid::parse_str(&raw_id)
        .map_err(|_| AppError::NotFound("Order not found".to_string()))?;

    let order: Order = sqlx::query_as(&format!(
        "SELECT {} FROM orders WHERE id = $1",
        ORDER_COLUMNS
    ))
    .bind(order_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    if order.is_refunded() {
        return Err(AppError::BadRequest("Order already refunded".to_string()));
    }

    let Some(gateway) = &state.gateway else {
        return Err(AppError::BadRequest(
            "Payment gateway not configured".to_string(),
        ));
    };

    let amount_paise = req.amount_paise()?;
    let notes = json!({
        "reason": "Refund requested by admin",
        "orderId": order.id.to_string(),
    });

    match gateway.refund(&order.payment_id, amount_paise, notes).await {
        Ok(refund) => {
            mark_refunded(&state, order.id).await?;
            tracing::info!(order_id = %order.id, admin_id = %admin.id, "Order refunded");
            Ok(Json(json!({
                "success": true,
                "refund": refund,
                "message": "Refund initiated successfully",
            })))
        }
        Err(e) if req.is_manual() => {
            tracing::warn!(order_id = %order.id, "Gateway refund failed, marking refunded manually: {}", e);
            mark_refunded(&state, order.id).await?;
            Ok(Json(json!({
                "success": true,
                "message": "Order marked as refunded (manual)",
            })))
        }
        Err(e) => Err(e),
    }
}
