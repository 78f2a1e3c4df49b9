//! Recording completed purchases and downloads.
//!
//! Both the checkout callback and the gateway webhook can be first to
//! report a payment. Whichever inserts the order wins; the unique index on
//! `orders.payment_id` turns the loser into "already processed".

use chrono::{DateTime, Duration, Utc};
use notevault_crypto::DownloadToken;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{NewDownload, NewOrder, Order};

/// Column list for `Order` rows.
pub const ORDER_COLUMNS: &str = "id, payment_id, gateway_order_id, material_id, buyer_email, buyer_mobile, amount_paid_inr, status, created_at";

pub const DUPLICATE_PAYMENT: &str = "Payment already processed";

async fn insert_download(conn: &mut PgConnection, download: &NewDownload) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO downloads (id, material_id, order_id, email, mobile, is_free, downloaded_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(download.material_id)
    .bind(download.order_id)
    .bind(&download.email)
    .bind(&download.mobile)
    .bind(download.is_free)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE materials SET download_count = download_count + 1, updated_at = NOW() WHERE id = $1",
    )
    .bind(download.material_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Logs a free download and bumps the material's counter.
pub async fn record_free_download(pool: &PgPool, download: &NewDownload) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    insert_download(&mut tx, download).await?;
    tx.commit().await?;
    Ok(())
}

/// Creates a captured order with its paid download in one transaction.
///
/// A duplicate payment id fails with `BadRequest("Payment already processed")`
/// and leaves nothing behind.
pub async fn record_paid_order(pool: &PgPool, new_order: &NewOrder) -> Result<Order, AppError> {
    let mut tx = pool.begin().await?;

    let order: Order = sqlx::query_as(&format!(
        r#"
        INSERT INTO orders (id, payment_id, gateway_order_id, material_id, buyer_email, buyer_mobile, amount_paid_inr, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'captured', NOW())
        RETURNING {}
        "#,
        ORDER_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(&new_order.payment_id)
    .bind(&new_order.gateway_order_id)
    .bind(new_order.material_id)
    .bind(&new_order.buyer_email)
    .bind(&new_order.buyer_mobile)
    .bind(&new_order.amount_paid_inr)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| AppError::from_insert(e, DUPLICATE_PAYMENT))?;

    let download = NewDownload::paid(
        new_order.material_id,
        order.id,
        &order.buyer_email,
        order.buyer_mobile.clone(),
    );
    insert_download(&mut tx, &download).await?;

    tx.commit().await?;

    tracing::info!(
        order_id = %order.id,
        payment_id = %order.payment_id,
        material_id = %new_order.material_id,
        "Order recorded"
    );
    Ok(order)
}

/// Path of a signed, expiring download link for a paid order.
pub fn paid_download_path(config: &Config, order_id: Uuid, now: DateTime<Utc>) -> String {
    let expires = (now + Duration::hours(config.download_link_ttl_hours)).timestamp();
    let token = DownloadToken::sign(
        &config.download_link_secret,
        &paid_resource(order_id),
        expires,
    );
    format!("/api/download/paid/{}?{}", order_id, token.to_query())
}

/// Resource name bound into paid download tokens.
pub fn paid_resource(order_id: Uuid) -> String {
    format!("paid:{}", order_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paid_download_path_verifies() {
        let config = Config::local("postgres://localhost/notevault");
        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let path = paid_download_path(&config, order_id, now);

        let prefix = format!("/api/download/paid/{}?expires=", order_id);
        assert!(path.starts_with(&prefix));

        let query = path.split_once('?').unwrap().1;
        let mut expires = 0;
        let mut sig = String::new();
        for pair in query.split('&') {
            match pair.split_once('=').unwrap() {
                ("expires", v) => expires = v.parse().unwrap(),
                ("sig", v) => sig = v.to_string(),
                _ => {}
            }
        }
        assert_eq!(expires, (now + Duration::hours(24)).timestamp());

        let token = DownloadToken { expires, sig };
        assert!(token
            .verify(&config.download_link_secret, &paid_resource(order_id), now.timestamp())
            .is_ok());
        assert!(token
            .verify(&config.download_link_secret, &paid_resource(Uuid::new_v4()), now.timestamp())
            .is_err());
    }
}
