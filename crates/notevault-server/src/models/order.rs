//! Order model: one captured (or later refunded) payment for one material.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use sqlx::{FromRow, Type};
use std::str::FromStr;
use uuid::Uuid;

/// Possible states of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Payment captured; the buyer may download
    Captured,
    /// Money returned to the buyer
    Refunded,
    /// Payment failed at the gateway
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Captured => "captured",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Failed => "failed",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "captured" => Ok(OrderStatus::Captured),
            "refunded" => Ok(OrderStatus::Refunded),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(format!(
                "Unsupported order status: {}. Supported: captured, refunded, failed",
                other
            )),
        }
    }
}

/// Represents a persisted order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Gateway payment id, unique across orders.
    #[serde(rename = "razorpayPaymentId")]
    pub payment_id: String,
    #[serde(rename = "razorpayOrderId")]
    pub gateway_order_id: Option<String>,
    /// `None` once the material has been deleted.
    pub material_id: Option<Uuid>,
    pub buyer_email: String,
    pub buyer_mobile: Option<String>,
    #[serde(rename = "amountPaidINR", with = "super::money")]
    pub amount_paid_inr: BigDecimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Data required to create a new order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub payment_id: String,
    pub gateway_order_id: Option<String>,
    pub material_id: Uuid,
    pub buyer_email: String,
    pub buyer_mobile: Option<String>,
    pub amount_paid_inr: BigDecimal,
}

impl NewOrder {
    /// Normalises buyer contact details the way they are stored.
    pub fn new(
        payment_id: String,
        gateway_order_id: Option<String>,
        material_id: Uuid,
        buyer_email: &str,
        buyer_mobile: Option<String>,
        amount_paid_inr: BigDecimal,
    ) -> Self {
        Self {
            payment_id,
            gateway_order_id,
            material_id,
            buyer_email: buyer_email.trim().to_lowercase(),
            buyer_mobile: buyer_mobile.filter(|m| !m.trim().is_empty()),
            amount_paid_inr,
        }
    }
}

impl Order {
    pub fn is_captured(&self) -> bool {
        self.status == OrderStatus::Captured
    }

    pub fn is_refunded(&self) -> bool {
        self.status == OrderStatus::Refunded
    }
}

/// An order joined with the title of its material, for admin listings.
///
/// Serializes with a nested `material: {_id, title}` object, `null` once
/// the material is gone.
#[derive(Debug, Clone, FromRow)]
pub struct OrderWithMaterial {
    #[sqlx(flatten)]
    pub order: Order,
    pub material_title: Option<String>,
}

#[derive(Serialize)]
struct MaterialRef<'a> {
    #[serde(rename = "_id")]
    id: Uuid,
    title: &'a str,
}

#[derive(Serialize)]
struct OrderRow<'a> {
    #[serde(flatten)]
    order: &'a Order,
    material: Option<MaterialRef<'a>>,
}

impl OrderWithMaterial {
    fn material(&self) -> Option<MaterialRef<'_>> {
        match (self.order.material_id, self.material_title.as_deref()) {
            (Some(id), Some(title)) => Some(MaterialRef { id, title }),
            _ => None,
        }
    }
}

impl Serialize for OrderWithMaterial {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        OrderRow {
            order: &self.order,
            material: self.material(),
        }
        .serialize(serializer)
    }
}
