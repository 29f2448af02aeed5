use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::ServiceError;

/// Lifecycle of an order.
///
/// Values are stored and exchanged exactly as their `string_value`, so the
/// persisted column, the JSON body and the log line always agree.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    #[serde(rename = "pending")]
    #[strum(serialize = "pending")]
    Pending,
    #[sea_orm(string_value = "partially pending")]
    #[serde(rename = "partially pending")]
    #[strum(serialize = "partially pending")]
    PartiallyPending,
    #[sea_orm(string_value = "awaiting_dispatch")]
    #[serde(rename = "awaiting_dispatch")]
    #[strum(serialize = "awaiting_dispatch")]
    AwaitingDispatch,
    #[sea_orm(string_value = "intrasite")]
    #[serde(rename = "intrasite")]
    #[strum(serialize = "intrasite")]
    Intrasite,
    #[sea_orm(string_value = "partially dispatched")]
    #[serde(rename = "partially dispatched")]
    #[strum(serialize = "partially dispatched")]
    PartiallyDispatched,
    #[sea_orm(string_value = "dispatching")]
    #[serde(rename = "dispatching")]
    #[strum(serialize = "dispatching")]
    Dispatching,
    #[sea_orm(string_value = "delivered")]
    #[serde(rename = "delivered")]
    #[strum(serialize = "delivered")]
    Delivered,
    #[sea_orm(string_value = "completed")]
    #[serde(rename = "completed")]
    #[strum(serialize = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    #[serde(rename = "cancelled")]
    #[strum(serialize = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    /// Position along the fulfillment path. Derived statuses only ever move
    /// to a higher rank.
    pub fn fulfillment_rank(self) -> u8 {
        match self {
            OrderStatus::Pending | OrderStatus::PartiallyPending => 0,
            OrderStatus::AwaitingDispatch => 1,
            OrderStatus::Intrasite => 2,
            OrderStatus::PartiallyDispatched => 3,
            OrderStatus::Dispatching => 4,
            OrderStatus::Delivered => 5,
            OrderStatus::Completed => 6,
            OrderStatus::Cancelled => u8::MAX,
        }
    }

    /// Orders in these states accept no further dispatch, payment or status changes.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Delivered)
    }

    /// Whether a procurement cascade may still move the order.
    pub fn accepts_procurement_cascade(self) -> bool {
        !matches!(
            self,
            OrderStatus::Cancelled | OrderStatus::Delivered | OrderStatus::Completed
        )
    }

    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        OrderStatus::from_str(raw.trim())
            .map_err(|_| ServiceError::InvalidStatus(format!("unknown order status '{}'", raw)))
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "partial")]
    Partial,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

/// Lifecycle of a purchase request raised against a vendor.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PurchaseRequestStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "awaiting_payment")]
    AwaitingPayment,
    #[sea_orm(string_value = "partial_payment")]
    PartialPayment,
    #[sea_orm(string_value = "awaiting_dispatch")]
    AwaitingDispatch,
    #[sea_orm(string_value = "intrasite")]
    Intrasite,
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl PurchaseRequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PurchaseRequestStatus::Rejected | PurchaseRequestStatus::Completed
        )
    }

    /// States in which a vendor payment may be recorded.
    pub fn accepts_payment(self) -> bool {
        matches!(
            self,
            PurchaseRequestStatus::AwaitingPayment
                | PurchaseRequestStatus::PartialPayment
                | PurchaseRequestStatus::AwaitingDispatch
        )
    }
}

/// How the money on a cancelled order is settled.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentAdjustmentAction {
    Adjust,
    Refund,
    Forfeit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CancellationType {
    Partial,
    Full,
}
