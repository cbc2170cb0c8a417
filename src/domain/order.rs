//! Order snapshot domain models
//!
//! The order record is owned by the checkout backend. The session only ever
//! holds the latest snapshot and replaces it wholesale on every load.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::artifact::PaymentChannel;

/// Which settlement routes the order accepts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentType {
    /// Card guarantee or wallet payment
    All,
    /// Card guarantee only
    Credit,
    /// Wallet payment only
    Pay,
}

/// Payment state of the order as reported by the backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderPaymentState {
    Pending,
    Progress,
    Success,
    Failed,
    #[serde(other)]
    Other,
}

/// A way for the guest to settle the order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    Wallet(PaymentChannel),
}

impl PaymentMethod {
    pub fn channel(&self) -> Option<PaymentChannel> {
        match self {
            PaymentMethod::CreditCard => None,
            PaymentMethod::Wallet(channel) => Some(*channel),
        }
    }

    pub fn is_wallet(&self) -> bool {
        matches!(self, PaymentMethod::Wallet(_))
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::CreditCard => write!(f, "credit_card"),
            PaymentMethod::Wallet(channel) => write!(f, "{}", channel),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "card" | "credit" | "credit_card" => Ok(PaymentMethod::CreditCard),
            other => other
                .parse::<PaymentChannel>()
                .map(PaymentMethod::Wallet),
        }
    }
}

/// Guest-facing stay details. Carried through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StayDetails {
    pub hotel_name: String,
    pub room_name: String,
    pub check_in: String,
    pub check_out: String,
    pub guest_name: Option<String>,
}

/// Snapshot of the externally owned order record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    pub order_id: String,
    #[serde(flatten)]
    pub stay: StayDetails,
    pub amount: String,
    pub currency: String,
    pub payment_type: PaymentType,
    pub payment_state: OrderPaymentState,
    #[serde(default)]
    pub is_guaranteed: bool,
    /// Absent or unparsable timestamps put the countdown in display-only mode
    #[serde(default, deserialize_with = "deserialize_lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderSnapshot {
    /// Methods the guest may choose from, default first
    pub fn available_methods(&self) -> Vec<PaymentMethod> {
        available_methods(self.payment_type)
    }

    pub fn default_method(&self) -> PaymentMethod {
        // available_methods never returns an empty list
        self.available_methods()[0]
    }

    pub fn is_paid(&self) -> bool {
        self.payment_state == OrderPaymentState::Success
    }
}

/// Methods offered for a payment type, default first
pub fn available_methods(payment_type: PaymentType) -> Vec<PaymentMethod> {
    match payment_type {
        PaymentType::All => vec![
            PaymentMethod::Wallet(PaymentChannel::WeChat),
            PaymentMethod::Wallet(PaymentChannel::Alipay),
            PaymentMethod::CreditCard,
        ],
        PaymentType::Credit => vec![PaymentMethod::CreditCard],
        PaymentType::Pay => vec![
            PaymentMethod::Wallet(PaymentChannel::WeChat),
            PaymentMethod::Wallet(PaymentChannel::Alipay),
        ],
    }
}

/// Accepts RFC 3339 strings or epoch milliseconds; anything else becomes `None`.
pub(crate) fn deserialize_lenient_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| parse_timestamp(&value)))
}

pub(crate) fn parse_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| s.parse::<i64>().ok().and_then(|ms| Utc.timestamp_millis_opt(ms).single())),
        serde_json::Value::Number(n) => n
            .as_i64()
            .filter(|ms| *ms > 0)
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}
