use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discount {
    pub id: i64,
    pub code: Option<String>,
    pub name: String,
    pub discount_type: DiscountType,
    pub value: i64,
    pub max_discount_amount: Option<i64>,
    pub min_order_amount: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub usage_limit: Option<i64>,
    pub used_count: i64,
    pub customer_usage_limit: Option<i64>,
    pub applies_to: AppliesTo,
    pub is_active: bool,
}

impl Discount {
    /// Validity window is inclusive on both ends.
    pub fn is_within_window(&self, today: NaiveDate) -> bool {
        self.start_date <= today && today <= self.end_date
    }

    pub fn global_limit_reached(&self) -> bool {
        self.usage_limit
            .map(|limit| self.used_count >= limit)
            .unwrap_or(false)
    }

    /// Discount amount for a given original price. Percentage and fixed
    /// amounts are both clamped to `max_discount_amount` when set, and the
    /// result never exceeds the original price.
    pub fn compute_amount(&self, original_price: i64) -> i64 {
        let raw = match self.discount_type {
            DiscountType::Percentage => original_price * self.value / 100,
            DiscountType::FixedAmount => self.value,
        };
        let capped = match self.max_discount_amount {
            Some(cap) => raw.min(cap),
            None => raw,
        };
        capped.clamp(0, original_price)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    FixedAmount,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::FixedAmount => "fixed_amount",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "percentage" => Some(DiscountType::Percentage),
            "fixed_amount" => Some(DiscountType::FixedAmount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppliesTo {
    All,
    Specific,
}

impl AppliesTo {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppliesTo::All => "all",
            AppliesTo::Specific => "specific",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(AppliesTo::All),
            "specific" => Some(AppliesTo::Specific),
            _ => None,
        }
    }
}

/// Allow-list entry target for discounts with `applies_to = specific`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Service,
    Category,
    Barber,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Service => "service",
            TargetType::Category => "category",
            TargetType::Barber => "barber",
        }
    }
}

/// Per-customer grant of a discount, with its own usage counter and
/// optional cap/expiry independent of the discount's global limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDiscount {
    pub customer_id: i64,
    pub discount_id: i64,
    pub used_count: i64,
    pub max_usage: Option<i64>,
    pub expires_at: Option<NaiveDateTime>,
}

impl CustomerDiscount {
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_usage
            .map(|max| self.used_count >= max)
            .unwrap_or(false)
    }
}

/// Immutable audit record, one per successful application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountUsage {
    pub id: String,
    pub discount_id: i64,
    pub customer_id: i64,
    pub booking_id: String,
    pub original_amount: i64,
    pub discount_amount: i64,
    pub final_amount: i64,
    pub created_at: NaiveDateTime,
}
