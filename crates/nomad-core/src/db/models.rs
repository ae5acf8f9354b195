// Persistent models for the membership core.
//
// Every model round-trips through `serde_json::Value` with camelCase keys,
// which is the record shape the adapter layer stores.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ─── Access tier ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessTier {
    Standard,
    Premium,
}

impl AccessTier {
    /// Whether a plan of this tier may enter a space of `space_tier`.
    /// PREMIUM plans enter both tiers; STANDARD plans enter STANDARD only.
    pub fn admits(&self, space_tier: AccessTier) -> bool {
        !matches!((self, space_tier), (AccessTier::Standard, AccessTier::Premium))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Premium => "PREMIUM",
        }
    }
}

impl fmt::Display for AccessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Plan ───────────────────────────────────────────────────────

/// Included-day quota as reported to callers: a number, or `"unlimited"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaysAllowed {
    Limited(u32),
    Unlimited,
}

impl DaysAllowed {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Self::Unlimited)
    }

    /// Days left after `used`, or `None` for unlimited plans.
    pub fn remaining(&self, used: u32) -> Option<u32> {
        match self {
            Self::Limited(n) => Some(n.saturating_sub(used)),
            Self::Unlimited => None,
        }
    }

    /// Whether `used` distinct days exhaust the quota.
    pub fn exhausted_by(&self, used: u32) -> bool {
        match self {
            Self::Limited(n) => used >= *n,
            Self::Unlimited => false,
        }
    }
}

impl Serialize for DaysAllowed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Limited(n) => serializer.serialize_u32(*n),
            Self::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

impl<'de> Deserialize<'de> for DaysAllowed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Days(u32),
            Word(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Days(n) => Ok(Self::Limited(n)),
            Raw::Word(w) if w.eq_ignore_ascii_case("unlimited") => Ok(Self::Unlimited),
            Raw::Word(w) => Err(serde::de::Error::custom(format!("invalid day quota: {w}"))),
        }
    }
}

impl fmt::Display for DaysAllowed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(n) => write!(f, "{n}"),
            Self::Unlimited => f.write_str("unlimited"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub name: String,
    /// Price in minor currency units (kobo).
    pub price: i64,
    pub included_days: u32,
    /// Authoritative unlimited marker. `included_days` is ignored when set.
    pub unlimited: bool,
    pub access_tier: AccessTier,
    pub external_billing_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    pub fn days_allowed(&self) -> DaysAllowed {
        if self.unlimited {
            DaysAllowed::Unlimited
        } else {
            DaysAllowed::Limited(self.included_days)
        }
    }
}

// ─── Partner space ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerSpace {
    pub id: String,
    pub name: String,
    pub address: String,
    pub access_tier: AccessTier,
    #[serde(default)]
    pub amenities: Vec<String>,
    /// Payout owed to the partner per recorded check-in, in minor units.
    pub payout_per_checkin: i64,
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ─── Principal ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Subscriber,
    Partner,
    TeamAdmin,
    TeamMember,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscriber => "subscriber",
            Self::Partner => "partner",
            Self::TeamAdmin => "team_admin",
            Self::TeamMember => "team_member",
        }
    }

    /// Roles that hold check-in entitlements.
    pub fn can_check_in(&self) -> bool {
        !matches!(self, Self::Partner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    /// Stored lowercased.
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub role: Role,
    pub managed_space_id: Option<String>,
    pub team_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ─── Teams ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,
    pub admin_id: String,
    pub seats: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Expired => "EXPIRED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    pub team_id: String,
    pub email: String,
    pub status: InvitationStatus,
    pub invited_by: String,
    pub created_at: DateTime<Utc>,
}

// ─── Subscription (ledger entry) ────────────────────────────────

/// Who a ledger entry belongs to. Exactly one of the stored refs is set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionOwner {
    Principal(String),
    Team(String),
}

impl SubscriptionOwner {
    /// Storage field holding this owner's id.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Principal(_) => "principalId",
            Self::Team(_) => "teamId",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Principal(id) | Self::Team(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub principal_id: Option<String>,
    pub team_id: Option<String>,
    pub plan_id: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(
        id: String,
        owner: &SubscriptionOwner,
        plan_id: String,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        payment_reference: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let (principal_id, team_id) = match owner {
            SubscriptionOwner::Principal(id) => (Some(id.clone()), None),
            SubscriptionOwner::Team(id) => (None, Some(id.clone())),
        };
        Self {
            id,
            principal_id,
            team_id,
            plan_id,
            start_date,
            end_date,
            is_active: true,
            payment_reference,
            created_at,
        }
    }

    pub fn owner(&self) -> Option<SubscriptionOwner> {
        match (&self.principal_id, &self.team_id) {
            (Some(p), None) => Some(SubscriptionOwner::Principal(p.clone())),
            (None, Some(t)) => Some(SubscriptionOwner::Team(t.clone())),
            _ => None,
        }
    }

    /// An end date strictly before `today` means the entry has lapsed.
    pub fn has_lapsed(&self, today: NaiveDate) -> bool {
        self.end_date.is_some_and(|end| end < today)
    }
}

// ─── Check-in tokens and visits ─────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInToken {
    pub id: String,
    pub principal_id: String,
    /// Six ASCII digits.
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CheckInToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Append-only visit record; the only input to quota consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    pub id: String,
    pub principal_id: String,
    pub space_id: String,
    pub timestamp: DateTime<Utc>,
}
