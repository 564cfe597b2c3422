use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Inventory category a lock applies to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    Flight,
    Hotel,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Flight => "FLIGHT",
            ItemType::Hotel => "HOTEL",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "FLIGHT" => Some(ItemType::Flight),
            "HOTEL" => Some(ItemType::Hotel),
            _ => None,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockStatus {
    Active,
    Expired,
    Released,
}

impl LockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockStatus::Active => "ACTIVE",
            LockStatus::Expired => "EXPIRED",
            LockStatus::Released => "RELEASED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ACTIVE" => Some(LockStatus::Active),
            "EXPIRED" => Some(LockStatus::Expired),
            "RELEASED" => Some(LockStatus::Released),
            _ => None,
        }
    }

    /// Expired and released locks never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, LockStatus::Expired | LockStatus::Released)
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One item a caller wants held, as supplied to lock creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRequestItem {
    pub item_type: ItemType,
    pub item_id: String,
    pub reference_id: String,
}

/// A temporary reservation of one inventory item on behalf of a trip session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lock {
    pub id: Uuid,
    pub itinerary_token: String,
    pub inquiry_token: String,
    pub item_type: ItemType,
    pub item_id: String,
    pub reference_id: String,
    pub supplier_reference: String,
    pub status: LockStatus,
    pub expires_at: DateTime<Utc>,
    pub city_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lock {
    /// New active lock, with its deadline taken from the supplier hold
    pub fn new(
        itinerary_token: String,
        inquiry_token: String,
        item: LockRequestItem,
        supplier_reference: String,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            itinerary_token,
            inquiry_token,
            item_type: item.item_type,
            item_id: item.item_id,
            reference_id: item.reference_id,
            supplier_reference,
            status: LockStatus::Active,
            expires_at,
            city_name: None,
            date: None,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    /// The deadline instant itself still counts as within the window
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_active(&self) -> bool {
        self.status == LockStatus::Active
    }
}

/// Field changes applied through the store's conditional update
#[derive(Debug, Clone)]
pub struct LockUpdate {
    pub status: Option<LockStatus>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl LockUpdate {
    /// Change-set that moves a lock to another status
    pub fn transition_to(status: LockStatus, now: DateTime<Utc>) -> Self {
        Self {
            status: Some(status),
            expires_at: None,
            updated_at: now,
        }
    }

    /// Change-set that advances the deadline after a confirmed extension
    pub fn extend_to(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            status: None,
            expires_at: Some(expires_at),
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn request_item() -> LockRequestItem {
        LockRequestItem {
            item_type: ItemType::Flight,
            item_id: "UA100".to_string(),
            reference_id: "ref-UA100".to_string(),
        }
    }

    #[test]
    fn new_locks_start_active_with_the_supplier_deadline() {
        let now = base_time();
        let lock = Lock::new(
            "itin-1".to_string(),
            "inq-1".to_string(),
            request_item(),
            "FL-0001".to_string(),
            now + Duration::minutes(15),
            now,
        );

        assert_eq!(lock.status, LockStatus::Active);
        assert!(lock.is_active());
        assert_eq!(lock.expires_at, now + Duration::minutes(15));
        assert_eq!(lock.created_at, now);
        assert_eq!(lock.updated_at, now);
        assert!(lock.city_name.is_none());
        assert!(lock.date.is_none());
    }

    #[test]
    fn expiry_is_exclusive_of_the_deadline_instant() {
        let now = base_time();
        let lock = Lock::new(
            "itin-1".to_string(),
            "inq-1".to_string(),
            request_item(),
            "FL-0001".to_string(),
            now + Duration::minutes(15),
            now,
        );

        assert!(!lock.has_expired(now + Duration::minutes(15)));
        assert!(lock.has_expired(now + Duration::minutes(15) + Duration::seconds(1)));
    }

    #[test]
    fn only_active_is_non_terminal() {
        assert!(!LockStatus::Active.is_terminal());
        assert!(LockStatus::Expired.is_terminal());
        assert!(LockStatus::Released.is_terminal());
    }

    #[test]
    fn statuses_and_item_types_round_trip_through_storage_strings() {
        assert_eq!(
            LockStatus::parse(LockStatus::Released.as_str()),
            Some(LockStatus::Released)
        );
        assert_eq!(ItemType::parse("HOTEL"), Some(ItemType::Hotel));
        assert_eq!(ItemType::parse("CRUISE"), None);
        assert_eq!(LockStatus::parse("PENDING"), None);
    }

    #[test]
    fn update_builders_touch_only_their_fields() {
        let now = base_time();

        let transition = LockUpdate::transition_to(LockStatus::Expired, now);
        assert_eq!(transition.status, Some(LockStatus::Expired));
        assert!(transition.expires_at.is_none());
        assert_eq!(transition.updated_at, now);

        let extension = LockUpdate::extend_to(now + Duration::minutes(30), now);
        assert!(extension.status.is_none());
        assert_eq!(extension.expires_at, Some(now + Duration::minutes(30)));
    }
}
