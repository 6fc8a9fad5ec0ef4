//! Rights records: the mutable ownership and license envelope of a content item.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentId, Principal};

/// Scope of the rights held over a content item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum LicenseType {
    /// Sole rights holder
    Exclusive,

    /// Rights may be held by multiple parties
    NonExclusive,

    /// A deployment-specific license term
    Extension(String),
}

impl LicenseType {
    /// Canonical lowercase name
    pub fn as_str(&self) -> &str {
        match self {
            LicenseType::Exclusive => "exclusive",
            LicenseType::NonExclusive => "non-exclusive",
            LicenseType::Extension(name) => name,
        }
    }

    /// Whether this is one of the built-in variants
    pub fn is_builtin(&self) -> bool {
        !matches!(self, LicenseType::Extension(_))
    }
}

impl Default for LicenseType {
    fn default() -> Self {
        Self::Exclusive
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for LicenseType {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "exclusive" => LicenseType::Exclusive,
            "non-exclusive" | "non_exclusive" | "nonexclusive" => LicenseType::NonExclusive,
            other => LicenseType::Extension(other.to_string()),
        }
    }
}

impl From<&str> for LicenseType {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<LicenseType> for String {
    fn from(t: LicenseType) -> Self {
        t.as_str().to_string()
    }
}

/// Royalty share in whole percent, always within 0..=100
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct RoyaltyPercentage(u8);

impl RoyaltyPercentage {
    pub const MAX: u32 = 100;

    /// Validate a raw percentage
    pub fn new(value: u32) -> Result<Self, String> {
        if value > Self::MAX {
            return Err(format!(
                "Royalty percentage must be between 0 and {}, got {}",
                Self::MAX,
                value
            ));
        }
        Ok(Self(value as u8))
    }

    pub fn get(self) -> u32 {
        u32::from(self.0)
    }
}

impl TryFrom<u32> for RoyaltyPercentage {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoyaltyPercentage> for u32 {
    fn from(r: RoyaltyPercentage) -> Self {
        r.get()
    }
}

impl fmt::Display for RoyaltyPercentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Current rights over a content item (1:1 with its content record)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RightsRecord {
    /// Content this record belongs to
    pub content_id: ContentId,

    /// Current rights holder
    pub owner: Principal,

    /// License scope
    pub license_type: LicenseType,

    /// Royalty share owed downstream (stored only, never paid out here)
    pub royalty_percentage: RoyaltyPercentage,

    /// When the license lapses (`None` = never)
    pub expiration_date: Option<DateTime<Utc>>,
}

impl RightsRecord {
    /// Rights as they stand at creation: exclusive, no royalty, no expiry
    pub fn initial(content_id: ContentId, owner: Principal) -> Self {
        Self {
            content_id,
            owner,
            license_type: LicenseType::Exclusive,
            royalty_percentage: RoyaltyPercentage::default(),
            expiration_date: None,
        }
    }

    /// Whether the license has lapsed at `at`
    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        self.expiration_date.is_some_and(|exp| exp <= at)
    }
}

/// Replacement terms for a rights record.
///
/// Applied as a full overwrite: every field is replaced, so callers that only
/// want to change one term must resupply the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RightsTransfer {
    pub new_owner: Principal,
    pub license_type: LicenseType,
    pub royalty_percentage: u32,
    pub expiration_date: Option<DateTime<Utc>>,
}

impl RightsTransfer {
    pub fn new(
        new_owner: Principal,
        license_type: impl Into<LicenseType>,
        royalty_percentage: u32,
        expiration_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            new_owner,
            license_type: license_type.into(),
            royalty_percentage,
            expiration_date,
        }
    }

    /// Transfer that keeps every term of `current` except the royalty
    pub fn keeping_terms(current: &RightsRecord, royalty_percentage: u32) -> Self {
        Self {
            new_owner: current.owner.clone(),
            license_type: current.license_type.clone(),
            royalty_percentage,
            expiration_date: current.expiration_date,
        }
    }
}
