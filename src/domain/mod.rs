//! Domain types for the registry.
//!
//! This module contains the core data structures:
//! - Content: content records and their identifiers
//! - Rights: the ownership/license envelope attached to each content record
//! - Principal: the opaque caller identity

pub mod content;
pub mod principal;
pub mod rights;

// Re-export commonly used types
pub use content::{ContentId, ContentRecord, ContentType, NewContent, MAX_DURATION};
pub use principal::Principal;
pub use rights::{LicenseType, RightsRecord, RightsTransfer, RoyaltyPercentage};
