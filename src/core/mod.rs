//! Core registry logic.
//!
//! This module contains:
//! - ContentRegistry: content records and the publish transition
//! - RightsLedger: ownership and license terms
//! - RegistryService: the caller-facing entry point and creation flow
//! - Vocabulary: accepted extension names for content and license types

pub mod error;
pub mod ledger;
pub mod locks;
pub mod registry;
pub mod service;
pub mod vocabulary;

// Re-export commonly used types
pub use error::{RegistryError, Reply};
pub use ledger::RightsLedger;
pub use locks::RecordLocks;
pub use registry::{ContentFilter, ContentRegistry};
pub use service::RegistryService;
pub use vocabulary::Vocabulary;
