//! holoreg - Content registry and rights ledger
//!
//! Tracks digital content records and the licensing rights attached to each
//! record: what content exists and whether it is published, and who holds
//! the rights to it under which license terms.
//!
//! # Architecture
//!
//! - Every content record is born together with exactly one rights record
//! - Only the creator may publish; publication is a one-way latch
//! - Only the current rights owner may transfer; a transfer overwrites all terms
//! - Mutations are serialized per content id
//!
//! # Modules
//!
//! - `core`: Registry, ledger, service and errors
//! - `domain`: Data structures (ContentRecord, RightsRecord, Principal)
//! - `store`: Storage backends (memory, JSONL journal, SQLite)
//! - `config`: Configuration loading
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Register content
//! holoreg --as alice create --title "Live Set" --hash abc123 --type performance --duration 300
//!
//! # Publish it
//! holoreg --as alice publish 1
//!
//! # Hand the rights to someone else
//! holoreg --as alice transfer 1 --to bob --license non-exclusive --royalty 10
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod store;

// Re-export main types at crate root for convenience
pub use crate::core::{ContentFilter, RegistryError, RegistryService, Reply, Vocabulary};
pub use domain::{
    ContentId, ContentRecord, ContentType, LicenseType, NewContent, Principal, RightsRecord,
    RightsTransfer, RoyaltyPercentage, MAX_DURATION,
};
pub use store::{JournalStore, MemoryStore, RecordStore, SqliteStore, StoreError};
