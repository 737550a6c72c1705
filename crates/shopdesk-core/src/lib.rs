//! # shopdesk-core: Pure Types for Shopdesk
//!
//! This crate holds the types shared by the local cache (`shopdesk-db`) and the
//! synchronization engine (`shopdesk-sync`). It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Shopdesk Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Browser UI (external)                        │   │
//! │  │    Inventory ──► Repairs ──► Invoices ──► Customers ...        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ status / refresh events                │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    shopdesk-sync (engine)                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ shopdesk-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────────┐  ┌──────────────┐  ┌──────────────────┐   │   │
//! │  │   │     types      │  │    error     │  │   validation     │   │   │
//! │  │   │ CollectionName │  │  CoreError   │  │ identity/secret  │   │   │
//! │  │   │ SyncSession    │  │  Validation  │  │ subject id       │   │   │
//! │  │   │ EngineStatus   │  │              │  │                  │   │   │
//! │  │   └────────────────┘  └──────────────┘  └──────────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Collection names, session, connectivity, engine status
//! - [`error`] - Domain error types
//! - [`validation`] - Credential validation

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

/// Number of collections kept in sync.
pub const COLLECTION_COUNT: usize = CollectionName::ALL.len();
