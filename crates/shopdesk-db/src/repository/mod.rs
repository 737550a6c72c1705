//! # Repository Module
//!
//! Repositories over the two local cache tables.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Local Cache Tables                              │
//! │                                                                         │
//! │  Sync Engine                                                           │
//! │       │                                                                 │
//! │       │  db.collections().read(CollectionName::Repairs)                │
//! │       │  db.meta().get("lastActiveSession")                            │
//! │       ▼                                                                 │
//! │  CollectionRepository              MetaRepository                      │
//! │  ├── read(name)                    ├── get(key)                        │
//! │  ├── write(name, items)            ├── set(key, value)                 │
//! │  ├── summaries()                   └── remove(key)                     │
//! │  └── clear(name)                                                        │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  collections (name, items JSON)    cache_meta (key, value)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CollectionRepository`](collections::CollectionRepository) - Whole-array reads and writes per collection
//! - [`MetaRepository`](meta::MetaRepository) - Cache metadata key/value entries

pub mod collections;
pub mod meta;
