//! # Subscription Browser
//!
//! Ingests a user's subscribed channels and downloaded-video metadata into a
//! normalized local SQLite database.
//!
//! Channel ids come from the live subscription listing or a CSV export and
//! are resolved against a page-size-limited upstream lookup in chunks. Video
//! records come from info-JSON files on disk. Every record is split into a
//! primary row, owned child rows, and associations to deduplicated lookup
//! tables (keywords, topics, tags, categories).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │ Id sources   │──▶│ BatchFetcher │──▶│   Pipeline   │──▶│  SQLite  │
//! │ subs/CSV/FS  │   │ chunk + page │   │ upsert+links │   │          │
//! └──────────────┘   └──────┬───────┘   └──────────────┘   └──────────┘
//!                           │
//!                    ┌──────▼───────┐
//!                    │ ContentCache │
//!                    │ disk/off/ref │
//!                    └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`cache`] | Keyed JSON content cache (disk, disabled, refresh) |
//! | [`fetch`] | Chunked, paginated bulk lookups with shortfall accounting |
//! | [`lookup`] | Deduplicated lookup tables, value → id resolution |
//! | [`associations`] | Many-to-many join rows |
//! | [`keywords`] | Keyword splitting and label normalization |
//! | [`ingest`] | Per-record persistence and run orchestration |
//! | [`sources`] | Subscription listing, CSV export, video file scan |
//! | [`youtube`] | Upstream HTTP client |
//! | [`credentials`] | Bearer token providers |
//! | [`models`] | Channel, subscription, and video record types |
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema |
//! | [`progress`] | Progress reporting on stderr |
//! | [`stats`] | Database statistics |
//! | [`error`] | Typed cache, lookup, and record errors |

pub mod associations;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod keywords;
pub mod lookup;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod sources;
pub mod stats;
pub mod youtube;
