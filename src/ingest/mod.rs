//! Feed ingestion.
//!
//! Submodules:
//! - `feed`      - HTTP retrieval of the raw feed body (`FeedFetcher`).
//! - `solar_xml` - XML body → `Snapshot` parser.
//! - `fixtures`  - representative feed payloads (test only).

pub mod feed;
pub mod fixtures;
pub mod solar_xml;
