/// propmon_service: HF/VHF propagation feed monitoring service.
///
/// # Module structure
///
/// ```text
/// propmon_service
/// ├── model       - shared data types (Snapshot, BandKey, PhenomenonKey, FeedError, …)
/// ├── config      - settings loader (propmon.toml, .env, PROPMON_* overrides)
/// ├── daemon      - refresh scheduler (timer, cycles, notification policy)
/// ├── monitor     - observable refresh state and tracked selection
/// ├── notify      - notification text and delivery (desktop, log)
/// ├── endpoint    - HTTP status/tracking API
/// ├── ingest
/// │   ├── feed      - HTTP retrieval of the XML feed
/// │   ├── solar_xml - XML body → Snapshot parser
/// │   └── fixtures (test only) - representative feed payloads
/// └── analysis
///     ├── diff    - snapshot-to-snapshot differ
///     └── tracked - user-tracked slots and their change detector
/// ```

/// Public modules
pub mod analysis;
pub mod config;
pub mod daemon;
pub mod endpoint;
pub mod ingest;
pub mod model;
pub mod monitor;
pub mod notify;
