//! Core data types for the propagation monitoring service.
//!
//! This module defines the shared domain model imported by all other modules:
//! the parsed `Snapshot`, its keyed sub-readings, the lookup keys used for
//! change detection, and the error taxonomy of the fetch/parse pipeline.
//! It contains no I/O.

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Feed constants
// ---------------------------------------------------------------------------

/// Default endpoint for the N0NBH solar-terrestrial XML feed.
pub const DEFAULT_FEED_URL: &str = "https://www.hamqsl.com/solarxml.php";

/// Format of the feed's `<updated>` stamp once the trailing zone is removed,
/// e.g. `"16 Oct 2026 1200"`.
const UPDATED_FORMAT: &str = "%d %b %Y %H%M";

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// One HF band forecast slot from `<calculatedconditions>`.
///
/// `time` is kept exactly as the feed wrote it; use [`BandCondition::key`]
/// for comparisons, which lowercases it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BandCondition {
    pub band: String,      // name attribute, e.g. "80m-40m"
    pub time: String,      // time attribute, e.g. "day"
    pub condition: String, // element text, e.g. "Poor"
}

impl BandCondition {
    pub fn key(&self) -> BandKey {
        BandKey::new(&self.band, &self.time)
    }

    pub fn time_of_day(&self) -> Option<TimeOfDay> {
        TimeOfDay::parse(&self.time)
    }
}

/// One VHF phenomenon slot from `<calculatedvhfconditions>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VhfCondition {
    pub phenomenon: String, // name attribute, e.g. "vhf-aurora"
    pub location: String,   // location attribute, e.g. "northern_hemi"
    pub condition: String,  // element text, e.g. "Band Closed"
}

impl VhfCondition {
    pub fn key(&self) -> PhenomenonKey {
        PhenomenonKey::new(&self.phenomenon, &self.location)
    }
}

/// One complete reading of the propagation feed.
///
/// Every scalar is stored as the trimmed element text; numeric
/// interpretation is left to callers (see the `*_value` accessors).
/// Fields missing from the document stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub source: String,
    pub source_url: String,
    pub updated: String,

    pub solar_flux: String,
    pub a_index: String,
    pub k_index: String,
    pub k_index_nt: String,
    pub xray: String,
    pub sunspots: String,
    pub helium_line: String,
    pub proton_flux: String,
    pub electron_flux: String,
    pub aurora: String,
    pub normalization: String,
    pub lat_degree: String,
    pub solar_wind: String,
    pub magnetic_field: String,
    pub geomag_field: String,
    pub signal_noise: String,
    pub fof2: String,
    pub muf_factor: String,
    pub muf: String,

    pub band_conditions: Vec<BandCondition>,
    pub vhf_conditions: Vec<VhfCondition>,
}

/// XML tags of the scalar leaf elements, in feed order.
///
/// `source@url` is not listed: it is an attribute, captured separately
/// into `Snapshot::source_url`.
pub const SCALAR_TAGS: &[&str] = &[
    "source",
    "updated",
    "solarflux",
    "aindex",
    "kindex",
    "kindexnt",
    "xray",
    "sunspots",
    "heliumline",
    "protonflux",
    "electonflux", // sic, the feed's spelling
    "aurora",
    "normalization",
    "latdegree",
    "solarwind",
    "magneticfield",
    "geomagfield",
    "signalnoise",
    "fof2",
    "muffactor",
    "muf",
];

impl Snapshot {
    /// Returns the scalar stored for an XML tag, or `None` for an unknown tag.
    pub fn scalar(&self, tag: &str) -> Option<&str> {
        let value = match tag {
            "source" => &self.source,
            "source@url" => &self.source_url,
            "updated" => &self.updated,
            "solarflux" => &self.solar_flux,
            "aindex" => &self.a_index,
            "kindex" => &self.k_index,
            "kindexnt" => &self.k_index_nt,
            "xray" => &self.xray,
            "sunspots" => &self.sunspots,
            "heliumline" => &self.helium_line,
            "protonflux" => &self.proton_flux,
            "electonflux" => &self.electron_flux,
            "aurora" => &self.aurora,
            "normalization" => &self.normalization,
            "latdegree" => &self.lat_degree,
            "solarwind" => &self.solar_wind,
            "magneticfield" => &self.magnetic_field,
            "geomagfield" => &self.geomag_field,
            "signalnoise" => &self.signal_noise,
            "fof2" => &self.fof2,
            "muffactor" => &self.muf_factor,
            "muf" => &self.muf,
            _ => return None,
        };
        Some(value)
    }

    /// Mutable access used while a snapshot is being built by the parser.
    pub(crate) fn scalar_mut(&mut self, tag: &str) -> Option<&mut String> {
        let value = match tag {
            "source" => &mut self.source,
            "source@url" => &mut self.source_url,
            "updated" => &mut self.updated,
            "solarflux" => &mut self.solar_flux,
            "aindex" => &mut self.a_index,
            "kindex" => &mut self.k_index,
            "kindexnt" => &mut self.k_index_nt,
            "xray" => &mut self.xray,
            "sunspots" => &mut self.sunspots,
            "heliumline" => &mut self.helium_line,
            "protonflux" => &mut self.proton_flux,
            "electonflux" => &mut self.electron_flux,
            "aurora" => &mut self.aurora,
            "normalization" => &mut self.normalization,
            "latdegree" => &mut self.lat_degree,
            "solarwind" => &mut self.solar_wind,
            "magneticfield" => &mut self.magnetic_field,
            "geomagfield" => &mut self.geomag_field,
            "signalnoise" => &mut self.signal_noise,
            "fof2" => &mut self.fof2,
            "muffactor" => &mut self.muf_factor,
            "muf" => &mut self.muf,
            _ => return None,
        };
        Some(value)
    }

    /// Iterates `(tag, value)` over every scalar, including `source@url`.
    pub fn scalars(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        SCALAR_TAGS
            .iter()
            .copied()
            .chain(std::iter::once("source@url"))
            .filter_map(move |tag| self.scalar(tag).map(|value| (tag, value)))
    }

    /// Parses the feed's `updated` stamp, e.g. `"16 Oct 2026 1200 GMT"`.
    ///
    /// The feed always reports GMT; any trailing zone abbreviation is dropped.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        let trimmed = self.updated.trim();
        let without_zone = trimmed
            .strip_suffix("GMT")
            .or_else(|| trimmed.strip_suffix("UTC"))
            .unwrap_or(trimmed)
            .trim();
        NaiveDateTime::parse_from_str(without_zone, UPDATED_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn solar_flux_value(&self) -> Option<f64> {
        self.solar_flux.trim().parse().ok()
    }

    pub fn k_index_value(&self) -> Option<f64> {
        self.k_index.trim().parse().ok()
    }

    pub fn a_index_value(&self) -> Option<f64> {
        self.a_index.trim().parse().ok()
    }
}

/// Renders a UTC instant in the local zone as `yyyy-MM-dd HH:mm:ss`.
pub fn format_local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Day,
    Night,
}

impl TimeOfDay {
    /// Case-insensitive; surrounding whitespace is ignored.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" => Some(TimeOfDay::Day),
            "night" => Some(TimeOfDay::Night),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Day => "day",
            TimeOfDay::Night => "night",
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one HF forecast slot, like `80m-40m (day)`.
///
/// The band label is case-sensitive; the time of day is always lowercased,
/// so `("80m-40m", "Day")` and `("80m-40m", "day")` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BandKey {
    pub band: String,
    pub time: String,
}

impl BandKey {
    pub fn new(band: &str, time: &str) -> Self {
        Self {
            band: band.to_string(),
            time: time.to_lowercase(),
        }
    }
}

impl fmt::Display for BandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.band, self.time)
    }
}

/// Identifies one VHF phenomenon at one location. Both parts are
/// case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhenomenonKey {
    pub phenomenon: String,
    pub location: String,
}

impl PhenomenonKey {
    pub fn new(phenomenon: &str, location: &str) -> Self {
        Self {
            phenomenon: phenomenon.to_string(),
            location: location.to_string(),
        }
    }
}

impl fmt::Display for PhenomenonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.phenomenon, self.location)
    }
}

// ---------------------------------------------------------------------------
// Condition levels
// ---------------------------------------------------------------------------

/// Coarse quality of an HF condition label.
///
/// Ordered worst to best so that `new > old` means an improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ConditionLevel {
    Unknown,
    Poor,
    Fair,
    Good,
}

impl ConditionLevel {
    pub fn parse(condition: &str) -> Self {
        match condition.trim().to_lowercase().as_str() {
            "good" => ConditionLevel::Good,
            "fair" => ConditionLevel::Fair,
            "poor" => ConditionLevel::Poor,
            _ => ConditionLevel::Unknown,
        }
    }

    /// Direction of a condition change: `Some(true)` when it got better,
    /// `Some(false)` when worse, `None` when either label is ungraded or
    /// both grade the same.
    pub fn improvement(old_condition: &str, new_condition: &str) -> Option<bool> {
        let before = ConditionLevel::parse(old_condition);
        let after = ConditionLevel::parse(new_condition);
        if before == ConditionLevel::Unknown || after == ConditionLevel::Unknown || before == after {
            return None;
        }
        Some(after > before)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by the XML snapshot parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The byte buffer had zero length.
    #[error("empty input: the feed body contained no bytes")]
    EmptyInput,
    /// The document is not well-formed XML.
    #[error("malformed XML at byte {position}: {message}")]
    MalformedXml { position: u64, message: String },
}

impl ParseError {
    pub(crate) fn malformed(position: u64, message: impl Into<String>) -> Self {
        ParseError::MalformedXml {
            position,
            message: message.into(),
        }
    }
}

/// Errors that can end a single fetch attempt. None of them are fatal to
/// the service; the next scheduled or manual attempt proceeds normally.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The configured endpoint is not a usable URL.
    #[error("invalid feed URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Network failure or timeout.
    #[error("transport error: {0}")]
    Transport(String),
    /// Non-2xx HTTP response from the feed.
    #[error("HTTP error: {0}")]
    HttpStatus(u16),
    /// The response arrived with a zero-byte body.
    #[error("no data received from feed")]
    EmptyResponse,
    /// The body could not be parsed into a snapshot.
    #[error("failed to parse XML data: {0}")]
    Parse(#[from] ParseError),
}

impl FeedError {
    /// Transport-class failures (network, timeout, HTTP status).
    pub fn is_transport(&self) -> bool {
        matches!(self, FeedError::Transport(_) | FeedError::HttpStatus(_))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
