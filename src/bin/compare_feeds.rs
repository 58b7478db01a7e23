//! Feed Comparison
//!
//! Parses two saved copies of the solar XML feed and reports what changed
//! between them, the same way the refresh loop sees it:
//! 1. Scalar readings whose text differs
//! 2. Band and phenomenon slots that changed or disappeared
//! 3. Changes in any slots passed with --track
//!
//! Usage:
//!   cargo run --bin compare_feeds -- OLD.xml NEW.xml
//!
//! Options:
//!   --track band:LABEL:TIME       Track an HF slot, e.g. band:80m-40m:day
//!   --track vhf:NAME:LOCATION     Track a VHF slot, e.g. vhf:E-Skip:europe

use clap::Parser;
use propmon_service::analysis::diff::{band_lookup, diff, vhf_lookup};
use propmon_service::analysis::tracked::{TrackedSelection, tracked_changes};
use propmon_service::ingest::solar_xml::parse_solar_xml;
use propmon_service::model::{BandKey, ConditionLevel, PhenomenonKey, Snapshot};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "compare_feeds", about = "Diff two saved propagation feeds")]
struct Cli {
    /// Older feed document
    old: PathBuf,

    /// Newer feed document
    new: PathBuf,

    /// Slot to track: band:LABEL:TIME or vhf:NAME:LOCATION
    #[arg(long = "track", value_parser = parse_track)]
    track: Vec<TrackArg>,
}

#[derive(Debug, Clone)]
enum TrackArg {
    Band(BandKey),
    Vhf(PhenomenonKey),
}

fn parse_track(raw: &str) -> Result<TrackArg, String> {
    let mut parts = raw.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("band"), Some(label), Some(time)) if !label.is_empty() && !time.is_empty() => {
            Ok(TrackArg::Band(BandKey::new(label, time)))
        }
        (Some("vhf"), Some(name), Some(location)) if !name.is_empty() && !location.is_empty() => {
            Ok(TrackArg::Vhf(PhenomenonKey::new(name, location)))
        }
        _ => Err(format!(
            "expected band:LABEL:TIME or vhf:NAME:LOCATION, got '{}'",
            raw
        )),
    }
}

fn load(path: &Path) -> Result<Snapshot, String> {
    let raw = fs::read(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_solar_xml(&raw).map_err(|e| format!("failed to parse {}: {}", path.display(), e))
}

/// `▲` better, `▼` worse, blank when the labels are not graded.
fn trend(improvement: Option<bool>) -> &'static str {
    match improvement {
        Some(true) => "▲",
        Some(false) => "▼",
        None => " ",
    }
}

/// Builds the tracked selection from `--track` arguments. A slot named
/// twice is tracked once.
fn selection_from(args: &[TrackArg]) -> TrackedSelection {
    let mut tracked = TrackedSelection::new();
    for arg in args {
        match arg {
            TrackArg::Band(key) if !tracked.is_band_tracked(key) => {
                tracked.toggle_band(key.clone());
            }
            TrackArg::Vhf(key) if !tracked.is_phenomenon_tracked(key) => {
                tracked.toggle_phenomenon(key.clone());
            }
            _ => {}
        }
    }
    tracked
}

fn main() {
    let cli = Cli::parse();

    println!("📡 Feed Comparison");
    println!("==================\n");

    let (old, new) = match (load(&cli.old), load(&cli.new)) {
        (Ok(old), Ok(new)) => (old, new),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    println!("   Old: {} (updated {})", cli.old.display(), old.updated);
    println!("   New: {} (updated {})\n", cli.new.display(), new.updated);

    let result = diff(&old, &new);
    if !result.overall_changed {
        println!("✓ Feeds are identical");
        return;
    }

    if !result.changed_fields.is_empty() {
        println!("📋 Readings changed:");
        for tag in &result.changed_fields {
            println!(
                "   {:<14} {} → {}",
                tag,
                old.scalar(tag).unwrap_or_default(),
                new.scalar(tag).unwrap_or_default()
            );
        }
        println!();
    }

    if !result.has_keyed_changes() {
        println!("✓ Band and VHF slots unchanged");
    }

    let old_bands = band_lookup(&old.band_conditions);
    let new_bands = band_lookup(&new.band_conditions);
    let mut changed_bands: Vec<&BandKey> = result.changed_band_keys.iter().collect();
    changed_bands.sort();
    if !changed_bands.is_empty() {
        println!("📻 HF bands changed:");
        for key in changed_bands {
            let before = old_bands.get(key).copied().unwrap_or_default();
            let after = new_bands.get(key).copied().unwrap_or_default();
            println!(
                "   {} {:<18} {} → {}",
                trend(ConditionLevel::improvement(before, after)),
                key.to_string(),
                before,
                after
            );
        }
        println!();
    }

    let old_vhf = vhf_lookup(&old.vhf_conditions);
    let new_vhf = vhf_lookup(&new.vhf_conditions);
    let mut changed_vhf: Vec<&PhenomenonKey> = result.changed_phenomenon_keys.iter().collect();
    changed_vhf.sort();
    if !changed_vhf.is_empty() {
        println!("🌌 VHF phenomena changed:");
        for key in changed_vhf {
            let before = old_vhf.get(key).copied().unwrap_or_default();
            let after = new_vhf.get(key).copied().unwrap_or_default();
            println!("   {:<36} {} → {}", key.to_string(), before, after);
        }
        println!();
    }

    let mut removed: Vec<String> = result
        .removed_band_keys
        .iter()
        .map(|k| k.to_string())
        .chain(result.removed_phenomenon_keys.iter().map(|k| k.to_string()))
        .collect();
    removed.sort();
    if !removed.is_empty() {
        println!("⚠️  No longer reported:");
        for key in removed {
            println!("   {}", key);
        }
        println!();
    }

    if cli.track.is_empty() {
        return;
    }

    let tracked = selection_from(&cli.track);

    let mut changes = tracked_changes(&old, &new, &tracked);
    changes.sort_by(|a, b| a.key.cmp(&b.key));

    println!("🎯 Tracked changes ({} tracked):", tracked.len());
    if changes.is_empty() {
        println!("   none");
    }
    for change in changes {
        println!("   {} {}", trend(change.is_improvement()), change);
    }
}
