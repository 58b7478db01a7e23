//! Change analysis for the propagation monitoring service.
//!
//! Submodules:
//! - `diff`    - whole-snapshot comparison (overall change, changed/removed slots).
//! - `tracked` - user-selected slots and the detector that reports their changes.

pub mod diff;
pub mod tracked;
