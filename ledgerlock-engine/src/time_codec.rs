//! Ledger time parsing and epoch conversion
//!
//! The ledger reports its clock as text in a handful of shapes and counts
//! time in its own epoch (seconds since 2000-01-01T00:00:00Z rather than
//! the Unix zero). This module owns both conversions: raw text to a UTC
//! instant, and instant to/from the ledger's integer epoch.

use std::fmt;
use std::ops::{Add, Sub};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EscrowError;
use crate::EscrowResult;

/// Seconds between the Unix epoch and the ledger's zero time
/// (2000-01-01T00:00:00Z).
pub const LEDGER_EPOCH_OFFSET_SECS: i64 = 946_684_800;

/// Zone marker some server time strings carry as a trailing literal
const UTC_SUFFIX: &str = " UTC";

/// A point in time counted in the ledger's native epoch, in whole seconds.
///
/// Produced only by the conversions in this module; ordering matches the
/// ordering of the instants the values were converted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LedgerEpoch(i64);

impl LedgerEpoch {
    pub fn new(secs: i64) -> Self {
        Self(secs)
    }

    pub fn as_secs(self) -> i64 {
        self.0
    }
}

impl Add<i64> for LedgerEpoch {
    type Output = LedgerEpoch;

    fn add(self, secs: i64) -> LedgerEpoch {
        LedgerEpoch(self.0 + secs)
    }
}

impl Sub for LedgerEpoch {
    type Output = i64;

    /// Signed distance in seconds from `rhs` to `self`
    fn sub(self, rhs: LedgerEpoch) -> i64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for LedgerEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Parse a server-reported time string into a UTC instant.
///
/// Formats are tried in order until one succeeds:
/// 1. `2026-Jan-08 14:48:23.601094` (trailing ` UTC` marker stripped first)
/// 2. `2026-Jan-08 14:48:23` (no fractional seconds)
/// 3. RFC 3339 fallback, a trailing literal `Z` normalized to `+00:00`
///
/// If all three fail the error carries the original raw text. There is no
/// fallback to "now" or zero.
pub fn parse_server_time(raw: &str) -> EscrowResult<DateTime<Utc>> {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_suffix(UTC_SUFFIX).unwrap_or(trimmed);

    if let Ok(dt) = NaiveDateTime::parse_from_str(stripped, "%Y-%b-%d %H:%M:%S%.f") {
        return Ok(dt.and_utc());
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(stripped, "%Y-%b-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }

    let normalized = match stripped.strip_suffix('Z') {
        Some(prefix) => format!("{prefix}+00:00"),
        None => stripped.to_string(),
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(dt.with_timezone(&Utc));
    }

    Err(EscrowError::malformed_time(
        raw,
        "no known server time format matched",
    ))
}

/// Convert a UTC instant to the ledger's native epoch.
///
/// Sub-second precision is truncated; the ledger counts whole seconds.
pub fn to_ledger_epoch(instant: DateTime<Utc>) -> LedgerEpoch {
    LedgerEpoch(instant.timestamp() - LEDGER_EPOCH_OFFSET_SECS)
}

/// Convert a ledger epoch back to a UTC instant.
///
/// Exact inverse of [`to_ledger_epoch`] for any value it produces.
/// Epochs beyond chrono's representable range (far outside anything a
/// ledger can report) saturate at the representable boundary.
pub fn to_instant(epoch: LedgerEpoch) -> DateTime<Utc> {
    match DateTime::from_timestamp(epoch.0 + LEDGER_EPOCH_OFFSET_SECS, 0) {
        Some(dt) => dt,
        None if epoch.0 < 0 => DateTime::<Utc>::MIN_UTC,
        None => DateTime::<Utc>::MAX_UTC,
    }
}
