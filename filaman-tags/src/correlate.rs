//! Tag correlation
//!
//! Matches a physical tag reading against an ordered catalog snapshot.
//! Two identifier encodings are in circulation:
//!
//! - the long form (tray UUID, 32 hex characters), compared exactly
//! - the short form (tag UID), whose first 8 characters are the physical UID
//!   and whose tail is reader-specific; compared by prefix in both directions
//!
//! Stored tags carry quoting and escaping noise from the catalog's JSON
//! extras, so both sides are normalized before any comparison.

use filaman_common::protocol::AmsTray;
use serde::{Deserialize, Serialize};

/// Length of the physical UID portion of a short-form identifier
pub const UID_PREFIX_LEN: usize = 8;

/// All-zero short-form identifier sent by readers without a tag
pub const SHORT_SENTINEL: &str = "0000000000000000";

/// All-zero long-form identifier sent by readers without a tag
pub const LONG_SENTINEL: &str = "00000000000000000000000000000000";

/// Strip everything outside `[A-Za-z0-9]` and uppercase the rest
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Normalized identifier, or `None` when it is absent, empty or a sentinel
///
/// Both sentinels are rejected regardless of which slot the identifier came
/// from.
pub fn valid_identifier(raw: Option<&str>) -> Option<String> {
    let normalized = normalize(raw?);
    if normalized.is_empty() || normalized == SHORT_SENTINEL || normalized == LONG_SENTINEL {
        None
    } else {
        Some(normalized)
    }
}

fn uid_prefix(id: &str) -> &str {
    // normalized identifiers are ASCII, so byte slicing is safe
    &id[..id.len().min(UID_PREFIX_LEN)]
}

/// A physical read event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagReading {
    /// Short-form identifier (tag UID)
    pub primary_id: Option<String>,
    /// Long-form identifier (tray UUID)
    pub secondary_id: Option<String>,
}

impl TagReading {
    pub fn new(primary_id: Option<&str>, secondary_id: Option<&str>) -> Self {
        Self {
            primary_id: primary_id.map(str::to_string),
            secondary_id: secondary_id.map(str::to_string),
        }
    }

    /// Reading carried by an AMS tray (`tag_uid`, `tray_uuid`)
    pub fn from_tray(tray: &AmsTray) -> Self {
        Self {
            primary_id: tray.tag_uid.clone(),
            secondary_id: tray.tray_uuid.clone(),
        }
    }

    /// True when neither identifier can ever match
    pub fn is_blank(&self) -> bool {
        valid_identifier(self.primary_id.as_deref()).is_none()
            && valid_identifier(self.secondary_id.as_deref()).is_none()
    }
}

/// A catalog entry that carries a stored tag
pub trait TaggedRecord {
    fn record_id(&self) -> i64;
    fn stored_tag(&self) -> Option<&str>;
}

/// Plain catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub record_id: i64,
    pub stored_tag: String,
}

impl CatalogRecord {
    pub fn new(record_id: i64, stored_tag: impl Into<String>) -> Self {
        Self {
            record_id,
            stored_tag: stored_tag.into(),
        }
    }
}

impl TaggedRecord for CatalogRecord {
    fn record_id(&self) -> i64 {
        self.record_id
    }

    fn stored_tag(&self) -> Option<&str> {
        Some(&self.stored_tag)
    }
}

/// Which rule produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchRule {
    /// Stored tag equals the long-form identifier
    LongForm,
    /// Physical UID prefixes agree
    PhysicalUid,
}

/// Best-matching record, or `None`
pub fn correlate<'a, R: TaggedRecord>(reading: &TagReading, catalog: &'a [R]) -> Option<&'a R> {
    correlate_with_rule(reading, catalog).map(|(record, _)| record)
}

/// Best-matching record together with the rule that matched
///
/// Records are scanned in snapshot order and the first one satisfying either
/// rule wins. Within one record, long-form equality is checked before the
/// physical UID prefixes.
pub fn correlate_with_rule<'a, R: TaggedRecord>(
    reading: &TagReading,
    catalog: &'a [R],
) -> Option<(&'a R, MatchRule)> {
    let primary = valid_identifier(reading.primary_id.as_deref());
    let secondary = valid_identifier(reading.secondary_id.as_deref());

    if primary.is_none() && secondary.is_none() {
        return None;
    }

    let found = catalog.iter().find_map(|record| {
        let tag = valid_identifier(record.stored_tag())?;

        if secondary.as_deref() == Some(tag.as_str()) {
            return Some((record, MatchRule::LongForm));
        }

        let primary = primary.as_deref()?;
        let incoming = uid_prefix(primary);
        let stored_prefix = uid_prefix(&tag);
        let prefix_match = stored_prefix == incoming
            || tag.starts_with(incoming)
            || primary.starts_with(stored_prefix);
        prefix_match.then_some((record, MatchRule::PhysicalUid))
    });

    if let Some((record, rule)) = &found {
        tracing::trace!(record_id = record.record_id(), ?rule, "tag match");
    }
    found
}
