//! Property tests for identifier normalization and tag correlation
//!
//! - normalization is idempotent
//! - matching does not depend on letter case on either side
//! - all-zero sentinels never match anything, including all-zero stored tags
//! - the result is the first record that would match on its own

use filaman_tags::correlate::{LONG_SENTINEL, SHORT_SENTINEL};
use filaman_tags::{correlate, normalize, CatalogRecord, TagReading};
use proptest::prelude::*;

fn arb_identifier() -> impl Strategy<Value = String> {
    "[\"\\\\:\\- a-fA-F0-9]{0,36}"
}

fn arb_catalog() -> impl Strategy<Value = Vec<CatalogRecord>> {
    prop::collection::vec(arb_identifier(), 0..8).prop_map(|tags| {
        tags.into_iter()
            .enumerate()
            .map(|(i, tag)| CatalogRecord::new(i as i64, tag))
            .collect()
    })
}

/// Re-case each character according to the mask (cycled)
fn recase(s: &str, mask: &[bool]) -> String {
    s.chars()
        .enumerate()
        .map(|(i, c)| {
            if mask.is_empty() || mask[i % mask.len()] {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}

fn arb_sentinel(base: &'static str) -> impl Strategy<Value = String> {
    // sentinels with quoting or separator noise are still sentinels
    prop_oneof![
        Just(base.to_string()),
        Just(format!("\"{}\"", base)),
        Just(
            base.as_bytes()
                .chunks(4)
                .map(|c| String::from_utf8_lossy(c).into_owned())
                .collect::<Vec<_>>()
                .join("-")
        ),
    ]
}

proptest! {
    /// normalize(normalize(x)) == normalize(x)
    #[test]
    fn normalize_is_idempotent(x in ".{0,64}") {
        let once = normalize(&x);
        prop_assert_eq!(normalize(&once), once);
    }

    /// Normalized output only holds uppercase ASCII alphanumerics
    #[test]
    fn normalize_output_alphabet(x in ".{0,64}") {
        prop_assert!(normalize(&x)
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    /// Arbitrary re-casing of reading and catalog leaves the result unchanged
    #[test]
    fn matching_is_case_symmetric(
        primary in prop::option::of(arb_identifier()),
        secondary in prop::option::of(arb_identifier()),
        catalog in arb_catalog(),
        mask in prop::collection::vec(any::<bool>(), 0..16),
    ) {
        let reading = TagReading::new(primary.as_deref(), secondary.as_deref());
        let expected = correlate(&reading, &catalog).map(|r| r.record_id);

        let recased_reading = TagReading::new(
            primary.as_deref().map(|p| recase(p, &mask)).as_deref(),
            secondary.as_deref().map(|s| recase(s, &mask)).as_deref(),
        );
        let recased_catalog: Vec<CatalogRecord> = catalog
            .iter()
            .map(|r| CatalogRecord::new(r.record_id, recase(&r.stored_tag, &mask)))
            .collect();

        prop_assert_eq!(
            correlate(&recased_reading, &recased_catalog).map(|r| r.record_id),
            expected
        );
    }

    /// Sentinel readings never match, even against all-zero stored tags
    #[test]
    fn sentinels_never_match(
        primary in arb_sentinel(SHORT_SENTINEL),
        secondary in arb_sentinel(LONG_SENTINEL),
        mut catalog in arb_catalog(),
    ) {
        catalog.push(CatalogRecord::new(100, SHORT_SENTINEL));
        catalog.push(CatalogRecord::new(101, LONG_SENTINEL));

        let both = TagReading::new(Some(primary.as_str()), Some(secondary.as_str()));
        prop_assert!(correlate(&both, &catalog).is_none());

        let primary_only = TagReading::new(Some(primary.as_str()), None);
        prop_assert!(correlate(&primary_only, &catalog).is_none());

        let secondary_only = TagReading::new(None, Some(secondary.as_str()));
        prop_assert!(correlate(&secondary_only, &catalog).is_none());
    }

    /// A stored tag equal to the normalized long form always matches
    #[test]
    fn exact_long_form_always_matches(
        long in "[0-9A-F]{32}",
        catalog in arb_catalog(),
    ) {
        prop_assume!(long != LONG_SENTINEL);
        let mut catalog = catalog;
        catalog.push(CatalogRecord::new(200, format!("\"{}\"", long.to_lowercase())));

        let reading = TagReading::new(None, Some(long.as_str()));
        prop_assert!(correlate(&reading, &catalog).is_some());
    }

    /// Snapshot order decides: the winner is the first record that matches alone
    #[test]
    fn first_matching_record_wins(
        primary in prop::option::of(arb_identifier()),
        secondary in prop::option::of(arb_identifier()),
        catalog in arb_catalog(),
    ) {
        let reading = TagReading::new(primary.as_deref(), secondary.as_deref());
        let expected = catalog
            .iter()
            .find(|record| correlate(&reading, std::slice::from_ref(*record)).is_some())
            .map(|record| record.record_id);

        prop_assert_eq!(correlate(&reading, &catalog).map(|r| r.record_id), expected);
    }
}
