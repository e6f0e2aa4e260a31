//! Property tests for the filter pipeline and anomaly flags over generated
//! usage records.

use gauge_core::{
    by_category, by_date_range, by_status, combine, mark_anomalies, CategoryFilter, Outcome,
    StatusFilter,
};
use gauge_test_utils::assertions::assert_all;
use gauge_test_utils::fixtures::sample_records;
use gauge_test_utils::generators::{
    arb_filter_state, arb_peer_usage, arb_usage_records,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_combine_is_subset_satisfying_every_filter(
        records in arb_usage_records(40),
        filters in arb_filter_state(),
    ) {
        let kept = combine(&records, &filters);
        prop_assert!(kept.len() <= records.len());

        assert_all(&kept, |r| r.timestamp.is_some_and(|ts| filters.date_range.contains(ts)), "date range");
        if let CategoryFilter::Only(wanted) = &filters.category {
            assert_all(&kept, |r| r.category.as_deref() == Some(wanted.as_str()), "category");
        }
        match filters.status {
            StatusFilter::Success => assert_all(&kept, |r| r.status == Some(Outcome::Success), "status"),
            StatusFilter::Failure => assert_all(&kept, |r| r.status == Some(Outcome::Failure), "status"),
            StatusFilter::All => {}
        }
        if let Some(entity) = &filters.entity_id {
            assert_all(&kept, |r| r.matches_entity(entity), "entity");
        }
    }

    #[test]
    fn prop_combine_is_idempotent(
        records in arb_usage_records(40),
        filters in arb_filter_state(),
    ) {
        let once = combine(&records, &filters);
        let twice = combine(&once, &filters);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_filter_order_does_not_matter(
        records in arb_usage_records(40),
        filters in arb_filter_state(),
    ) {
        let range = filters.date_range;
        let a = by_status(
            &by_category(&by_date_range(&records, range.start, range.end), &filters.category),
            filters.status,
        );
        let b = by_date_range(
            &by_category(&by_status(&records, filters.status), &filters.category),
            range.start,
            range.end,
        );
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_anomalies_exceed_twice_the_mean(
        peers in prop::collection::vec(arb_peer_usage(), 1..30),
    ) {
        let mean = peers.iter().map(|p| p.metric_value).sum::<f64>() / peers.len() as f64;
        let flagged = mark_anomalies(&peers);
        prop_assert_eq!(flagged.len(), peers.len());
        for f in &flagged {
            prop_assert_eq!(f.anomalous, f.usage.metric_value > 2.0 * mean);
        }
    }
}

#[test]
fn test_sample_records_filter_scenario() {
    let records = sample_records();
    let alpaca_failures = by_status(
        &by_category(&records, &CategoryFilter::from("alpaca")),
        StatusFilter::Failure,
    );
    assert_eq!(alpaca_failures.len(), 1);
    assert_eq!(alpaca_failures[0].id.as_deref(), Some("r3"));
}
