//! Date, timestamp and decimal bounds

use chrono::{NaiveDate, TimeDelta, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::common::*;
use spanline::{BoundValue, DeltaValue, Error, PolicyOverrides, RangeValue, SpanKind};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

fn days(from: u32, to: u32) -> RangeValue {
    RangeValue::new(day(from), day(to)).unwrap()
}

#[test]
fn test_date_chain_with_sticky_shift() {
    let store = store();
    let span = store
        .create_span(SpanKind::new("stay"), days(1, 15), strict())
        .unwrap();
    let whole = store.segments(span.id).unwrap()[0].id;
    let (_, checkout) = store.split_segment(whole, day(8)).unwrap();

    store
        .shift_segment_upper_by(whole, &DeltaValue::from(TimeDelta::days(2)))
        .unwrap();
    let moved = store.segment(checkout.id).unwrap();
    assert_eq!(moved.range, days(10, 15));

    let at = store.segment_at(span.id, day(9)).unwrap().unwrap();
    assert_eq!(at.id, whole);
    assert!(store.segment_at(span.id, day(15)).unwrap().is_none());
}

#[test]
fn test_inclusive_dates_become_half_open() {
    let inclusive = RangeValue::from_inclusive(day(1), day(7)).unwrap();
    assert_eq!(inclusive, days(1, 8));
}

#[test]
fn test_decimal_split() {
    let store = store();
    let span = store
        .create_span(
            SpanKind::new("meter"),
            RangeValue::new(Decimal::new(0, 0), Decimal::new(100, 1)).unwrap(),
            strict(),
        )
        .unwrap();
    let whole = store.segments(span.id).unwrap()[0].id;
    let (lower, upper) = store.split_segment(whole, Decimal::new(25, 1)).unwrap();
    assert_eq!(*lower.range.upper(), BoundValue::from(Decimal::new(25, 1)));
    assert_eq!(*upper.range.lower(), BoundValue::from(Decimal::new(25, 1)));
}

#[test]
fn test_timestamp_span_extends_to_value() {
    let store = store();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 1, 1, 17, 0, 0).unwrap();
    let span = store
        .create_span(
            SpanKind::new("shift"),
            RangeValue::new(start, end).unwrap(),
            PolicyOverrides::none(),
        )
        .unwrap();

    let late = Utc.with_ymd_and_hms(2024, 1, 1, 19, 30, 0).unwrap();
    let extended = store.extend_span(span.id, BoundValue::from(late)).unwrap();
    assert_eq!(*extended.range.upper(), BoundValue::from(late));
}

#[test]
fn test_mixed_domains_are_rejected() {
    let store = store();
    let (span, _) = span_with(&store, (0, 100), PolicyOverrides::none(), &[]);

    let err = store.create_segment(span, days(1, 2)).unwrap_err();
    assert!(matches!(err, Error::DomainMismatch { .. }), "got {:?}", err);
    assert!(RangeValue::new(1, day(2)).is_err());
}
