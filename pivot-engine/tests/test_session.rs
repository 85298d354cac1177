//! FILENAME: tests/test_session.rs
//! Integration tests for JSON requests, sessions and segment comparison.

mod common;

use common::{assert_close, UsersFixture};
use pivot_engine::{
    compare, MetricRegistry, PivotRequestDefinition, PivotSpec, Session, Submission, ALL_LABEL,
};
use segment_engine::SegmentError;
use std::thread;

fn session() -> Session {
    Session::with_metrics(UsersFixture::dataset(), MetricRegistry::standard())
}

fn audience_request(audience: &str) -> PivotRequestDefinition {
    PivotRequestDefinition {
        audience: Some(audience.to_string()),
        spec: PivotSpec::new(["device_type"], Vec::<String>::new()).metric("Count"),
        ..Default::default()
    }
}

// ============================================================================
// JSON REQUESTS
// ============================================================================

#[test]
fn test_json_request_with_audience_and_rule() {
    let json = r#"{
        "bucketRules": [
            {"dimension": "loyalty_tier", "kind": "categoricalGroup",
             "groups": [{"label": "Premium", "members": ["Gold", "Platinum"]}]}
        ],
        "audience": "Gold+ Members",
        "filter": "total_revenue > 1000",
        "spec": {
            "rowDimensions": ["loyalty_tier"],
            "columnDimensions": ["device_type"],
            "metrics": ["Total Revenue", "Count"]
        }
    }"#;
    let mut session = session();
    let result = session
        .compute(PivotRequestDefinition::from_json(json).unwrap())
        .unwrap();

    assert_eq!(result.row_labels(), ["Premium"]);
    assert_eq!(result.column_labels(), ["Desktop", "Mobile"]);
    assert_eq!(result.value("Premium", "Desktop", "Total Revenue"), Some(4300.0));
    assert_eq!(result.value("Premium", "Mobile", "Count"), Some(1.0));
    assert_eq!(session.definition().unwrap().audience.as_deref(), Some("Gold+ Members"));
}

#[test]
fn test_request_errors_carry_position() {
    let mut session = session();
    let request = PivotRequestDefinition {
        filter: "age > 'old'".to_string(),
        spec: PivotSpec::new(["country"], Vec::<String>::new()).metric("Count"),
        ..Default::default()
    };
    match session.submit(request) {
        Err(SegmentError::TypeMismatch { dimension, position, .. }) => {
            assert_eq!(dimension, "age");
            assert_eq!(position, Some(6));
        }
        other => panic!("expected type mismatch, got {:?}", other),
    }

    let request = PivotRequestDefinition {
        filter: "age >".to_string(),
        spec: PivotSpec::new(["country"], Vec::<String>::new()).metric("Count"),
        ..Default::default()
    };
    assert!(matches!(session.submit(request), Err(SegmentError::Parse { .. })));
    assert!(session.result().is_none());
}

// ============================================================================
// SESSION
// ============================================================================

#[test]
fn test_pending_request_computes_on_another_thread() {
    let mut session = session();
    let request = match session.submit(audience_request("Mobile Users")).unwrap() {
        Submission::Pending(request) => request,
        Submission::Ready(_) => panic!("nothing memoized yet"),
    };
    let outcome = thread::spawn(move || request.compute())
        .join()
        .unwrap()
        .unwrap();

    assert!(session.accept(outcome));
    let result = session.result().unwrap();
    assert_eq!(result.row_labels(), ["Mobile"]);
    assert_eq!(result.value("Mobile", ALL_LABEL, "Count"), Some(4.0));
}

#[test]
fn test_stale_outcome_is_discarded_but_memoized() {
    let mut session = session();
    let Submission::Pending(old) = session.submit(audience_request("US Customers")).unwrap() else {
        panic!("nothing memoized yet");
    };
    let latest = session.compute(audience_request("Mobile Users")).unwrap();

    assert!(!session.accept(old.compute().unwrap()));
    assert_eq!(session.result().unwrap(), latest);

    // The stale computation still serves an identical later submission.
    assert!(matches!(
        session.submit(audience_request("US Customers")).unwrap(),
        Submission::Ready(_)
    ));
}

// ============================================================================
// COMPARISON
// ============================================================================

#[test]
fn test_compare_audiences() {
    let mut session = session();
    let us = session.compute(audience_request("US Customers")).unwrap();
    let mobile = session.compute(audience_request("Mobile Users")).unwrap();
    let cmp = compare(&us, &mobile, "Count").unwrap();

    assert_eq!(cmp.rows, vec!["Desktop", "Mobile"]);
    let desktop = cmp.cell("Desktop", ALL_LABEL).unwrap();
    assert_eq!(desktop.second, Some(0.0));
    assert_eq!(desktop.difference, Some(2.0));
    assert_eq!(desktop.percent_difference, None);

    let mobile_cell = cmp.cell("Mobile", ALL_LABEL).unwrap();
    assert_eq!(mobile_cell.difference, Some(-2.0));
    assert_close(mobile_cell.percent_difference, -50.0);
}
