//! End-to-end pipeline runs against an in-memory remote store.

use async_trait::async_trait;
use recordsync_core::WriteConfig;
use recordsync_core::error::{RemoteError, TransformError};
use recordsync_core::pipeline::{
    IdentifierMap, Pipeline, PipelineRunner, PipelineStep, RunStatus, StepKind,
};
use recordsync_core::remote::{RemoteStore, RemoteWriteClient};
use recordsync_core::transform::from_fn;
use recordsync_core::types::{
    CandidateRecord, CellValue, Dataset, Row, UpsertOutcome, WriteTarget,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct Call {
    object: String,
    size: usize,
}

/// Assigns sequential ids ("001", "002", ...) across all calls and records every
/// call. Records whose `Reject__c` field is set are rejected; objects listed
/// in `broken` fail at the call level.
#[derive(Default)]
struct MemoryStore {
    calls: Mutex<Vec<Call>>,
    committed: Mutex<Vec<(String, String)>>,
    next_id: Mutex<usize>,
    broken: HashSet<String>,
}

impl MemoryStore {
    fn with_broken(objects: &[&str]) -> Self {
        Self {
            broken: objects.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    fn call_sizes(&self, object: &str) -> Vec<usize> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.object == object)
            .map(|c| c.size)
            .collect()
    }

    fn committed_to(&self, object: &str) -> Vec<String> {
        self.committed
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, _)| o == object)
            .map(|(_, key)| key.clone())
            .collect()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn upsert(
        &self,
        object_type: &str,
        external_id_field: &str,
        records: &[CandidateRecord],
    ) -> Result<Vec<UpsertOutcome>, RemoteError> {
        self.calls.lock().unwrap().push(Call {
            object: object_type.to_string(),
            size: records.len(),
        });
        if self.broken.contains(object_type) {
            return Err(RemoteError::Connection {
                message: "connection reset by peer".into(),
            });
        }

        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            if record.get("Reject__c").is_some() {
                outcomes.push(UpsertOutcome::failed(vec![]));
                continue;
            }
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            outcomes.push(UpsertOutcome::succeeded(format!("{:03}", *next)));
            self.committed.lock().unwrap().push((
                object_type.to_string(),
                record.external_id(external_id_field).unwrap_or_default(),
            ));
        }
        Ok(outcomes)
    }
}

fn runner(store: Arc<MemoryStore>) -> PipelineRunner {
    PipelineRunner::new(RemoteWriteClient::new(store, WriteConfig::default()).unwrap())
}

fn text(s: &str) -> CellValue {
    CellValue::Text(s.to_string())
}

/// Rows of (unique key, label).
fn dataset(rows: &[(&str, &str)]) -> Dataset {
    Dataset::new(
        rows.iter()
            .map(|(key, label)| Row::new(vec![text(key), text(label)]))
            .collect(),
    )
}

/// Dedup rows by key into contacts keyed by `Key__c`.
fn contacts_step() -> PipelineStep {
    PipelineStep::new(
        "contacts",
        WriteTarget::new("Contact", "Key__c"),
        StepKind::Producing,
        from_fn("contacts", |dataset, _| {
            let mut seen = HashSet::new();
            Ok(dataset
                .rows()
                .iter()
                .filter_map(|r| r.get(0).to_key())
                .filter(|k| seen.insert(k.clone()))
                .map(|k| CandidateRecord::new().with("Key__c", k))
                .collect())
        }),
    )
}

/// One record per row whose key resolves in the identifier map.
fn enrollments_step(name: &str, object: &str) -> PipelineStep {
    let transformer = name.to_string();
    PipelineStep::new(
        name,
        WriteTarget::new(object, "Enrollment__c"),
        StepKind::Consuming,
        from_fn(name, move |dataset, ids| {
            let ids = ids.ok_or_else(|| TransformError::MissingIdentifierMap {
                transformer: transformer.clone(),
            })?;
            Ok(dataset
                .rows()
                .iter()
                .filter_map(|r| {
                    let key = r.get(0).to_key()?;
                    let contact = ids.get(&key)?;
                    Some(
                        CandidateRecord::new()
                            .with("Contact__c", contact)
                            .with("Enrollment__c", format!("{key}-{}", r.get(1))),
                    )
                })
                .collect())
        }),
    )
}

#[tokio::test]
async fn test_three_row_scenario() {
    let store = Arc::new(MemoryStore::default());
    let pipeline = Pipeline::new(
        "scenario",
        vec![contacts_step(), enrollments_step("enrollments", "Enrollment")],
    )
    .unwrap();
    let data = dataset(&[("A", "shelter"), ("B", "shelter"), ("A", "navigation")]);

    let report = runner(store.clone()).run(&pipeline, data).await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.steps[0].submitted, 2);
    assert_eq!(report.steps[0].identifier_map_entries, Some(2));
    assert_eq!(report.steps[1].submitted, 3);
    assert_eq!(
        store.committed_to("Enrollment"),
        vec!["A-shelter", "B-shelter", "A-navigation"]
    );
}

#[tokio::test]
async fn test_unmatched_rows_are_dropped_from_consumer_output() {
    let store = Arc::new(MemoryStore::default());
    let rejecting_contacts = PipelineStep::new(
        "contacts",
        WriteTarget::new("Contact", "Key__c"),
        StepKind::Producing,
        from_fn("contacts", |_, _| {
            Ok(vec![
                CandidateRecord::new().with("Key__c", "A"),
                CandidateRecord::new().with("Key__c", "B").with("Reject__c", true),
            ])
        }),
    );
    let pipeline = Pipeline::new(
        "partial",
        vec![rejecting_contacts, enrollments_step("enrollments", "Enrollment")],
    )
    .unwrap();

    let report = runner(store.clone())
        .run(&pipeline, dataset(&[("A", "x"), ("B", "y"), ("C", "z")]))
        .await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.steps[0].failed, 1);
    assert_eq!(report.steps[0].identifier_map_entries, Some(1));
    assert_eq!(store.committed_to("Enrollment"), vec!["A-x"]);
}

#[tokio::test]
async fn test_consumer_receives_exactly_the_producer_map() {
    let store = Arc::new(MemoryStore::default());
    let seen: Arc<Mutex<Option<IdentifierMap>>> = Arc::new(Mutex::new(None));
    let capture = seen.clone();
    let producer = PipelineStep::new(
        "contacts",
        WriteTarget::new("Contact", "Key__c"),
        StepKind::Producing,
        from_fn("contacts", |_, _| {
            Ok(vec![
                CandidateRecord::new().with("Key__c", "A"),
                CandidateRecord::new().with("Key__c", "B").with("Reject__c", true),
                CandidateRecord::new().with("Key__c", "C"),
            ])
        }),
    );
    let consumer = PipelineStep::new(
        "capture",
        WriteTarget::new("Enrollment", "Enrollment__c"),
        StepKind::Consuming,
        from_fn("capture", move |_, ids| {
            *capture.lock().unwrap() = ids.cloned();
            Ok(Vec::new())
        }),
    );
    let pipeline = Pipeline::new("p", vec![producer, consumer]).unwrap();

    let report = runner(store.clone()).run(&pipeline, Dataset::default()).await;
    assert!(report.is_success());

    let expected: IdentifierMap = [("A", "001"), ("C", "002")].into_iter().collect();
    assert_eq!(seen.lock().unwrap().as_ref(), Some(&expected));
    // The consumer emitted nothing, so its write made no remote call.
    assert!(store.call_sizes("Enrollment").is_empty());
}

#[tokio::test]
async fn test_call_failure_in_step_two_of_three() {
    let store = Arc::new(MemoryStore::with_broken(&["Enrollment"]));
    let third_ran = Arc::new(Mutex::new(false));
    let flag = third_ran.clone();
    let third = PipelineStep::new(
        "followups",
        WriteTarget::new("Followup", "Key__c"),
        StepKind::Consuming,
        from_fn("followups", move |_, _| {
            *flag.lock().unwrap() = true;
            Ok(Vec::new())
        }),
    );
    let pipeline = Pipeline::new(
        "three",
        vec![
            contacts_step(),
            enrollments_step("enrollments", "Enrollment"),
            third,
        ],
    )
    .unwrap();

    let report = runner(store.clone())
        .run(&pipeline, dataset(&[("A", "x"), ("B", "y")]))
        .await;

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.failed_step.as_deref(), Some("enrollments"));
    assert!(report.error.as_deref().unwrap().contains("connection reset"));
    assert_eq!(report.steps.len(), 1);
    // Step one stays committed.
    assert_eq!(store.committed_to("Contact"), vec!["A", "B"]);
    assert!(!*third_ran.lock().unwrap());
}

#[tokio::test]
async fn test_large_step_is_chunked_in_order() {
    let store = Arc::new(MemoryStore::default());
    let rows: Vec<(String, String)> = (0..450)
        .map(|i| (format!("K{i:03}"), "row".to_string()))
        .collect();
    let borrowed: Vec<(&str, &str)> = rows
        .iter()
        .map(|(a, b)| (a.as_str(), b.as_str()))
        .collect();
    let pipeline = Pipeline::new("big", vec![contacts_step()]).unwrap();

    let report = runner(store.clone()).run(&pipeline, dataset(&borrowed)).await;

    assert!(report.is_success());
    assert_eq!(store.call_sizes("Contact"), vec![200, 200, 50]);
    let committed = store.committed_to("Contact");
    let expected: Vec<String> = (0..450).map(|i| format!("K{i:03}")).collect();
    assert_eq!(committed, expected);
    assert_eq!(report.steps[0].identifier_map_entries, Some(450));
}

#[tokio::test]
async fn test_relay_step_replaces_map() {
    let store = Arc::new(MemoryStore::default());
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let capture = seen.clone();

    // Relay: reads contact ids, publishes its own map keyed by household.
    let households = PipelineStep::new(
        "households",
        WriteTarget::new("Household", "Household__c"),
        StepKind::Relay,
        from_fn("households", |_, ids| {
            let ids = ids.expect("relay receives a map");
            Ok(ids
                .iter()
                .map(|(key, _)| CandidateRecord::new().with("Household__c", format!("H-{key}")))
                .collect())
        }),
    );
    let members = PipelineStep::new(
        "members",
        WriteTarget::new("Member", "Member__c"),
        StepKind::Consuming,
        from_fn("members", move |_, ids| {
            let mut keys: Vec<String> = ids
                .map(|m| m.iter().map(|(k, _)| k.to_string()).collect())
                .unwrap_or_default();
            keys.sort();
            *capture.lock().unwrap() = keys;
            Ok(Vec::new())
        }),
    );
    let pipeline = Pipeline::new("relay", vec![contacts_step(), households, members]).unwrap();

    let report = runner(store)
        .run(&pipeline, dataset(&[("A", "x"), ("B", "y")]))
        .await;

    assert!(report.is_success());
    assert_eq!(*seen.lock().unwrap(), vec!["H-A", "H-B"]);
}

#[test]
fn test_consumer_before_producer_is_rejected_up_front() {
    let err = Pipeline::new(
        "bad",
        vec![enrollments_step("enrollments", "Enrollment"), contacts_step()],
    )
    .unwrap_err();
    assert!(err.to_string().contains("enrollments"));
}
