use provisio::config::{CustomerSettings, QueueSettings, TemplateSettings};
use provisio::provisioning::{CustomerRequest, CustomerType, OrderRequest, OrderType, Provisioner};
use provisio::queue::{enqueue, Disposition, ProvisioningMessage, QueuePaths, QueueWorker};
use provisio::remote::{InMemoryGraph, ResourceClient, RetryPolicy};
use provisio::shared::pause::RecordingPause;
use provisio::store::RecordStore;
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

fn worker(max_deliveries: u32) -> (TempDir, QueueWorker) {
    let dir = tempdir().expect("tempdir");
    let store = RecordStore::open(&dir.path().join("provisio.db")).expect("open store");
    store.ensure_schema().expect("schema");
    let client = ResourceClient::new(
        Arc::new(InMemoryGraph::new()),
        RetryPolicy::default(),
        Arc::new(RecordingPause::new()),
    );
    let provisioner = Provisioner::with_sections(
        store,
        client,
        TemplateSettings::default(),
        CustomerSettings::default(),
    );
    let paths = QueuePaths::from_state_root(dir.path());
    paths.ensure_dirs().expect("queue dirs");
    let settings = QueueSettings {
        max_deliveries,
        ..QueueSettings::default()
    };
    (dir, QueueWorker::new(paths, provisioner, settings))
}

fn customer_message() -> ProvisioningMessage {
    let request = CustomerRequest::new("4711", CustomerType::Customer, "Acme");
    ProvisioningMessage::Customer(request)
}

fn orphan_order_message() -> ProvisioningMessage {
    ProvisioningMessage::Order(OrderRequest::new("O-1", OrderType::Order, "9999"))
}

fn file_count(dir: &std::path::Path) -> usize {
    fs::read_dir(dir).expect("read dir").count()
}

#[test]
fn empty_queue_yields_nothing() {
    let (_dir, worker) = worker(3);
    assert!(worker.process_once_at(1000).expect("poll").is_none());
}

#[test]
fn successful_workflow_completes_message() {
    let (_dir, worker) = worker(3);
    enqueue(worker.paths(), &customer_message(), 1000).expect("enqueue");

    let delivery = worker
        .process_once_at(1000)
        .expect("poll")
        .expect("delivery");
    assert_eq!(delivery.attempt, 1);
    let Disposition::Completed { path } = &delivery.disposition else {
        panic!("expected completion, got {:?}", delivery.disposition);
    };

    let record: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(path).expect("read completion"))
            .expect("completion json");
    assert_eq!(record["messageId"], delivery.message_id.as_str());
    assert_eq!(record["completedAtUtc"], "1970-01-01T00:16:40+00:00");
    assert_eq!(record["report"]["workflow"], "customer");
    assert_eq!(record["report"]["outcome"]["result"], "completed");
    assert_eq!(file_count(&worker.paths().incoming), 0);
    assert_eq!(file_count(&worker.paths().processing), 0);
}

#[test]
fn unprocessable_message_is_requeued_until_due() {
    let (_dir, worker) = worker(3);
    enqueue(worker.paths(), &orphan_order_message(), 1000).expect("enqueue");

    let first = worker
        .process_once_at(1000)
        .expect("poll")
        .expect("delivery");
    assert!(matches!(
        first.disposition,
        Disposition::Requeued {
            not_before: 1300,
            ..
        }
    ));
    assert!(worker.process_once_at(1299).expect("poll").is_none());

    let second = worker
        .process_once_at(1300)
        .expect("poll")
        .expect("redelivery");
    assert_eq!(second.message_id, first.message_id);
    assert_eq!(second.attempt, 2);
}

#[test]
fn message_is_dead_lettered_after_max_deliveries() {
    let (_dir, worker) = worker(2);
    enqueue(worker.paths(), &orphan_order_message(), 1000).expect("enqueue");

    worker.process_once_at(1000).expect("poll").expect("first");
    let last = worker.process_once_at(2000).expect("poll").expect("second");
    let Disposition::DeadLettered { path, reason } = &last.disposition else {
        panic!("expected dead letter, got {:?}", last.disposition);
    };
    assert_eq!(reason, "gave up after 2 deliveries: Customer not found");
    assert!(path.starts_with(&worker.paths().deadletter));

    let reason_file = path.with_file_name(format!(
        "{}.reason.txt",
        path.file_stem().and_then(|s| s.to_str()).expect("stem")
    ));
    assert!(fs::read_to_string(reason_file)
        .expect("reason file")
        .contains("Customer not found"));
    assert_eq!(file_count(&worker.paths().incoming), 0);
}

#[test]
fn invalid_payload_is_dead_lettered_immediately() {
    let (_dir, worker) = worker(5);
    fs::write(
        worker.paths().incoming.join("000000000001_broken_1.json"),
        "{\"messageId\": \"broken\"",
    )
    .expect("write broken message");

    let delivery = worker
        .process_once_at(1000)
        .expect("poll")
        .expect("delivery");
    match delivery.disposition {
        Disposition::DeadLettered { reason, .. } => {
            assert!(reason.starts_with("invalid payload"), "reason: {reason}")
        }
        other => panic!("expected dead letter, got {other:?}"),
    }
}

#[test]
fn run_returns_immediately_when_stop_is_set() {
    let (_dir, worker) = worker(3);
    enqueue(worker.paths(), &customer_message(), 0).expect("enqueue");
    let stop = AtomicBool::new(true);
    assert_eq!(worker.run(&stop), 0);
    assert_eq!(file_count(&worker.paths().incoming), 1);
}
