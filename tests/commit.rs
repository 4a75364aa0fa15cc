mod common;

use std::num::NonZeroUsize;

use common::{ScriptedStore, TestWorkspace};
use email_normalize::{
    commit::commit,
    csv_store::{CsvStore, CsvStoreOptions},
    diff::compute_changeset,
    field::FieldKind,
    schema::TableSchema,
    store::{Record, Store},
};

fn batch(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).expect("non-zero batch size")
}

fn mixed_case_records(n: usize) -> Vec<Record> {
    (1..=n)
        .map(|i| Record::new(format!("rec{i}"), format!(" Person{i}@Example.COM")))
        .collect()
}

#[test]
fn rejected_batch_falls_back_to_single_writes() {
    let mut store = ScriptedStore::new("Email", FieldKind::Email, mixed_case_records(5))
        .failing_on(&["rec2", "rec4"]);
    let records = store.scan_records("Email").expect("scan");
    let changeset = compute_changeset(&records);

    let tally = commit(&mut store, "Email", &changeset, batch(5));

    assert_eq!(tally.succeeded, 3);
    assert_eq!(tally.failed, 2);
    assert_eq!(tally.succeeded + tally.failed, changeset.len());
    assert_eq!(store.batch_calls, vec![5]);
    assert_eq!(
        store.single_calls,
        vec!["rec1", "rec2", "rec3", "rec4", "rec5"]
    );
    let failed = tally
        .errors
        .iter()
        .map(|entry| entry.record_id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(failed, vec!["rec2", "rec4"]);
    assert_eq!(tally.errors[1].before, " Person4@Example.COM");
    assert_eq!(tally.errors[1].intended_after, "person4@example.com");
}

#[test]
fn healthy_batches_are_not_retried() {
    let mut store = ScriptedStore::new("Email", FieldKind::Email, mixed_case_records(120))
        .failing_on(&["rec75"]);
    let records = store.scan_records("Email").expect("scan");
    let changeset = compute_changeset(&records);

    let tally = commit(&mut store, "Email", &changeset, batch(50));

    assert_eq!(store.batch_calls, vec![50, 50, 20]);
    assert_eq!(store.single_calls.len(), 50);
    assert!(store.single_calls.iter().all(|id| {
        let n: usize = id.trim_start_matches("rec").parse().expect("numeric id");
        (51..=100).contains(&n)
    }));
    assert_eq!(tally.batches, 3);
    assert_eq!(tally.fallbacks, 1);
    assert_eq!(tally.succeeded, 119);
    assert_eq!(tally.failed, 1);
}

#[test]
fn csv_store_rejects_invalid_addresses_individually() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "contacts.csv",
        "Name,Email Address\nAda,ADA@Example.com\nBob,Not An Email\nCy, cy@example.org\n",
    );
    let mut schema = TableSchema::default();
    schema.fields.push(email_normalize::field::FieldDescriptor::new(
        "Email Address",
        FieldKind::Email,
    ));
    schema.primary_field = Some("Name".to_string());
    let mut store = CsvStore::open(
        &path,
        CsvStoreOptions {
            schema: Some(schema),
            ..CsvStoreOptions::default()
        },
    )
    .expect("open store");

    let records = store.scan_records("Email Address").expect("scan");
    let changeset = compute_changeset(&records);
    assert_eq!(changeset.len(), 3);

    let tally = commit(&mut store, "Email Address", &changeset, batch(10));
    assert_eq!(tally.succeeded, 2);
    assert_eq!(tally.failed, 1);
    assert_eq!(tally.errors[0].record_id.as_str(), "row-2");
    assert!(tally.errors[0].error.contains("invalid email address 'not an email'"));

    store.save(None, encoding_rs::UTF_8).expect("save");
    assert_eq!(
        workspace.read("contacts.csv"),
        "Name,Email Address\nAda,ada@example.com\nBob,Not An Email\nCy,cy@example.org\n"
    );
}
