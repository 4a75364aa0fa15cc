//! Dry-run diff: which records would change, and to what.

use std::slice;

use log::debug;
use serde::Serialize;

use crate::{
    normalize::normalize,
    store::{ChangeItem, Record},
};

/// Pending updates in scan order. Built once by [`compute_changeset`] and
/// only read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Changeset {
    items: Vec<ChangeItem>,
}

impl Changeset {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ChangeItem] {
        &self.items
    }

    pub fn iter(&self) -> slice::Iter<'_, ChangeItem> {
        self.items.iter()
    }

    /// Contiguous slices of at most `size` items, in order.
    pub fn batches(&self, size: usize) -> slice::Chunks<'_, ChangeItem> {
        self.items.chunks(size.max(1))
    }
}

impl<'a> IntoIterator for &'a Changeset {
    type Item = &'a ChangeItem;
    type IntoIter = slice::Iter<'a, ChangeItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

pub fn compute_changeset(records: &[Record]) -> Changeset {
    let mut items = Vec::new();
    for record in records {
        if record.value.is_blank() {
            continue;
        }
        let before = record.value.to_text();
        let after = normalize(&record.value);
        if after != before {
            items.push(ChangeItem {
                record_id: record.id.clone(),
                before,
                after,
            });
        }
    }
    debug!(
        "Diffed {} record(s): {} need normalizing",
        records.len(),
        items.len()
    );
    Changeset { items }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CellValue;
    use serde_json::json;

    #[test]
    fn only_changed_values_are_collected() {
        let records = vec![
            Record::new("1", " Foo@Bar.com "),
            Record::new("2", "baz@qux.com"),
            Record::new("3", CellValue::Null),
        ];
        let changeset = compute_changeset(&records);
        assert_eq!(
            changeset.items(),
            &[ChangeItem {
                record_id: "1".into(),
                before: " Foo@Bar.com ".to_string(),
                after: "foo@bar.com".to_string(),
            }]
        );
    }

    #[test]
    fn blank_values_never_produce_changes() {
        let records = vec![
            Record::new("a", CellValue::Null),
            Record::new("b", ""),
            Record::new("c", CellValue::Number(0.0)),
            Record::new("d", CellValue::Boolean(false)),
        ];
        assert!(compute_changeset(&records).is_empty());
    }

    #[test]
    fn whitespace_only_text_normalizes_to_empty() {
        let changeset = compute_changeset(&[Record::new("ws", "   ")]);
        assert_eq!(changeset.len(), 1);
        assert_eq!(changeset.items()[0].after, "");
    }

    #[test]
    fn non_text_values_compare_against_their_string_form() {
        let records = vec![
            Record::new("n", CellValue::Number(12.0)),
            Record::new("t", CellValue::Boolean(true)),
            Record::new("l", CellValue::Other(json!(["A@B.co"]))),
        ];
        let changeset = compute_changeset(&records);
        assert_eq!(changeset.len(), 1);
        assert_eq!(changeset.items()[0].record_id.as_str(), "l");
        assert_eq!(changeset.items()[0].before, "A@B.co");
    }

    #[test]
    fn duplicate_ids_are_kept_in_scan_order() {
        let records = vec![
            Record::new("dup", "B@x.io"),
            Record::new("other", "ok@x.io"),
            Record::new("dup", "C@x.io"),
        ];
        let changeset = compute_changeset(&records);
        let afters = changeset.iter().map(|item| item.after.as_str()).collect::<Vec<_>>();
        assert_eq!(afters, vec!["b@x.io", "c@x.io"]);
    }

    #[test]
    fn batches_are_contiguous_and_bounded() {
        let records = (0..7)
            .map(|i| Record::new(format!("r{i}"), format!("U{i}@X.IO")))
            .collect::<Vec<_>>();
        let changeset = compute_changeset(&records);
        let sizes = changeset.batches(3).map(<[ChangeItem]>::len).collect::<Vec<_>>();
        assert_eq!(sizes, vec![3, 3, 1]);
    }
}
