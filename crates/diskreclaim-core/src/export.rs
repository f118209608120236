//! CSV export of scan results and duplicate groups.
//!
//! Item rows: `path, name, category, size, modified, selected`.
//! Duplicate rows, one per member: `group, fingerprint, path, size,
//! wasted, modified, original, selected`. Timestamps are RFC 3339 in UTC,
//! empty when unknown.

use crate::analysis::duplicates::DuplicateGroup;
use crate::model::ScanResultItem;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io;
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Serialize)]
struct ItemRow<'a> {
    path: String,
    name: String,
    category: &'a str,
    size: u64,
    modified: String,
    selected: bool,
}

#[derive(Debug, Serialize)]
struct DuplicateRow {
    group: usize,
    fingerprint: String,
    path: String,
    size: u64,
    wasted: u64,
    modified: String,
    original: bool,
    selected: bool,
}

fn rfc3339(time: Option<SystemTime>) -> String {
    time.map(|t| DateTime::<Utc>::from(t).to_rfc3339())
        .unwrap_or_default()
}

/// Write `items` as CSV to `writer`.
pub fn write_items<W: io::Write>(items: &[ScanResultItem], writer: W) -> Result<(), ExportError> {
    let mut out = csv::Writer::from_writer(writer);
    for item in items {
        out.serialize(ItemRow {
            path: item.path().to_string_lossy().into_owned(),
            name: item.name(),
            category: item.category.label(),
            size: item.size,
            modified: rfc3339(item.entry.modified),
            selected: item.selected,
        })?;
    }
    out.flush()?;
    Ok(())
}

/// Write `groups` as CSV to `writer`. Groups are numbered from 1.
pub fn write_groups<W: io::Write>(groups: &[DuplicateGroup], writer: W) -> Result<(), ExportError> {
    let mut out = csv::Writer::from_writer(writer);
    for (i, group) in groups.iter().enumerate() {
        let fingerprint = group.fingerprint.to_string();
        for member in &group.members {
            out.serialize(DuplicateRow {
                group: i + 1,
                fingerprint: fingerprint.clone(),
                path: member.path.to_string_lossy().into_owned(),
                size: group.size,
                wasted: group.wasted_space(),
                modified: rfc3339(member.modified),
                original: member.is_original,
                selected: member.selected,
            })?;
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::duplicates::{DuplicateFile, Fingerprint};
    use crate::analysis::Category;
    use crate::model::CandidateEntry;
    use std::path::PathBuf;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn item_rows() {
        let items = vec![ScanResultItem::new(
            CandidateEntry::file(
                PathBuf::from("/tmp/cache/blob.bin"),
                2048,
                Some(UNIX_EPOCH + Duration::from_secs(86_400)),
            ),
            Category::Cache,
            2048,
            true,
        )];
        let mut buffer = Vec::new();
        write_items(&items, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("path,name,category,size,modified,selected"));
        assert_eq!(
            lines.next(),
            Some("/tmp/cache/blob.bin,blob.bin,Cache,2048,1970-01-02T00:00:00+00:00,true")
        );
    }

    #[test]
    fn one_row_per_group_member() {
        let member = |path: &str, original: bool| DuplicateFile {
            path: PathBuf::from(path),
            modified: None,
            is_original: original,
            selected: !original,
        };
        let groups = vec![DuplicateGroup {
            fingerprint: Fingerprint([0xab; 32]),
            size: 10,
            members: vec![member("/a", true), member("/b", false), member("/c", false)],
        }];
        let mut buffer = Vec::new();
        write_groups(&groups, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 4);
        assert!(rows[1].starts_with(&format!("1,{},/a,10,20,,true,false", "ab".repeat(32))));
    }
}
