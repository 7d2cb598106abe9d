use resync::metadata::MetadataRecord;
use resync::types::RecordKind;
use std::fs;
use std::path::Path;

pub fn folder(name: &str, parent: &str) -> MetadataRecord {
    MetadataRecord::new(RecordKind::Collection, name, parent, 1_600_000_000_000)
}

pub fn document(name: &str, parent: &str, modified: i64) -> MetadataRecord {
    MetadataRecord::new(RecordKind::Document, name, parent, modified)
}

/// Write `<id>.metadata` into a store directory.
pub fn write_record(store: &Path, id: &str, record: &MetadataRecord) {
    fs::write(
        store.join(format!("{id}.metadata")),
        serde_json::to_string_pretty(record).unwrap(),
    )
    .unwrap();
}

/// Write a document record together with its payload.
pub fn write_document(store: &Path, id: &str, record: &MetadataRecord, payload: &[u8]) {
    write_record(store, id, record);
    fs::write(store.join(format!("{id}.pdf")), payload).unwrap();
}

pub fn read_record(store: &Path, id: &str) -> MetadataRecord {
    let text = fs::read_to_string(store.join(format!("{id}.metadata"))).unwrap();
    serde_json::from_str(&text).unwrap()
}
