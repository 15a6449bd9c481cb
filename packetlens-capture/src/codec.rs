//! Capture file import/export
//!
//! A capture file is a JSON document:
//!
//! ```json
//! {"format": "packetlens-capture", "version": 1,
//!  "exported_at": "2024-01-01T12:00:00+00:00", "packet_count": 2,
//!  "packets": [ ... ]}
//! ```
//!
//! Import also accepts a bare array of packet records.

use chrono::Utc;
use packetlens_core::{Error, PacketRecord, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Value of the `format` field
pub const FORMAT_NAME: &str = "packetlens-capture";

/// Current document version
pub const FORMAT_VERSION: u64 = 1;

#[derive(Serialize)]
struct ExportDocument<'a> {
    format: &'static str,
    version: u64,
    exported_at: String,
    packet_count: usize,
    packets: &'a [PacketRecord],
}

/// Serialize records into a capture document
pub fn export(records: &[PacketRecord]) -> Result<Vec<u8>> {
    let doc = ExportDocument {
        format: FORMAT_NAME,
        version: FORMAT_VERSION,
        exported_at: Utc::now().to_rfc3339(),
        packet_count: records.len(),
        packets: records,
    };
    serde_json::to_vec_pretty(&doc).map_err(|e| Error::engine(format!("export failed: {}", e)))
}

/// Parse a capture document.
///
/// Records come back in file order, renumbered from 1. Nothing is returned
/// unless every record parses and passes validation.
pub fn import(bytes: &[u8]) -> Result<Vec<PacketRecord>> {
    let doc: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::malformed(format!("not valid JSON: {}", e)))?;

    let packets = match doc {
        Value::Array(items) => items,
        Value::Object(mut obj) => {
            if let Some(format) = obj.get("format") {
                if format.as_str() != Some(FORMAT_NAME) {
                    return Err(Error::malformed(format!("unknown format {}", format)));
                }
            }
            if let Some(version) = obj.get("version") {
                match version.as_u64() {
                    Some(v) if v <= FORMAT_VERSION => {}
                    _ => return Err(Error::malformed(format!("unsupported version {}", version))),
                }
            }
            match obj.remove("packets") {
                Some(Value::Array(items)) => items,
                Some(_) => return Err(Error::malformed("'packets' is not a list")),
                None => return Err(Error::malformed("missing 'packets' list")),
            }
        }
        _ => return Err(Error::malformed("expected an object or a list of packets")),
    };

    let mut records = Vec::with_capacity(packets.len());
    for (index, item) in packets.into_iter().enumerate() {
        let mut record: PacketRecord = serde_json::from_value(item)
            .map_err(|e| Error::malformed(format!("packet {}: {}", index, e)))?;
        record
            .validate()
            .map_err(|e| Error::malformed(format!("packet {}: {}", index, e)))?;
        record.number = index as u64 + 1;
        records.push(record);
    }

    debug!(packets = records.len(), "Parsed capture document");
    Ok(records)
}

/// Write records to `path`.
///
/// The document goes to a temporary file next to the destination first, so a
/// failed export never leaves a truncated file behind.
pub fn export_to_path(path: &Path, records: &[PacketRecord]) -> Result<usize> {
    let bytes = export(records)?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;

    info!(path = %path.display(), packets = records.len(), "Exported packets");
    Ok(records.len())
}

/// Read and parse a capture file
pub fn import_from_path(path: &Path) -> Result<Vec<PacketRecord>> {
    let bytes = fs::read(path)?;
    let records = import(&bytes)?;
    info!(path = %path.display(), packets = records.len(), "Imported packets");
    Ok(records)
}
