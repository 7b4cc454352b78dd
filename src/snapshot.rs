//! Manual snapshots of the live quilt, stored next to it in the shared store.
//!
//! A snapshot is written to `snapshots/manual/<unix-millis>` as
//! `{ data, timestamp, hash, label, squareCount, size }`.  The hash is the
//! first 16 hex digits of the SHA-256 of the compact JSON of `data`; `size`
//! is the byte length of that same JSON.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{QuiltError, Result};
use crate::grid::Quilt;
use crate::store::{QuiltStore, SNAPSHOTS_PATH, SQUARES_PATH};
use crate::{log_info, log_warn};

// ============================================================================
// HASHING & SIZES
// ============================================================================

/// 16-character lowercase hex fingerprint of `data`.
pub fn hash_data(data: &Value) -> String {
    let json = data.to_string();
    let digest = Sha256::digest(json.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..16].to_string()
}

/// Byte length of the compact JSON of `data`.
pub fn calculate_size(data: &Value) -> u64 {
    data.to_string().len() as u64
}

/// `0 Bytes`, `512 Bytes`, `1.5 KB`, `2.34 MB`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 3] = ["Bytes", "KB", "MB"];
    let k = 1024_f64;
    let b = bytes as f64;
    let i = ((b.ln() / k.ln()).floor() as usize).min(UNITS.len() - 1);
    let scaled = ((b / k.powi(i as i32)) * 100.0).round() / 100.0;
    format!("{} {}", scaled, UNITS[i])
}

/// Number of squares in a store value (0 when it is not a list).
pub fn square_count(data: &Value) -> usize {
    data.as_array().map_or(0, Vec::len)
}

/// Check that `data` is a list of `grid_size`×`grid_size` squares of colors.
pub fn validate_squares(data: &Value, grid_size: usize) -> Result<()> {
    Quilt::from_value(data, 1, grid_size).map(|_| ())
}

// ============================================================================
// RECORDS
// ============================================================================

/// Wire form of a stored snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    pub data: Value,
    pub timestamp: i64,
    pub hash: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub square_count: usize,
    #[serde(default)]
    pub size: u64,
}

/// Listing entry; everything but the data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub timestamp: i64,
    pub label: String,
    pub hash: String,
    pub size: u64,
    pub square_count: usize,
}

impl SnapshotInfo {
    pub fn date(&self) -> Option<DateTime<Local>> {
        Local.timestamp_millis_opt(self.timestamp).single()
    }

    pub fn date_string(&self) -> String {
        self.date()
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown date".to_string())
    }

    pub fn path(&self) -> String {
        snapshot_path(self.timestamp)
    }
}

pub fn snapshot_path(timestamp: i64) -> String {
    format!("{}/{}", SNAPSHOTS_PATH, timestamp)
}

fn default_label(timestamp: i64) -> String {
    let when = Local
        .timestamp_millis_opt(timestamp)
        .single()
        .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string());
    format!("Snapshot {}", when)
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// Snapshot the live quilt now.
pub fn create_snapshot(store: &dyn QuiltStore, label: Option<&str>) -> Result<SnapshotInfo> {
    create_snapshot_at(store, label, chrono::Utc::now().timestamp_millis())
}

/// Snapshot the live quilt under an explicit timestamp key.
pub fn create_snapshot_at(
    store: &dyn QuiltStore,
    label: Option<&str>,
    timestamp: i64,
) -> Result<SnapshotInfo> {
    let data = store
        .get(SQUARES_PATH)?
        .ok_or_else(|| QuiltError::not_found(SQUARES_PATH))?;

    let label = label
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_label(timestamp));

    let record = SnapshotRecord {
        hash: hash_data(&data),
        size: calculate_size(&data),
        square_count: square_count(&data),
        label,
        timestamp,
        data,
    };
    let info = SnapshotInfo {
        timestamp,
        label: record.label.clone(),
        hash: record.hash.clone(),
        size: record.size,
        square_count: record.square_count,
    };

    store.set(&snapshot_path(timestamp), serde_json::to_value(&record)?)?;
    log_info!(
        "Snapshot {} created: {} squares, hash {}",
        timestamp,
        info.square_count,
        info.hash
    );
    Ok(info)
}

/// All manual snapshots, newest first.
pub fn list_snapshots(store: &dyn QuiltStore) -> Result<Vec<SnapshotInfo>> {
    let Some(Value::Object(entries)) = store.get(SNAPSHOTS_PATH)? else {
        return Ok(Vec::new());
    };

    let mut list: Vec<SnapshotInfo> = entries
        .iter()
        .filter_map(|(key, entry)| {
            let Ok(timestamp) = key.parse::<i64>() else {
                log_warn!("Skipping snapshot with non-numeric key '{}'", key);
                return None;
            };
            let text = |field: &str| entry.get(field).and_then(Value::as_str).map(str::to_string);
            Some(SnapshotInfo {
                timestamp,
                label: text("label")
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| "Unlabeled".to_string()),
                hash: text("hash").unwrap_or_default(),
                size: entry.get("size").and_then(Value::as_u64).unwrap_or(0),
                square_count: entry
                    .get("squareCount")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as usize,
            })
        })
        .collect();

    list.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(list)
}

/// Overwrite the live quilt with the data of snapshot `timestamp`.  Data
/// that is not a list of equal N×N squares is refused and nothing is written.
pub fn restore_snapshot(store: &dyn QuiltStore, timestamp: i64) -> Result<SnapshotInfo> {
    let path = snapshot_path(timestamp);
    let entry = store
        .get(&path)?
        .ok_or_else(|| QuiltError::not_found(path.clone()))?;
    let data = entry
        .get("data")
        .filter(|d| !d.is_null())
        .cloned()
        .ok_or_else(|| QuiltError::shape(format!("snapshot {} does not contain data", timestamp)))?;

    // Square size follows the snapshot, which may predate the current layout
    let grid_size = data
        .get(0)
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    if grid_size == 0 && square_count(&data) > 0 {
        return Err(QuiltError::shape(format!("snapshot {} has an empty square", timestamp)));
    }
    validate_squares(&data, grid_size)?;

    let info = SnapshotInfo {
        timestamp,
        label: entry
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or("Unlabeled")
            .to_string(),
        hash: entry
            .get("hash")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| hash_data(&data)),
        size: calculate_size(&data),
        square_count: square_count(&data),
    };

    store.set(SQUARES_PATH, data)?;
    log_info!("Restored snapshot {} ({} squares)", timestamp, info.square_count);
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::QuiltLayout;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn hash_is_sixteen_lowercase_hex_chars() {
        let h = hash_data(&json!([["#F5EFEE"]]));
        assert_eq!(h.len(), 16);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(h, hash_data(&json!([["#F5EFEE"]])));
        assert_ne!(h, hash_data(&json!([["#F5EFEF"]])));
    }

    #[test]
    fn hash_of_empty_list_matches_sha256_prefix() {
        // sha256("[]") = 4f53cda18c2baa0c0354bb5f9a3ecbe5ed12ab4d8e11ba873c2f11161202b945
        assert_eq!(hash_data(&json!([])), "4f53cda18c2baa0c");
        assert_eq!(calculate_size(&json!([])), 2);
    }

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(512), "512 Bytes");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(2_453_667), "2.34 MB");
    }

    #[test]
    fn create_list_restore_cycle() {
        let store = MemoryStore::new();
        let quilt = Quilt::blank(QuiltLayout::classic());
        store.set(SQUARES_PATH, quilt.to_value()).unwrap();

        let first = create_snapshot_at(&store, Some("before party"), 1_000).unwrap();
        assert_eq!(first.square_count, 30);
        assert_eq!(first.path(), "snapshots/manual/1000");
        let second = create_snapshot_at(&store, None, 2_000).unwrap();
        assert!(second.label.starts_with("Snapshot "));

        let list = list_snapshots(&store).unwrap();
        assert_eq!(list.iter().map(|s| s.timestamp).collect::<Vec<_>>(), vec![2_000, 1_000]);
        assert_eq!(list[1].label, "before party");
        assert_eq!(list[1].hash, hash_data(&quilt.to_value()));

        store.set(SQUARES_PATH, json!([])).unwrap();
        let restored = restore_snapshot(&store, 1_000).unwrap();
        assert_eq!(restored.square_count, 30);
        assert_eq!(store.get(SQUARES_PATH).unwrap(), Some(quilt.to_value()));
    }

    #[test]
    fn stored_record_uses_camel_case() {
        let store = MemoryStore::new();
        store.set(SQUARES_PATH, json!([])).unwrap();
        create_snapshot_at(&store, Some("x"), 7).unwrap();
        let raw = store.get("snapshots/manual/7").unwrap().unwrap();
        assert_eq!(raw["squareCount"], json!(0));
        assert_eq!(raw["size"], json!(2));
        assert_eq!(raw["timestamp"], json!(7));
    }

    #[test]
    fn missing_data_is_reported() {
        let store = MemoryStore::new();
        assert!(matches!(
            create_snapshot_at(&store, None, 1),
            Err(QuiltError::NotFound { .. })
        ));
        assert!(matches!(restore_snapshot(&store, 1), Err(QuiltError::NotFound { .. })));
        assert!(list_snapshots(&store).unwrap().is_empty());
    }

    #[test]
    fn validation_rejects_ragged_rows() {
        let bad = json!([[["#000000", "#000000"], ["#000000"]]]);
        let err = validate_squares(&bad, 2).unwrap_err().to_string();
        assert!(err.contains("Square 0, row 1 has 1 columns, expected 2"), "{}", err);
        assert!(validate_squares(&json!({"a": 1}), 2).is_err());
    }

    #[test]
    fn corrupt_snapshot_is_not_restored() {
        let store = MemoryStore::new();
        let live = Quilt::blank(QuiltLayout::classic()).to_value();
        store.set(SQUARES_PATH, live.clone()).unwrap();

        let ragged = json!([
            [["#000000", "#000000"], ["#000000", "#000000"]],
            [["#000000"]]
        ]);
        store
            .set("snapshots/manual/5", json!({ "data": ragged, "label": "bad" }))
            .unwrap();
        store
            .set("snapshots/manual/6", json!({ "data": [[]], "label": "empty square" }))
            .unwrap();
        assert!(matches!(restore_snapshot(&store, 5), Err(QuiltError::Shape { .. })));
        assert!(matches!(restore_snapshot(&store, 6), Err(QuiltError::Shape { .. })));
        assert_eq!(store.get(SQUARES_PATH).unwrap(), Some(live));

        // an older 2×2 revision is still accepted
        let small = json!([[["#000000", "#F5EFEE"], ["#F5EFEE", "#F5EFEE"]]]);
        store
            .set("snapshots/manual/7", json!({ "data": small.clone(), "label": "old" }))
            .unwrap();
        assert_eq!(restore_snapshot(&store, 7).unwrap().square_count, 1);
        assert_eq!(store.get(SQUARES_PATH).unwrap(), Some(small));
    }
}

