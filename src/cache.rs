//! Last synchronized quilt, kept on disk so the grid shows something while
//! the store is unreachable.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{QuiltError, Result};
use crate::grid::Quilt;
use crate::{log_info, log_warn};

const CACHE_MAGIC: &str = "PQC1";
const CACHE_FILE: &str = "quilt_cache.bin";

#[derive(Serialize, Deserialize)]
struct CacheFile {
    magic: String,
    /// Store the quilt came from; a cache for another store is ignored.
    source: String,
    saved_at: i64,
    quilt: Quilt,
}

/// Default location: `<data_dir>/PixelQuilt/quilt_cache.bin`.
pub fn cache_path() -> PathBuf {
    crate::logger::app_data_dir().join(CACHE_FILE)
}

pub fn save(path: &Path, source: &str, quilt: &Quilt) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = CacheFile {
        magic: CACHE_MAGIC.to_string(),
        source: source.to_string(),
        saved_at: chrono::Utc::now().timestamp_millis(),
        quilt: quilt.clone(),
    };
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, &file)?;
    Ok(())
}

/// Cached quilt for `source`, or `None` when the cache belongs to another
/// store or its quilt is malformed.
pub fn load(path: &Path, source: &str) -> Result<Option<Quilt>> {
    let reader = BufReader::new(File::open(path)?);
    let file: CacheFile = bincode::deserialize_from(reader)?;
    if file.magic != CACHE_MAGIC {
        return Err(QuiltError::Cache(format!("unknown cache magic '{}'", file.magic)));
    }
    if file.source != source {
        log_info!("Ignoring cache for {} (current store is {})", file.source, source);
        return Ok(None);
    }
    if let Err(e) = file.quilt.validate() {
        log_warn!("Discarding malformed cache {}: {}", path.display(), e);
        return Ok(None);
    }
    log_info!("Loaded cached quilt saved at {}", file.saved_at);
    Ok(Some(file.quilt))
}
