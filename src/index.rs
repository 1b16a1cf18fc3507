//! Local index persistence
//!
//! The local index records what this client last synced or produced, one
//! record per line: `filename,version,hash1,hash2,...,hashN`. It is read
//! once at the start of a pass and rewritten once at the end; the rewrite
//! goes to a temporary file that is renamed over the old one, so an
//! interrupted pass always leaves the previous index intact.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs as afs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::IndexError;
use crate::types::FileMetadata;
use crate::validation::{temp_filename, INDEX_DELIMITER, INDEX_FILENAME};

/// Filename -> last synced metadata
pub type IndexMap = BTreeMap<String, FileMetadata>;

/// Reads and writes the index file of one base directory
pub struct LocalIndex {
	path: PathBuf,
	tmp_path: PathBuf,
}

impl LocalIndex {
	pub fn new(base_dir: &Path) -> Self {
		LocalIndex {
			path: base_dir.join(INDEX_FILENAME),
			tmp_path: base_dir.join(temp_filename(INDEX_FILENAME)),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Load the index; a missing file is an empty index
	pub async fn load(&self) -> Result<IndexMap, IndexError> {
		match afs::read_to_string(&self.path).await {
			Ok(contents) => parse_index(&contents),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!("[index] no index at {}, starting empty", self.path.display());
				Ok(IndexMap::new())
			}
			Err(e) => Err(IndexError::LoadFailed { source: e }),
		}
	}

	/// Replace the index file with `index`
	pub async fn save(&self, index: &IndexMap) -> Result<(), IndexError> {
		let contents = format_index(index);

		let mut file = afs::File::create(&self.tmp_path)
			.await
			.map_err(|e| IndexError::SaveFailed { source: e })?;
		file.write_all(contents.as_bytes())
			.await
			.map_err(|e| IndexError::SaveFailed { source: e })?;
		file.sync_all().await.map_err(|e| IndexError::SaveFailed { source: e })?;
		drop(file);

		afs::rename(&self.tmp_path, &self.path)
			.await
			.map_err(|e| IndexError::SaveFailed { source: e })?;
		debug!("[index] wrote {} records to {}", index.len(), self.path.display());
		Ok(())
	}
}

/// Parse index file contents
pub fn parse_index(contents: &str) -> Result<IndexMap, IndexError> {
	let mut index = IndexMap::new();
	for (n, line) in contents.lines().enumerate() {
		let line = line.trim_end_matches('\r');
		if line.is_empty() {
			continue;
		}

		let fields: Vec<&str> = line.split(INDEX_DELIMITER).collect();
		if fields.len() < 3 {
			return Err(IndexError::Corrupted {
				line: n + 1,
				message: format!("expected at least 3 fields, got {}", fields.len()),
			});
		}
		let version: i64 = fields[1].parse().map_err(|_| IndexError::Corrupted {
			line: n + 1,
			message: format!("bad version {:?}", fields[1]),
		})?;
		let hashes = fields[2..].iter().map(|h| h.to_string()).collect();

		index.insert(fields[0].to_string(), FileMetadata::new(fields[0], version, hashes));
	}
	Ok(index)
}

/// Render an index as file contents, records in filename order
pub fn format_index(index: &IndexMap) -> String {
	let mut out = String::new();
	for (name, meta) in index {
		out.push_str(name);
		out.push(INDEX_DELIMITER);
		out.push_str(&meta.version.to_string());
		for hash in &meta.block_hash_list {
			out.push(INDEX_DELIMITER);
			out.push_str(hash);
		}
		out.push('\n');
	}
	out
}


// vim: ts=4
