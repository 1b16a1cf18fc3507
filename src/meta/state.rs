//! Version arbitration over the authoritative file map

use std::collections::BTreeMap;
use tracing::debug;

use crate::error::StoreError;
use crate::types::{hash_lists_equal, FileMetadata};

/// Authoritative filename -> metadata map
///
/// Only [`FileInfoMap::update_file`] mutates entries, and it accepts a
/// candidate only when it is not behind the stored entry.
#[derive(Debug, Clone, Default)]
pub struct FileInfoMap {
	files: BTreeMap<String, FileMetadata>,
}

impl FileInfoMap {
	pub fn new() -> Self {
		Self::default()
	}

	/// Copy of the whole map
	pub fn snapshot(&self) -> BTreeMap<String, FileMetadata> {
		self.files.clone()
	}

	pub fn get(&self, filename: &str) -> Option<&FileMetadata> {
		self.files.get(filename)
	}

	pub fn len(&self) -> usize {
		self.files.len()
	}

	pub fn is_empty(&self) -> bool {
		self.files.is_empty()
	}

	/// Apply a candidate and return the resulting stored version
	///
	/// * unknown filename: stored as-is
	/// * older version, or same version with a different hash list:
	///   `StoreError::VersionConflict`, nothing changes
	/// * otherwise: hash list replaced, stored version incremented by one
	pub fn update_file(&mut self, candidate: &FileMetadata) -> Result<i64, StoreError> {
		let current = match self.files.get_mut(&candidate.filename) {
			Some(current) => current,
			None => {
				debug!(
					"[meta] new file {} at version {}",
					candidate.filename, candidate.version
				);
				self.files.insert(candidate.filename.clone(), candidate.clone());
				return Ok(candidate.version);
			}
		};

		let stale = candidate.version < current.version
			|| (candidate.version == current.version
				&& !hash_lists_equal(&candidate.block_hash_list, &current.block_hash_list));
		if stale {
			debug!(
				"[meta] rejected {} at version {} (current {})",
				candidate.filename, candidate.version, current.version
			);
			return Err(StoreError::VersionConflict {
				filename: candidate.filename.clone(),
				attempted: candidate.version,
				current: current.version,
			});
		}

		current.block_hash_list = candidate.block_hash_list.clone();
		current.version += 1;
		debug!("[meta] accepted {} -> version {}", candidate.filename, current.version);
		Ok(current.version)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn meta(version: i64, hashes: &[&str]) -> FileMetadata {
		FileMetadata::new("notes.txt", version, hashes.iter().map(|s| s.to_string()).collect())
	}

	#[test]
	fn test_new_file_inserted_as_is() {
		let mut map = FileInfoMap::new();
		assert_eq!(map.update_file(&meta(1, &["a"])).unwrap(), 1);
		assert_eq!(map.get("notes.txt").unwrap().version, 1);
	}

	#[test]
	fn test_new_file_version_not_enforced() {
		let mut map = FileInfoMap::new();
		assert_eq!(map.update_file(&meta(7, &["a"])).unwrap(), 7);
	}

	#[test]
	fn test_same_version_same_list_increments() {
		let mut map = FileInfoMap::new();
		map.update_file(&meta(1, &["a"])).unwrap();
		assert_eq!(map.update_file(&meta(1, &["a"])).unwrap(), 2);
	}

	#[test]
	fn test_same_version_different_list_conflicts() {
		let mut map = FileInfoMap::new();
		map.update_file(&meta(1, &["a"])).unwrap();
		let err = map.update_file(&meta(1, &["b"])).unwrap_err();
		assert_eq!(
			err,
			StoreError::VersionConflict {
				filename: "notes.txt".to_string(),
				attempted: 1,
				current: 1
			}
		);
		assert_eq!(map.get("notes.txt").unwrap().block_hash_list, vec!["a".to_string()]);
	}

	#[test]
	fn test_older_version_conflicts() {
		let mut map = FileInfoMap::new();
		map.update_file(&meta(3, &["a"])).unwrap();
		assert!(map.update_file(&meta(2, &["a"])).is_err());
		assert!(map.update_file(&meta(2, &["z"])).is_err());
		assert_eq!(map.get("notes.txt").unwrap().version, 3);
	}

	#[test]
	fn test_ahead_version_increments_stored_by_one() {
		let mut map = FileInfoMap::new();
		map.update_file(&meta(1, &["a"])).unwrap();
		assert_eq!(map.update_file(&meta(5, &["b"])).unwrap(), 2);
		assert_eq!(map.get("notes.txt").unwrap().block_hash_list, vec!["b".to_string()]);
	}
}

// vim: ts=4
