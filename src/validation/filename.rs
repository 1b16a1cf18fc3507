//! Filename validation for directory scans

use super::ValidationError;

/// Name of the local index file inside the base directory
pub const INDEX_FILENAME: &str = "index.db";

/// Field delimiter of the local index file
pub const INDEX_DELIMITER: char = ',';

/// Suffix of in-flight download files
pub const TEMP_SUFFIX: &str = ".blocksync-tmp";

/// Check if a filename can take part in sync
///
/// Rejects the index file itself, names that would break the one-record-per
/// line index format (delimiter, newlines and other control characters),
/// names with path separators, and leftovers of interrupted downloads.
pub fn is_valid_filename(name: &str) -> bool {
	validate_filename(name).is_ok()
}

/// Validate a filename
///
/// # Returns
/// `Ok(())` if valid, `Err(ValidationError)` naming the reason otherwise
pub fn validate_filename(name: &str) -> Result<(), ValidationError> {
	if name.is_empty() {
		return Err(ValidationError::FilenameError("Filename is empty".to_string()));
	}
	if name == "." || name == ".." {
		return Err(ValidationError::FilenameError(format!("{:?} is not a file name", name)));
	}
	if name == INDEX_FILENAME {
		return Err(ValidationError::FilenameError(format!("{} is reserved", INDEX_FILENAME)));
	}
	if name.contains(INDEX_DELIMITER) {
		return Err(ValidationError::FilenameError(format!(
			"{:?} contains the index delimiter {:?}",
			name, INDEX_DELIMITER
		)));
	}
	if name.chars().any(char::is_control) {
		return Err(ValidationError::FilenameError(format!(
			"{:?} contains a control character",
			name
		)));
	}
	if name.contains('/') || name.contains('\\') {
		return Err(ValidationError::FilenameError(format!(
			"{:?} contains a path separator",
			name
		)));
	}
	if name.ends_with(TEMP_SUFFIX) {
		return Err(ValidationError::FilenameError(format!(
			"{:?} is an unfinished download",
			name
		)));
	}
	Ok(())
}

/// Temporary name used while downloading `name`
pub fn temp_filename(name: &str) -> String {
	format!(".{}{}", name, TEMP_SUFFIX)
}


// vim: ts=4
