//! Configuration validation functions

use super::ValidationError;

/// Validate the chunking block size
///
/// # Arguments
/// * `block_size` - Block size in bytes (must be 1..=64MiB)
///
/// # Returns
/// `Ok(())` if valid, `Err(ValidationError)` if invalid
pub fn validate_block_size(block_size: usize) -> Result<(), ValidationError> {
	if block_size == 0 {
		return Err(ValidationError::ConfigError("Block size must be greater than 0".to_string()));
	}
	if block_size > 64 * 1024 * 1024 {
		return Err(ValidationError::ConfigError(format!(
			"Block size too large: {} bytes (max 64MiB)",
			block_size
		)));
	}
	Ok(())
}

/// Validate the virtual node count of the hash ring
pub fn validate_virtual_nodes(count: usize) -> Result<(), ValidationError> {
	if count == 0 {
		return Err(ValidationError::ConfigError(
			"Virtual node count must be greater than 0".to_string(),
		));
	}
	Ok(())
}

/// Validate the block store address set
pub fn validate_store_addrs(addrs: &[String]) -> Result<(), ValidationError> {
	if addrs.is_empty() {
		return Err(ValidationError::ConfigError(
			"At least one block store address is required".to_string(),
		));
	}
	if let Some(bad) = addrs.iter().find(|a| a.trim().is_empty()) {
		return Err(ValidationError::ConfigError(format!("Empty block store address: {:?}", bad)));
	}
	Ok(())
}

/// Validate retry count
pub fn validate_retry_count(count: u32) -> Result<(), ValidationError> {
	if count > 100 {
		return Err(ValidationError::ConfigError(format!("Retry count too high: {}", count)));
	}
	Ok(())
}

/// Validate timeout in seconds
pub fn validate_timeout_secs(timeout_secs: u64) -> Result<(), ValidationError> {
	if timeout_secs == 0 {
		return Err(ValidationError::ConfigError("Timeout must be greater than 0".to_string()));
	}
	if timeout_secs > 3600 {
		return Err(ValidationError::ConfigError(format!(
			"Timeout too large: {} seconds (max 3600)",
			timeout_secs
		)));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_validate_block_size() {
		assert!(validate_block_size(1).is_ok());
		assert!(validate_block_size(4096).is_ok());
		assert!(validate_block_size(0).is_err());
		assert!(validate_block_size(65 * 1024 * 1024).is_err());
	}

	#[test]
	fn test_validate_store_addrs() {
		assert!(validate_store_addrs(&["127.0.0.1:8081".to_string()]).is_ok());
		assert!(validate_store_addrs(&[]).is_err());
		assert!(validate_store_addrs(&[" ".to_string()]).is_err());
	}

	#[test]
	fn test_validate_retry_count() {
		assert!(validate_retry_count(0).is_ok());
		assert!(validate_retry_count(3).is_ok());
		assert!(validate_retry_count(101).is_err());
	}

	#[test]
	fn test_validate_timeout() {
		assert!(validate_timeout_secs(10).is_ok());
		assert!(validate_timeout_secs(0).is_err());
		assert!(validate_timeout_secs(3601).is_err());
	}
}

// vim: ts=4
