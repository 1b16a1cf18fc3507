//! Per-pass sync outcomes

use std::fmt;

/// What happened to one file during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
	/// Local content accepted by the authority at `version`
	Uploaded { version: i64 },

	/// Local deletion accepted by the authority at `version`
	TombstoneUploaded { version: i64 },

	/// Remote content written locally
	Downloaded { version: i64 },

	/// Remote tombstone applied to the local directory
	DeletedLocally { version: i64 },

	/// Authority rejected our candidate as stale
	Conflict { attempted: i64, current: i64 },

	/// File left alone for this pass
	Skipped { reason: String },
}

impl fmt::Display for FileOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FileOutcome::Uploaded { version } => write!(f, "uploaded (v{})", version),
			FileOutcome::TombstoneUploaded { version } => {
				write!(f, "deletion uploaded (v{})", version)
			}
			FileOutcome::Downloaded { version } => write!(f, "downloaded (v{})", version),
			FileOutcome::DeletedLocally { version } => write!(f, "deleted locally (v{})", version),
			FileOutcome::Conflict { attempted, current } => {
				write!(f, "conflict (attempted v{}, remote v{})", attempted, current)
			}
			FileOutcome::Skipped { reason } => write!(f, "skipped: {}", reason),
		}
	}
}

/// Summary of one sync pass
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
	/// Outcomes in the order they happened
	pub outcomes: Vec<(String, FileOutcome)>,

	pub blocks_uploaded: usize,
	pub blocks_downloaded: usize,
	pub bytes_uploaded: u64,
	pub bytes_downloaded: u64,
}

impl SyncReport {
	pub fn record(&mut self, filename: &str, outcome: FileOutcome) {
		self.outcomes.push((filename.to_string(), outcome));
	}

	/// Latest outcome recorded for `filename`
	pub fn outcome(&self, filename: &str) -> Option<&FileOutcome> {
		self.outcomes.iter().rev().find(|(name, _)| name == filename).map(|(_, o)| o)
	}

	pub fn uploaded(&self) -> usize {
		self.count(|o| {
			matches!(o, FileOutcome::Uploaded { .. } | FileOutcome::TombstoneUploaded { .. })
		})
	}

	pub fn downloaded(&self) -> usize {
		self.count(|o| matches!(o, FileOutcome::Downloaded { .. } | FileOutcome::DeletedLocally { .. }))
	}

	pub fn conflicts(&self) -> usize {
		self.count(|o| matches!(o, FileOutcome::Conflict { .. }))
	}

	pub fn skipped(&self) -> usize {
		self.count(|o| matches!(o, FileOutcome::Skipped { .. }))
	}

	fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
		self.outcomes.iter().filter(|(_, o)| pred(o)).count()
	}
}


// vim: ts=4
