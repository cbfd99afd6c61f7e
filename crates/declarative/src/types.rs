//! Core types for declarative resource management

/// Current or desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Resource exists on disk
    Present { details: Option<String> },
    /// Resource does not exist
    Absent,
    /// State cannot be determined
    Unknown,
}

/// Result of applying a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// Already in the desired state
    NoChange,
    /// Resource was created
    Created,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteSummary {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ExecuteSummary {
    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of consumer workers; 1 keeps applies strictly sequential
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 1,
        }
    }
}
