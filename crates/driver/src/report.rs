use derive_more::Display;

/// Outcome of a successfully processed prompt file.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display("{name}: {prompts} prompts in {batches} batches")]
pub struct FileReport {
    pub name: String,
    pub prompts: usize,
    pub batches: usize,
    /// Units of work the backend received (tasks, requests).
    pub submissions: usize,
    pub deleted: bool,
}

/// Tally of a whole [`run`](crate::BatchDriver::run).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of directory scans performed.
    pub scans: usize,
    /// Files whose every batch succeeded.
    pub processed: usize,
    /// Files that failed (and were therefore left on disk).
    pub failed: usize,
    pub deleted: usize,
    pub prompts: usize,
    /// The run ended because shutdown was requested.
    pub interrupted: bool,
}
impl RunSummary {
    pub(crate) fn record(&mut self, report: &FileReport) {
        self.processed += 1;
        self.prompts += report.prompts;
        if report.deleted {
            self.deleted += 1;
        }
    }
}
