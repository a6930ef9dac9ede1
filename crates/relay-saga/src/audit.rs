use std::time::Instant;

/// Status of a step in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepStatus {
    /// Step is running.
    Running,
    /// Step succeeded and the transaction moved forward.
    Advanced,
    /// Step recorded a terminal failure on the transaction.
    Failed,
    /// Step hit a transient error and will be retried.
    Retried,
}

/// Record of one attempt at one state.
#[derive(Debug)]
pub struct StepRecord {
    /// State the step ran in.
    pub state: String,
    /// State the transaction moved to, if it moved.
    pub next: Option<String>,
    pub status: StepStatus,
    pub started_at: Instant,
    pub completed_at: Option<Instant>,
    /// Failure reason or transient error.
    pub error: Option<String>,
}

/// Audit log of every step attempt made for one transaction.
#[derive(Debug, Default)]
pub struct SagaAuditLog {
    records: Vec<StepRecord>,
}

impl SagaAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_start(&mut self, state: &str) {
        self.records.push(StepRecord {
            state: state.to_string(),
            next: None,
            status: StepStatus::Running,
            started_at: Instant::now(),
            completed_at: None,
            error: None,
        });
    }

    /// Mark the last attempt as having moved the transaction to `next`.
    pub fn record_advanced(&mut self, next: &str) {
        if let Some(record) = self.records.last_mut() {
            record.status = StepStatus::Advanced;
            record.next = Some(next.to_string());
            record.completed_at = Some(Instant::now());
        }
    }

    /// Mark the last attempt as a terminal failure.
    pub fn record_failed(&mut self, reason: &str) {
        if let Some(record) = self.records.last_mut() {
            record.status = StepStatus::Failed;
            record.error = Some(reason.to_string());
            record.completed_at = Some(Instant::now());
        }
    }

    /// Mark the last attempt as retryable.
    pub fn record_retry(&mut self, error: &str) {
        if let Some(record) = self.records.last_mut() {
            record.status = StepStatus::Retried;
            record.error = Some(error.to_string());
            record.completed_at = Some(Instant::now());
        }
    }

    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    #[must_use]
    pub fn retries(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.status == StepStatus::Retried)
            .count()
    }

    /// One line per attempt, for logging.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for record in &self.records {
            let line = match (record.status, &record.next, &record.error) {
                (StepStatus::Advanced, Some(next), _) => format!("✓ {} -> {next}", record.state),
                (StepStatus::Failed, _, Some(error)) => format!("✗ {}: {error}", record.state),
                (StepStatus::Retried, _, Some(error)) => format!("↻ {}: {error}", record.state),
                _ => format!("… {}", record.state),
            };
            lines.push(line);
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_audit_log_is_empty() {
        let log = SagaAuditLog::new();
        assert!(log.records().is_empty());
        assert_eq!(log.retries(), 0);
    }

    #[test]
    fn record_start_adds_running_step() {
        let mut log = SagaAuditLog::new();
        log.record_start("new");

        assert_eq!(log.records().len(), 1);
        assert_eq!(log.records()[0].state, "new");
        assert_eq!(log.records()[0].status, StepStatus::Running);
        assert!(log.records()[0].completed_at.is_none());
    }

    #[test]
    fn record_advanced_sets_next_state() {
        let mut log = SagaAuditLog::new();
        log.record_start("new");
        log.record_advanced("member1");

        let record = &log.records()[0];
        assert_eq!(record.status, StepStatus::Advanced);
        assert_eq!(record.next.as_deref(), Some("member1"));
        assert!(record.completed_at.is_some());
    }

    #[test]
    fn retries_are_counted() {
        let mut log = SagaAuditLog::new();
        log.record_start("member1");
        log.record_retry("store unavailable");
        log.record_start("member1");
        log.record_advanced("member2");

        assert_eq!(log.retries(), 1);
        assert_eq!(log.records()[0].error.as_deref(), Some("store unavailable"));
    }

    #[test]
    fn summary_formats_all_attempts() {
        let mut log = SagaAuditLog::new();
        log.record_start("new");
        log.record_advanced("member1");
        log.record_start("member1");
        log.record_retry("timeout");
        log.record_start("member1");
        log.record_failed("conversation already exists");
        log.record_start("member2");

        let summary = log.summary();
        assert!(summary.contains("✓ new -> member1"));
        assert!(summary.contains("↻ member1: timeout"));
        assert!(summary.contains("✗ member1: conversation already exists"));
        assert!(summary.contains("… member2"));
    }
}
