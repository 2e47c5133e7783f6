use serde::Serialize;

use crate::media::{MediaItem, StatusKind};

/// Whole-percent progress for `sent` of `total` bytes. Empty files are complete.
pub fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent.min(total) * 100) / total) as u8
}

/// Byte counter handed to a transfer; reports each new whole percent once.
pub struct TransferProgress {
    total: u64,
    sent: u64,
    last_percent: u8,
    on_percent: Box<dyn FnMut(u8) + Send + Sync>,
}

impl TransferProgress {
    pub fn new(total: u64, on_percent: impl FnMut(u8) + Send + Sync + 'static) -> Self {
        Self {
            total,
            sent: 0,
            last_percent: 0,
            on_percent: Box::new(on_percent),
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn advance(&mut self, bytes: u64) {
        self.sent = self.sent.saturating_add(bytes).min(self.total);
        self.report(percent(self.sent, self.total));
    }

    pub fn finish(&mut self) {
        self.sent = self.total;
        self.report(100);
    }

    fn report(&mut self, next: u8) {
        if next > self.last_percent {
            self.last_percent = next;
            (self.on_percent)(next);
        }
    }
}

/// Per-status counts for the compose form's status line.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueSummary {
    pub total: usize,
    pub queued: usize,
    pub uploading: usize,
    pub uploaded: usize,
    pub failed: usize,
    /// Mean progress across items; settled items count as complete.
    pub overall_progress: f32,
}

impl QueueSummary {
    pub fn from_items(items: &[MediaItem]) -> Self {
        let mut summary = QueueSummary {
            total: items.len(),
            ..Default::default()
        };
        let mut progress_sum = 0u64;

        for item in items {
            match item.status_kind() {
                StatusKind::Queued => summary.queued += 1,
                StatusKind::Uploading => {
                    summary.uploading += 1;
                    progress_sum += item.progress().unwrap_or(0) as u64;
                }
                StatusKind::Uploaded => {
                    summary.uploaded += 1;
                    progress_sum += 100;
                }
                StatusKind::Failed => {
                    summary.failed += 1;
                    progress_sum += 100;
                }
            }
        }

        if summary.total > 0 {
            summary.overall_progress = progress_sum as f32 / summary.total as f32;
        }
        summary
    }

    pub fn pending(&self) -> usize {
        self.queued + self.uploading
    }

    pub fn is_settled(&self) -> bool {
        self.pending() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 200), 0);
        assert_eq!(percent(50, 200), 25);
        assert_eq!(percent(500, 200), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn test_transfer_progress_reports_each_percent_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut progress = TransferProgress::new(1000, move |p| sink.lock().unwrap().push(p));

        progress.advance(5); // 0%, not reported
        progress.advance(5); // 1%
        progress.advance(3); // still 1%
        progress.advance(487); // 50%
        progress.finish();
        progress.advance(100);

        assert_eq!(*seen.lock().unwrap(), vec![1, 50, 100]);
        assert_eq!(progress.sent(), 1000);
    }

    #[test]
    fn test_empty_summary() {
        let summary = QueueSummary::from_items(&[]);
        assert_eq!(summary.total, 0);
        assert!(summary.is_settled());
        assert_eq!(summary.overall_progress, 0.0);
    }
}
