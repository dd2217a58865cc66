//! Mail-check loop: fetch unseen mail, classify, scan attachments, alert.
//!
//! One cycle runs to completion before the fixed wait starts. Shutdown cancels
//! the wait but never an in-progress cycle.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::attachments::{AttachmentScanner, format_attachment_summary};
use crate::channels::{Mailbox, Notifier};
use crate::pipeline::alert::format_placement_alert;
use crate::pipeline::analyzer::PlacementAnalyzer;
use crate::pipeline::types::MailMessage;

/// Counters shared with the control API.
#[derive(Debug, Default)]
pub struct MonitorStats {
    cycles_run: AtomicU64,
    messages_classified: AtomicU64,
    alerts_sent: AtomicU64,
    last_cycle_at: RwLock<Option<DateTime<Utc>>>,
}

/// Point-in-time copy of [`MonitorStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub cycles_run: u64,
    pub messages_classified: u64,
    pub alerts_sent: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

impl MonitorStats {
    pub async fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles_run: self.cycles_run.load(Ordering::Relaxed),
            messages_classified: self.messages_classified.load(Ordering::Relaxed),
            alerts_sent: self.alerts_sent.load(Ordering::Relaxed),
            last_cycle_at: *self.last_cycle_at.read().await,
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub fetched: usize,
    /// Already classified in an earlier cycle.
    pub skipped: usize,
    pub classified: usize,
    pub placements: usize,
    pub alerts_sent: usize,
    pub delivery_failures: usize,
    /// Set when the mailbox could not be read; nothing else ran.
    pub mailbox_error: Option<String>,
}

/// Wires mailbox, analyzer, scanner and notifier together.
pub struct PlacementMonitor {
    mailbox: Arc<dyn Mailbox>,
    notifier: Arc<dyn Notifier>,
    analyzer: Arc<PlacementAnalyzer>,
    scanner: Arc<AttachmentScanner>,
    stats: Arc<MonitorStats>,
    /// Message ids with a settled outcome, limited to the last unseen batch.
    seen: Mutex<HashSet<String>>,
    /// Delivered uids whose `\Seen` flag could not be set yet.
    unmarked: Mutex<Vec<String>>,
}

impl PlacementMonitor {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        notifier: Arc<dyn Notifier>,
        analyzer: Arc<PlacementAnalyzer>,
        scanner: Arc<AttachmentScanner>,
    ) -> Self {
        Self {
            mailbox,
            notifier,
            analyzer,
            scanner,
            stats: Arc::new(MonitorStats::default()),
            seen: Mutex::new(HashSet::new()),
            unmarked: Mutex::new(Vec::new()),
        }
    }

    pub fn stats(&self) -> Arc<MonitorStats> {
        Arc::clone(&self.stats)
    }

    /// Run one mail-check cycle. Failures are logged, never returned.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport {
            cycle_id: Uuid::new_v4(),
            ..Default::default()
        };

        let messages = match self.mailbox.fetch_unseen().await {
            Ok(messages) => messages,
            Err(e) => {
                error!(
                    cycle = %report.cycle_id,
                    mailbox = self.mailbox.name(),
                    error = %e,
                    "Mail check failed"
                );
                report.mailbox_error = Some(e.to_string());
                self.finish_cycle().await;
                return report;
            }
        };
        report.fetched = messages.len();
        self.forget_absent(&messages).await;
        if !messages.is_empty() {
            info!(cycle = %report.cycle_id, count = messages.len(), "Unseen messages fetched");
        }

        let mut to_mark = std::mem::take(&mut *self.unmarked.lock().await);

        for message in messages {
            if self.seen.lock().await.contains(&message.message_id) {
                report.skipped += 1;
                continue;
            }
            self.process_message(message, &mut report, &mut to_mark)
                .await;
        }

        if !to_mark.is_empty()
            && let Err(e) = self.mailbox.mark_seen(&to_mark).await
        {
            warn!(count = to_mark.len(), error = %e, "Failed to mark messages as seen");
            self.unmarked.lock().await.extend(to_mark);
        }

        self.finish_cycle().await;
        debug!(?report, "Mail check complete");
        report
    }

    async fn process_message(
        &self,
        mut message: MailMessage,
        report: &mut CycleReport,
        to_mark: &mut Vec<String>,
    ) {
        let assessment = self
            .analyzer
            .assess(&message.subject, &message.sender, &message.body)
            .await;
        let result = assessment.result;
        report.classified += 1;
        self.stats.messages_classified.fetch_add(1, Ordering::Relaxed);

        if !result.is_placement_related {
            if assessment.source.is_provisional() {
                // Keyword stopgap for a failed LLM call; ask the LLM again next cycle.
                debug!(subject = %message.subject, "Not placement related (provisional)");
            } else {
                debug!(subject = %message.subject, "Not placement related");
                self.seen.lock().await.insert(message.message_id);
            }
            return;
        }
        report.placements += 1;
        info!(
            subject = %message.subject,
            company = %result.company,
            role = %result.role,
            "Placement mail detected"
        );

        let attachment_info = if message.attachments.is_empty() {
            None
        } else {
            let scanner = Arc::clone(&self.scanner);
            let attachments = std::mem::take(&mut message.attachments);
            match tokio::task::spawn_blocking(move || scanner.scan(&attachments)).await {
                Ok(scan) => format_attachment_summary(&scan),
                Err(e) => {
                    error!(error = %e, "Attachment scan task failed");
                    None
                }
            }
        };

        let alert = format_placement_alert(&message.subject, &result, attachment_info.as_deref());
        match self.notifier.send(&alert).await {
            Ok(()) => {
                report.alerts_sent += 1;
                self.stats.alerts_sent.fetch_add(1, Ordering::Relaxed);
                self.seen.lock().await.insert(message.message_id);
                to_mark.push(message.uid);
            }
            Err(e) => {
                // Left unseen and out of the dedup set so the next cycle retries.
                report.delivery_failures += 1;
                error!(
                    notifier = self.notifier.name(),
                    subject = %message.subject,
                    error = %e,
                    "Alert delivery failed"
                );
            }
        }
    }

    /// Drop dedup entries for mail no longer in the unseen batch.
    async fn forget_absent(&self, messages: &[MailMessage]) {
        let current: HashSet<&str> = messages.iter().map(|m| m.message_id.as_str()).collect();
        let mut seen = self.seen.lock().await;
        let before = seen.len();
        seen.retain(|id| current.contains(id.as_str()));
        if seen.len() < before {
            debug!(dropped = before - seen.len(), "Pruned dedup set");
        }
    }

    async fn finish_cycle(&self) {
        self.stats.cycles_run.fetch_add(1, Ordering::Relaxed);
        *self.stats.last_cycle_at.write().await = Some(Utc::now());
    }
}

/// Spawn the polling loop. Send `true` on the returned channel to stop it.
pub fn spawn_monitor(
    monitor: Arc<PlacementMonitor>,
    interval: Duration,
) -> (JoinHandle<()>, watch::Sender<bool>) {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Placement monitor started");

        loop {
            monitor.run_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Placement monitor shutting down");
                        return;
                    }
                }
            }

            if *shutdown_rx.borrow() {
                info!("Placement monitor shutting down");
                return;
            }
        }
    });

    (handle, shutdown_tx)
}
