//! End-to-end mail-check cycles against in-memory channels.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_xlsxwriter::Workbook;
use tokio::sync::Mutex;

use placement_alert::attachments::{AttachmentScanner, SearchTerms};
use placement_alert::channels::{Mailbox, Notifier};
use placement_alert::error::{ChannelError, LlmError, NotifyError};
use placement_alert::llm::{ClassifierCapability, CompletionRequest, CompletionResponse, LlmProvider};
use placement_alert::pipeline::{
    Attachment, KeywordMatcher, LlmClassifier, MailMessage, PlacementAnalyzer, PlacementMonitor,
    spawn_monitor,
};
use placement_alert::profile::ProfileStore;

// ── Stubs ───────────────────────────────────────────────────────────

/// Inbox whose messages stay unseen until `mark_seen` is called.
#[derive(Default)]
struct FakeMailbox {
    inbox: Mutex<Vec<MailMessage>>,
    marked: Mutex<Vec<String>>,
    fail_fetch: AtomicBool,
    fail_mark: AtomicBool,
    fetches: AtomicUsize,
}

impl FakeMailbox {
    fn with(messages: Vec<MailMessage>) -> Arc<Self> {
        Arc::new(Self {
            inbox: Mutex::new(messages),
            ..Default::default()
        })
    }
}

#[async_trait]
impl Mailbox for FakeMailbox {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch_unseen(&self) -> Result<Vec<MailMessage>, ChannelError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ChannelError::ConnectionFailed {
                host: "imap.test".into(),
                reason: "connection refused".into(),
            });
        }
        Ok(self.inbox.lock().await.clone())
    }

    async fn mark_seen(&self, uids: &[String]) -> Result<(), ChannelError> {
        if self.fail_mark.load(Ordering::SeqCst) {
            return Err(ChannelError::Protocol("STORE rejected".into()));
        }
        self.inbox.lock().await.retain(|m| !uids.contains(&m.uid));
        self.marked.lock().await.extend(uids.iter().cloned());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    fail: AtomicBool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected {
                channel: "recording".into(),
                status: 503,
                body: "unavailable".into(),
            });
        }
        self.sent.lock().await.push(text.to_string());
        Ok(())
    }
}

/// LLM that counts calls and answers with a fixed reply.
struct CountingLlm {
    reply: String,
    calls: AtomicUsize,
}

#[async_trait]
impl LlmProvider for CountingLlm {
    fn model_name(&self) -> &str {
        "counting"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CompletionResponse {
            content: self.reply.clone(),
        })
    }
}

/// LLM that is rate limited until `recovered` is set.
struct FlakyLlm {
    reply: String,
    recovered: AtomicBool,
    calls: AtomicUsize,
}

#[async_trait]
impl LlmProvider for FlakyLlm {
    fn model_name(&self) -> &str {
        "flaky"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.recovered.load(Ordering::SeqCst) {
            return Err(LlmError::RateLimited {
                provider: "flaky".into(),
                retry_after: None,
            });
        }
        Ok(CompletionResponse {
            content: self.reply.clone(),
        })
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

fn mail(uid: &str, subject: &str, sender: &str) -> MailMessage {
    MailMessage {
        uid: uid.into(),
        message_id: format!("<{uid}@test>"),
        subject: subject.into(),
        sender: sender.into(),
        body: String::new(),
        attachments: Vec::new(),
        received_at: Utc::now(),
    }
}

fn shortlist_xlsx() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Shortlisted").unwrap();
    sheet.write_string(0, 0, "Reg No").unwrap();
    sheet.write_string(1, 0, "22BCE1385").unwrap();
    workbook.save_to_buffer().unwrap()
}

fn analyzer(capability: ClassifierCapability) -> Arc<PlacementAnalyzer> {
    Arc::new(PlacementAnalyzer::new(
        LlmClassifier::new(capability),
        KeywordMatcher::new(["placement", "internship", "hiring"]),
        ProfileStore::default(),
    ))
}

fn monitor(
    mailbox: Arc<FakeMailbox>,
    notifier: Arc<RecordingNotifier>,
    capability: ClassifierCapability,
) -> PlacementMonitor {
    PlacementMonitor::new(
        mailbox,
        notifier,
        analyzer(capability),
        Arc::new(AttachmentScanner::new(SearchTerms::default())),
    )
}

fn unavailable() -> ClassifierCapability {
    ClassifierCapability::Unavailable("no key".into())
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn placement_mail_is_alerted_and_marked_seen() {
    let mailbox = FakeMailbox::with(vec![
        mail("1", "TCS CodeVita Contest - Win Job Offers", "hr@tcs.com"),
        mail("2", "Weekend Sale - Up to 70% Off", "sales@amazon.com"),
    ]);
    let notifier = Arc::new(RecordingNotifier::default());
    let m = monitor(mailbox.clone(), notifier.clone(), unavailable());

    let report = m.run_cycle().await;
    assert_eq!(report.fetched, 2);
    assert_eq!(report.classified, 2);
    assert_eq!(report.placements, 1);
    assert_eq!(report.alerts_sent, 1);

    let sent = notifier.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("🚨 *Placement Alert!*"));
    assert!(sent[0].contains("🏢 *Company:* Tcs"));
    assert!(sent[0].contains("💼 *Role:* Position"));

    assert_eq!(*mailbox.marked.lock().await, vec!["1".to_string()]);
    // Non-placement mail stays unread.
    let inbox = mailbox.inbox.lock().await;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].uid, "2");
}

#[tokio::test]
async fn non_placement_mail_is_not_reclassified() {
    let llm = Arc::new(CountingLlm {
        reply: r#"{"is_placement_related": false, "company": "Amazon", "role": "N/A"}"#.into(),
        calls: AtomicUsize::new(0),
    });
    let mailbox = FakeMailbox::with(vec![mail("9", "Weekend Sale", "sales@amazon.com")]);
    let notifier = Arc::new(RecordingNotifier::default());
    let m = monitor(
        mailbox.clone(),
        notifier.clone(),
        ClassifierCapability::Available(llm.clone()),
    );

    m.run_cycle().await;
    let second = m.run_cycle().await;

    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.fetched, 1);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.classified, 0);
    assert!(notifier.sent.lock().await.is_empty());
    assert!(mailbox.marked.lock().await.is_empty());
}

#[tokio::test]
async fn llm_outage_negative_is_reclassified_after_recovery() {
    let llm = Arc::new(FlakyLlm {
        reply: r#"{"is_placement_related": true, "company": "Infosys", "role": "Specialist Programmer"}"#
            .into(),
        recovered: AtomicBool::new(false),
        calls: AtomicUsize::new(0),
    });
    let mailbox = FakeMailbox::with(vec![mail(
        "12",
        "Infosys SP role - registration closes Friday",
        "noreply@infosys.com",
    )]);
    let notifier = Arc::new(RecordingNotifier::default());
    let m = monitor(
        mailbox.clone(),
        notifier.clone(),
        ClassifierCapability::Available(llm.clone()),
    );

    let first = m.run_cycle().await;
    assert_eq!(first.classified, 1);
    assert_eq!(first.placements, 0);
    assert!(notifier.sent.lock().await.is_empty());

    llm.recovered.store(true, Ordering::SeqCst);
    let second = m.run_cycle().await;
    assert_eq!(second.skipped, 0);
    assert_eq!(second.classified, 1);
    assert_eq!(second.alerts_sent, 1);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 2);

    let sent = notifier.sent.lock().await;
    assert!(sent[0].contains("🏢 *Company:* Infosys"));
    assert_eq!(*mailbox.marked.lock().await, vec!["12".to_string()]);
}

#[tokio::test]
async fn keyword_only_negative_is_not_reclassified() {
    let mailbox = FakeMailbox::with(vec![mail("13", "Weekend Sale", "sales@amazon.com")]);
    let notifier = Arc::new(RecordingNotifier::default());
    let m = monitor(mailbox, notifier, unavailable());

    m.run_cycle().await;
    let second = m.run_cycle().await;
    assert_eq!(second.skipped, 1);
    assert_eq!(second.classified, 0);
}

#[tokio::test]
async fn dedup_forgets_mail_that_left_the_unseen_batch() {
    let llm = Arc::new(CountingLlm {
        reply: r#"{"is_placement_related": false}"#.into(),
        calls: AtomicUsize::new(0),
    });
    let newsletter = mail("14", "Campus newsletter", "news@vit.ac.in");
    let mailbox = FakeMailbox::with(vec![newsletter.clone()]);
    let notifier = Arc::new(RecordingNotifier::default());
    let m = monitor(
        mailbox.clone(),
        notifier,
        ClassifierCapability::Available(llm.clone()),
    );

    m.run_cycle().await;
    assert_eq!(m.run_cycle().await.skipped, 1);

    // Read elsewhere, then flagged unread again.
    mailbox.inbox.lock().await.clear();
    m.run_cycle().await;
    mailbox.inbox.lock().await.push(newsletter);

    let report = m.run_cycle().await;
    assert_eq!(report.skipped, 0);
    assert_eq!(report.classified, 1);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_delivery_is_retried_next_cycle() {
    let mailbox = FakeMailbox::with(vec![mail("3", "Internship drive", "cdc@vit.ac.in")]);
    let notifier = Arc::new(RecordingNotifier::default());
    notifier.fail.store(true, Ordering::SeqCst);
    let m = monitor(mailbox.clone(), notifier.clone(), unavailable());

    let first = m.run_cycle().await;
    assert_eq!(first.delivery_failures, 1);
    assert!(mailbox.marked.lock().await.is_empty());
    assert_eq!(mailbox.inbox.lock().await.len(), 1);

    notifier.fail.store(false, Ordering::SeqCst);
    let second = m.run_cycle().await;
    assert_eq!(second.skipped, 0);
    assert_eq!(second.alerts_sent, 1);
    assert_eq!(*mailbox.marked.lock().await, vec!["3".to_string()]);
}

#[tokio::test]
async fn mailbox_failure_aborts_only_the_cycle() {
    let mailbox = FakeMailbox::with(vec![mail("4", "Placement update", "cdc@vit.ac.in")]);
    mailbox.fail_fetch.store(true, Ordering::SeqCst);
    let notifier = Arc::new(RecordingNotifier::default());
    let m = monitor(mailbox.clone(), notifier.clone(), unavailable());

    let failed = m.run_cycle().await;
    assert!(failed.mailbox_error.is_some());
    assert_eq!(failed.classified, 0);

    mailbox.fail_fetch.store(false, Ordering::SeqCst);
    let ok = m.run_cycle().await;
    assert!(ok.mailbox_error.is_none());
    assert_eq!(ok.alerts_sent, 1);

    let stats = m.stats().snapshot().await;
    assert_eq!(stats.cycles_run, 2);
    assert_eq!(stats.alerts_sent, 1);
    assert!(stats.last_cycle_at.is_some());
}

#[tokio::test]
async fn unmarked_uids_are_retried_without_realerting() {
    let mailbox = FakeMailbox::with(vec![mail("5", "Hiring: SDE", "talent@acme.io")]);
    mailbox.fail_mark.store(true, Ordering::SeqCst);
    let notifier = Arc::new(RecordingNotifier::default());
    let m = monitor(mailbox.clone(), notifier.clone(), unavailable());

    m.run_cycle().await;
    assert_eq!(notifier.sent.lock().await.len(), 1);
    assert!(mailbox.marked.lock().await.is_empty());

    mailbox.fail_mark.store(false, Ordering::SeqCst);
    let second = m.run_cycle().await;
    assert_eq!(second.skipped, 1);
    assert_eq!(notifier.sent.lock().await.len(), 1);
    assert_eq!(*mailbox.marked.lock().await, vec!["5".to_string()]);
}

#[tokio::test]
async fn llm_result_and_attachment_summary_reach_the_alert() {
    let llm = Arc::new(CountingLlm {
        reply: r#"```json
{"is_placement_related": true, "company": "Zoho", "role": "Member Technical Staff",
 "deadline": "Jan 20", "type": "Full-time", "location": "Chennai"}
```"#
            .into(),
        calls: AtomicUsize::new(0),
    });
    let mut message = mail("6", "Zoho shortlist", "placements@vit.ac.in");
    message.attachments = vec![
        Attachment::new("round1.xlsx", shortlist_xlsx()),
        Attachment::new("brochure.pdf", b"%PDF-1.4".to_vec()),
    ];
    let mailbox = FakeMailbox::with(vec![message]);
    let notifier = Arc::new(RecordingNotifier::default());
    let m = monitor(
        mailbox,
        notifier.clone(),
        ClassifierCapability::Available(llm),
    );

    m.run_cycle().await;

    let sent = notifier.sent.lock().await;
    let alert = &sent[0];
    assert!(alert.contains("🏢 *Company:* Zoho"));
    assert!(alert.contains("📋 *Type:* Full-time"));
    assert!(alert.contains("⏰ *Deadline:* Jan 20"));
    assert!(alert.contains("📎 1 Excel attachment found (2 total)"));
    assert!(alert.contains("✅ Your name/ID found in attachments!"));
    assert!(alert.contains("🔍 Shortlisted: 22BCE1385"));
    assert!(alert.ends_with("📬 Check your inbox!"));
}

#[tokio::test]
async fn spawned_monitor_stops_on_shutdown() {
    let mailbox = FakeMailbox::with(Vec::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let m = Arc::new(monitor(mailbox.clone(), notifier, unavailable()));

    let (handle, shutdown) = spawn_monitor(Arc::clone(&m), Duration::from_secs(3600));

    // First cycle runs immediately, then the loop waits.
    tokio::time::timeout(Duration::from_secs(5), async {
        while mailbox.fetches.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    shutdown.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mailbox.fetches.load(Ordering::SeqCst), 1);
}
