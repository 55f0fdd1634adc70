//! Usage ledger: one immutable billing record per reasoning-model call.
//!
//! The ledger is append-only. The core never updates or deletes an entry,
//! and a failed write never fails the analysis that triggered it: the
//! [`UsageRecorder`] logs the error and moves on.
//!
//! Cost is computed from the token counts the provider reported for the
//! call, never from a local token estimate:
//!
//! ```text
//! cost = input_tokens × input_rate + output_tokens × output_rate
//! ```
//!
//! Storage is a port ([`UsageLedger`]) with two adapters: [`MemoryLedger`]
//! and [`JsonlLedger`]. Both serialise appends, so concurrent pipeline
//! invocations never lose an entry.

use crate::error::LedgerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

// ── Clock ────────────────────────────────────────────────────────────────

/// Source of ledger timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ── Pricing ──────────────────────────────────────────────────────────────

/// Token prices in USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for Pricing {
    /// gpt-4.1-nano list price.
    fn default() -> Self {
        Self {
            input_per_million: 0.10,
            output_per_million: 0.40,
        }
    }
}

impl Pricing {
    /// Negative or non-finite rates are treated as zero.
    pub fn per_million(input: f64, output: f64) -> Self {
        let sane = |r: f64| if r.is_finite() && r > 0.0 { r } else { 0.0 };
        Self {
            input_per_million: sane(input),
            output_per_million: sane(output),
        }
    }

    pub fn input_rate_per_token(&self) -> f64 {
        self.input_per_million / 1_000_000.0
    }

    pub fn output_rate_per_token(&self) -> f64 {
        self.output_per_million / 1_000_000.0
    }

    /// Estimated cost in USD for the given usage. Never negative.
    pub fn cost(&self, usage: TokenUsage) -> f64 {
        let cost = usage.input_tokens as f64 * self.input_rate_per_token()
            + usage.output_tokens as f64 * self.output_rate_per_token();
        cost.max(0.0)
    }
}

// ── Events ───────────────────────────────────────────────────────────────

/// Token counts reported by the provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// What the billed call was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Analyze,
    Annotate,
    Chat,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Analyze => "analyze",
            ActionKind::Annotate => "annotate",
            ActionKind::Chat => "chat",
        }
    }
}

/// One ledger entry. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub actor_id: String,
    pub action: ActionKind,
    /// USD, never negative.
    pub cost_estimate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// ── Storage port ─────────────────────────────────────────────────────────

/// Append target for usage events.
///
/// Implementations must tolerate concurrent `append` calls without losing
/// writes.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    async fn append(&self, event: UsageEvent) -> Result<(), LedgerError>;
}

/// In-process ledger. Entries live as long as the value.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    events: Mutex<Vec<UsageEvent>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries in append order.
    pub fn events(&self) -> Vec<UsageEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UsageLedger for MemoryLedger {
    async fn append(&self, event: UsageEvent) -> Result<(), LedgerError> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| std::io::Error::other("memory ledger lock poisoned"))?;
        events.push(event);
        Ok(())
    }
}

/// Append-only JSON-lines file, one event per line.
///
/// Appends from this value are serialised through an async mutex; the file
/// is opened in append mode for every write so external rotation is safe.
#[derive(Debug)]
pub struct JsonlLedger {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry back. A missing file is an empty ledger.
    pub async fn load(&self) -> Result<Vec<UsageEvent>, LedgerError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(LedgerError::from))
            .collect()
    }
}

#[async_trait]
impl UsageLedger for JsonlLedger {
    async fn append(&self, event: UsageEvent) -> Result<(), LedgerError> {
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

// ── Recorder ─────────────────────────────────────────────────────────────

/// Builds events and appends them, swallowing storage errors.
///
/// Cheap to clone; clones share the same ledger and clock.
#[derive(Clone)]
pub struct UsageRecorder {
    ledger: Arc<dyn UsageLedger>,
    clock: Arc<dyn Clock>,
    pricing: Pricing,
}

impl std::fmt::Debug for UsageRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageRecorder")
            .field("ledger", &"<dyn UsageLedger>")
            .field("pricing", &self.pricing)
            .finish()
    }
}

impl UsageRecorder {
    pub fn new(ledger: Arc<dyn UsageLedger>, clock: Arc<dyn Clock>, pricing: Pricing) -> Self {
        Self {
            ledger,
            clock,
            pricing,
        }
    }

    /// Recorder using the system clock.
    pub fn with_ledger(ledger: Arc<dyn UsageLedger>, pricing: Pricing) -> Self {
        Self::new(ledger, Arc::new(SystemClock), pricing)
    }

    pub fn pricing(&self) -> Pricing {
        self.pricing
    }

    /// Append an entry with a precomputed cost. Never fails.
    pub async fn record(&self, actor_id: &str, action: ActionKind, cost_estimate: f64) {
        let event = UsageEvent {
            actor_id: actor_id.to_string(),
            action,
            cost_estimate: cost_estimate.max(0.0),
            usage: None,
            model: None,
            timestamp: self.clock.now(),
        };
        self.append(event).await;
    }

    /// Price `usage` and append the entry. Never fails.
    pub async fn record_usage(
        &self,
        actor_id: &str,
        action: ActionKind,
        model: &str,
        usage: TokenUsage,
    ) {
        let event = UsageEvent {
            actor_id: actor_id.to_string(),
            action,
            cost_estimate: self.pricing.cost(usage),
            usage: Some(usage),
            model: Some(model.to_string()),
            timestamp: self.clock.now(),
        };
        self.append(event).await;
    }

    async fn append(&self, event: UsageEvent) {
        let actor = event.actor_id.clone();
        let action = event.action;
        let cost = event.cost_estimate;
        match self.ledger.append(event).await {
            Ok(()) => debug!(
                "Recorded usage: actor={} action={} cost=${:.6}",
                actor,
                action.as_str(),
                cost
            ),
            Err(e) => warn!(
                "Failed to record usage for actor={} action={}: {}",
                actor,
                action.as_str(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct BrokenLedger;

    #[async_trait]
    impl UsageLedger for BrokenLedger {
        async fn append(&self, _event: UsageEvent) -> Result<(), LedgerError> {
            Err(std::io::Error::other("disk full").into())
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn cost_formula_uses_both_rates() {
        let pricing = Pricing::per_million(2.0, 8.0);
        let cost = pricing.cost(TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 500_000,
        });
        assert!((cost - 6.0).abs() < 1e-9, "got {cost}");
        assert_eq!(pricing.cost(TokenUsage::default()), 0.0);
    }

    #[test]
    fn negative_rates_are_zeroed() {
        let pricing = Pricing::per_million(-1.0, f64::NAN);
        assert_eq!(pricing.input_per_million, 0.0);
        assert_eq!(pricing.output_per_million, 0.0);
    }

    #[tokio::test]
    async fn recorder_stamps_with_injected_clock() {
        let ledger = Arc::new(MemoryLedger::new());
        let recorder = UsageRecorder::new(
            ledger.clone(),
            Arc::new(FixedClock(fixed_time())),
            Pricing::per_million(1.0, 1.0),
        );
        recorder
            .record_usage(
                "actor-1",
                ActionKind::Chat,
                "gpt-4.1-nano",
                TokenUsage {
                    input_tokens: 10,
                    output_tokens: 20,
                },
            )
            .await;
        recorder.record("actor-1", ActionKind::Annotate, 0.5).await;

        let events = ledger.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].timestamp, fixed_time());
        assert_eq!(events[0].action, ActionKind::Chat);
        assert!((events[0].cost_estimate - 30.0 / 1_000_000.0).abs() < 1e-12);
        assert_eq!(events[0].model.as_deref(), Some("gpt-4.1-nano"));
        assert_eq!(events[1].usage, None);
        assert_eq!(events[1].cost_estimate, 0.5);
    }

    #[tokio::test]
    async fn storage_errors_are_swallowed() {
        let recorder = UsageRecorder::with_ledger(Arc::new(BrokenLedger), Pricing::default());
        recorder.record("actor", ActionKind::Analyze, 1.0).await;
    }

    #[tokio::test]
    async fn negative_cost_is_clamped() {
        let ledger = Arc::new(MemoryLedger::new());
        let recorder = UsageRecorder::with_ledger(ledger.clone(), Pricing::default());
        recorder.record("actor", ActionKind::Analyze, -3.0).await;
        assert_eq!(ledger.events()[0].cost_estimate, 0.0);
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let ledger = Arc::new(MemoryLedger::new());
        let recorder = UsageRecorder::with_ledger(ledger.clone(), Pricing::default());
        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let recorder = recorder.clone();
                tokio::spawn(async move {
                    recorder
                        .record(&format!("actor-{i}"), ActionKind::Analyze, 0.01)
                        .await
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(ledger.len(), 50);
    }

    #[tokio::test]
    async fn jsonl_ledger_round_trips_entries() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(JsonlLedger::new(dir.path().join("nested/usage.jsonl")));
        assert!(ledger.load().await.unwrap().is_empty());

        let recorder = UsageRecorder::new(
            ledger.clone(),
            Arc::new(FixedClock(fixed_time())),
            Pricing::default(),
        );
        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let recorder = recorder.clone();
                tokio::spawn(async move {
                    recorder
                        .record_usage(
                            "actor-9",
                            ActionKind::Analyze,
                            "gpt-4.1-nano",
                            TokenUsage {
                                input_tokens: 100,
                                output_tokens: 10,
                            },
                        )
                        .await
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }

        let events = ledger.load().await.unwrap();
        assert_eq!(events.len(), 20);
        assert!(events.iter().all(|e| e.actor_id == "actor-9"));
        assert_eq!(events[0].timestamp, fixed_time());
    }
}
