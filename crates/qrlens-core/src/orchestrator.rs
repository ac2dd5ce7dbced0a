//! Scan orchestration: cooldown, history dispatch and the active result.
//!
//! State machine: `Idle -> Cooldown -> Idle`. A decode accepted while in
//! cooldown is dropped; this is the only debounce between a code held in
//! front of a still-running camera and the history.

use crate::capabilities::{Haptics, NoHaptics, default_haptic_pattern};
use crate::classify::classify;
use crate::history::{HistoryStorage, HistoryStore, RecordOutcome};
use crate::types::ScanResult;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Default cooldown after an accepted scan.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(2000);

/// Time source, split out so cooldown can be driven by tests.
pub trait Clock {
    /// Monotonic instant for cooldown arithmetic.
    fn now(&self) -> Instant;
    /// Wall-clock time stamped onto results.
    fn wall(&self) -> DateTime<Utc>;
}

/// Real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Tunables for the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub cooldown: Duration,
    pub haptic_pattern: Vec<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            haptic_pattern: default_haptic_pattern(),
        }
    }
}

/// Orchestrator phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Cooldown { until: Instant },
}

/// What happened to an incoming decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// Arrived during cooldown; nothing changed.
    Dropped,
    /// New entry prepended to history and made active.
    Recorded(ScanResult),
    /// Same content as the history head; head made active, history unchanged.
    Repeated(ScanResult),
}

impl AcceptOutcome {
    /// The result to present, if any.
    pub fn result(&self) -> Option<&ScanResult> {
        match self {
            AcceptOutcome::Dropped => None,
            AcceptOutcome::Recorded(r) | AcceptOutcome::Repeated(r) => Some(r),
        }
    }
}

/// Ties classification, history and cooldown together.
pub struct ScanOrchestrator<S: HistoryStorage, C: Clock = SystemClock> {
    history: HistoryStore<S>,
    clock: C,
    haptics: Box<dyn Haptics>,
    config: OrchestratorConfig,
    phase: ScanPhase,
    active: Option<ScanResult>,
}

impl<S: HistoryStorage> ScanOrchestrator<S, SystemClock> {
    pub fn new(history: HistoryStore<S>, config: OrchestratorConfig) -> Self {
        Self::with_clock(history, config, SystemClock)
    }
}

impl<S: HistoryStorage, C: Clock> ScanOrchestrator<S, C> {
    pub fn with_clock(history: HistoryStore<S>, config: OrchestratorConfig, clock: C) -> Self {
        Self {
            history,
            clock,
            haptics: Box::new(NoHaptics),
            config,
            phase: ScanPhase::Idle,
            active: None,
        }
    }

    /// Use `haptics` for acknowledgement pulses.
    pub fn with_haptics(mut self, haptics: Box<dyn Haptics>) -> Self {
        self.haptics = haptics;
        self
    }

    /// Current phase, expiring a finished cooldown.
    pub fn phase(&mut self) -> ScanPhase {
        if let ScanPhase::Cooldown { until } = self.phase
            && self.clock.now() >= until
        {
            self.phase = ScanPhase::Idle;
        }
        self.phase
    }

    pub fn is_cooling_down(&mut self) -> bool {
        matches!(self.phase(), ScanPhase::Cooldown { .. })
    }

    /// Handle a decoded payload.
    pub fn accept(&mut self, content: &str) -> AcceptOutcome {
        if self.is_cooling_down() {
            tracing::debug!("Scan dropped during cooldown");
            return AcceptOutcome::Dropped;
        }

        let kind = classify(content);
        let result = ScanResult::new(content, kind, self.clock.wall());
        let outcome = match self.history.record(result.clone()) {
            RecordOutcome::Inserted => {
                tracing::info!("Recorded {} scan ({} chars)", kind, content.len());
                AcceptOutcome::Recorded(result)
            }
            RecordOutcome::RepeatOfHead => {
                tracing::debug!("Repeat of history head, not recorded");
                match self.history.head() {
                    Some(head) => AcceptOutcome::Repeated(head.clone()),
                    None => AcceptOutcome::Repeated(result),
                }
            }
        };

        self.active = outcome.result().cloned();
        self.phase = ScanPhase::Cooldown {
            until: self.clock.now() + self.config.cooldown,
        };
        self.acknowledge();
        outcome
    }

    fn acknowledge(&self) {
        if let Err(e) = self.haptics.pulse(&self.config.haptic_pattern) {
            tracing::debug!("Skipping haptic pulse: {}", e);
        }
    }

    /// The result currently presented.
    pub fn active(&self) -> Option<&ScanResult> {
        self.active.as_ref()
    }

    /// Close the presented result.
    pub fn dismiss(&mut self) {
        self.active = None;
    }

    /// Present an existing history entry.
    pub fn select(&mut self, id: &str) -> Option<&ScanResult> {
        self.active = self.history.find(id).cloned();
        self.active.as_ref()
    }

    pub fn history(&self) -> &HistoryStore<S> {
        &self.history
    }

    /// Clear all history. The active result is kept on screen.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::HapticsError;
    use crate::history::MemoryStorage;
    use crate::types::PayloadKind;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Clock advanced by hand.
    #[derive(Clone)]
    struct ManualClock {
        start: Instant,
        elapsed: Rc<Cell<Duration>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                start: Instant::now(),
                elapsed: Rc::new(Cell::new(Duration::ZERO)),
            }
        }

        fn advance(&self, by: Duration) {
            self.elapsed.set(self.elapsed.get() + by);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.start + self.elapsed.get()
        }

        fn wall(&self) -> DateTime<Utc> {
            let since_epoch = chrono::Duration::from_std(self.elapsed.get())
                .unwrap_or_else(|_| chrono::Duration::zero());
            DateTime::from_timestamp(0, 0).unwrap_or_default() + since_epoch
        }
    }

    struct CountingHaptics(Rc<Cell<u32>>);

    impl Haptics for CountingHaptics {
        fn pulse(&self, _pattern: &[Duration]) -> Result<(), HapticsError> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    fn orchestrator(
        storage: MemoryStorage,
    ) -> (ScanOrchestrator<MemoryStorage, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let orch = ScanOrchestrator::with_clock(
            HistoryStore::load(storage),
            OrchestratorConfig::default(),
            clock.clone(),
        );
        (orch, clock)
    }

    #[test]
    fn test_accept_records_and_presents() {
        let (mut orch, _clock) = orchestrator(MemoryStorage::new());
        let outcome = orch.accept("https://example.com");
        let AcceptOutcome::Recorded(result) = outcome else {
            panic!("expected Recorded");
        };
        assert_eq!(result.kind, PayloadKind::Url);
        assert_eq!(orch.active(), Some(&result));
        assert_eq!(orch.history().len(), 1);
    }

    #[test]
    fn test_scan_during_cooldown_is_dropped() {
        let (mut orch, clock) = orchestrator(MemoryStorage::new());
        orch.accept("first");
        let active = orch.active().cloned();

        clock.advance(Duration::from_millis(500));
        assert_eq!(orch.accept("second"), AcceptOutcome::Dropped);
        assert_eq!(orch.history().len(), 1);
        assert_eq!(orch.active().cloned(), active);
    }

    #[test]
    fn test_cooldown_expires() {
        let (mut orch, clock) = orchestrator(MemoryStorage::new());
        orch.accept("first");
        assert!(orch.is_cooling_down());

        clock.advance(DEFAULT_COOLDOWN);
        assert_eq!(orch.phase(), ScanPhase::Idle);
        assert!(matches!(orch.accept("second"), AcceptOutcome::Recorded(_)));
        assert_eq!(orch.history().len(), 2);
    }

    #[test]
    fn test_repeat_of_head_surfaces_without_insert() {
        let (mut orch, clock) = orchestrator(MemoryStorage::new());
        let AcceptOutcome::Recorded(first) = orch.accept("same") else {
            panic!("expected Recorded");
        };
        orch.dismiss();
        clock.advance(Duration::from_secs(3));

        let outcome = orch.accept("same");
        assert_eq!(outcome, AcceptOutcome::Repeated(first.clone()));
        assert_eq!(orch.active(), Some(&first));
        assert_eq!(orch.history().len(), 1);
        // A repeat still starts a cooldown.
        assert!(orch.is_cooling_down());
    }

    #[test]
    fn test_history_head_b_then_scan_a() {
        let seed = vec![
            ScanResult::new("B", PayloadKind::Text, Utc::now()),
            ScanResult::new("A", PayloadKind::Text, Utc::now()),
        ];
        let (mut orch, _clock) = orchestrator(MemoryStorage::with_history(seed));
        assert!(matches!(orch.accept("A"), AcceptOutcome::Recorded(_)));
        let contents: Vec<_> = orch
            .history()
            .entries()
            .iter()
            .map(|e| e.content.as_str())
            .collect();
        assert_eq!(contents, vec!["A", "B", "A"]);
    }

    #[test]
    fn test_haptics_pulse_on_accept_only() {
        let count = Rc::new(Cell::new(0));
        let (orch, clock) = orchestrator(MemoryStorage::new());
        let mut orch = orch.with_haptics(Box::new(CountingHaptics(count.clone())));

        orch.accept("x");
        orch.accept("y");
        assert_eq!(count.get(), 1);
        clock.advance(DEFAULT_COOLDOWN);
        orch.accept("x");
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_missing_haptics_is_harmless() {
        let (mut orch, _clock) = orchestrator(MemoryStorage::new());
        assert!(matches!(orch.accept("x"), AcceptOutcome::Recorded(_)));
    }

    #[test]
    fn test_timestamp_comes_from_clock() {
        let (mut orch, clock) = orchestrator(MemoryStorage::new());
        clock.advance(Duration::from_secs(42));
        let outcome = orch.accept("t");
        assert_eq!(outcome.result().unwrap().timestamp.timestamp(), 42);
    }

    #[test]
    fn test_select_and_clear() {
        let (mut orch, _clock) = orchestrator(MemoryStorage::new());
        orch.accept("one");
        let id = orch.history().head().unwrap().id.clone();
        orch.dismiss();
        assert!(orch.active().is_none());
        assert_eq!(orch.select(&id).map(|r| r.content.as_str()), Some("one"));
        assert!(orch.select("nope").is_none());

        orch.clear_history();
        assert!(orch.history().is_empty());
    }
}
