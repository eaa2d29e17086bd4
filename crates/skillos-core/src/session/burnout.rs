//! Burnout estimator.
//!
//! [`estimate`] is a pure function from window inputs to a leveled state.
//! [`BurnoutMonitor`] holds the last state and only lets the level fall on
//! an explicit acknowledgment (a completed break).

use std::collections::BTreeSet;

use chrono::Duration;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BurnoutLevel {
    Normal,
    Warning,
    Critical,
}

impl BurnoutLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            BurnoutLevel::Normal => "normal",
            BurnoutLevel::Warning => "warning",
            BurnoutLevel::Critical => "critical",
        }
    }
}

/// Which condition raised the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    ElapsedWarning,
    ElapsedCritical,
    SkipsWarning,
    SkipsCritical,
}

impl TriggerReason {
    pub fn level(self) -> BurnoutLevel {
        match self {
            TriggerReason::ElapsedWarning | TriggerReason::SkipsWarning => BurnoutLevel::Warning,
            TriggerReason::ElapsedCritical | TriggerReason::SkipsCritical => {
                BurnoutLevel::Critical
            }
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            TriggerReason::ElapsedWarning => "Extended session without a completed break",
            TriggerReason::ElapsedCritical => "Continuous uptime past the safe limit",
            TriggerReason::SkipsWarning => "Several breaks skipped recently",
            TriggerReason::SkipsCritical => "Repeatedly skipping breaks",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnoutState {
    pub level: BurnoutLevel,
    pub triggers: BTreeSet<TriggerReason>,
}

impl Default for BurnoutState {
    fn default() -> Self {
        Self {
            level: BurnoutLevel::Normal,
            triggers: BTreeSet::new(),
        }
    }
}

/// Estimator thresholds. Requires `warning_after < critical_after` and
/// `warning_skips < critical_skips`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnoutThresholds {
    /// T1, active seconds.
    pub warning_after_secs: u64,
    /// T2, active seconds.
    pub critical_after_secs: u64,
    /// S1
    pub warning_skips: u32,
    /// S2
    pub critical_skips: u32,
    pub skip_window_secs: u64,
}

impl BurnoutThresholds {
    pub fn skip_window(&self) -> Duration {
        i64::try_from(self.skip_window_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }
}

impl Default for BurnoutThresholds {
    fn default() -> Self {
        Self {
            warning_after_secs: 90 * 60,
            critical_after_secs: 180 * 60,
            warning_skips: 2,
            critical_skips: 4,
            skip_window_secs: 120 * 60,
        }
    }
}

/// Window inputs for one estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnoutInputs {
    /// Active seconds since the last completed break.
    pub active_secs: u64,
    pub skipped_in_window: u32,
}

pub fn estimate(inputs: BurnoutInputs, thresholds: &BurnoutThresholds) -> BurnoutState {
    let mut triggers = BTreeSet::new();

    if inputs.active_secs >= thresholds.critical_after_secs {
        triggers.insert(TriggerReason::ElapsedCritical);
    } else if inputs.active_secs >= thresholds.warning_after_secs {
        triggers.insert(TriggerReason::ElapsedWarning);
    }

    if inputs.skipped_in_window >= thresholds.critical_skips {
        triggers.insert(TriggerReason::SkipsCritical);
    } else if inputs.skipped_in_window >= thresholds.warning_skips {
        triggers.insert(TriggerReason::SkipsWarning);
    }

    let level = triggers
        .iter()
        .map(|t| t.level())
        .max()
        .unwrap_or(BurnoutLevel::Normal);

    BurnoutState { level, triggers }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnoutMonitor {
    thresholds: BurnoutThresholds,
    state: BurnoutState,
}

impl BurnoutMonitor {
    pub fn new(thresholds: BurnoutThresholds) -> Self {
        Self {
            thresholds,
            state: BurnoutState::default(),
        }
    }

    pub fn thresholds(&self) -> &BurnoutThresholds {
        &self.thresholds
    }

    pub fn state(&self) -> &BurnoutState {
        &self.state
    }

    pub fn level(&self) -> BurnoutLevel {
        self.state.level
    }

    /// Recompute from `inputs`. Returns `(from, to)` when the level moved.
    ///
    /// Without acknowledgment a lower computed level is ignored and the held
    /// state is kept as-is.
    pub fn update(
        &mut self,
        inputs: BurnoutInputs,
        acknowledged: bool,
    ) -> Option<(BurnoutLevel, BurnoutLevel)> {
        let next = estimate(inputs, &self.thresholds);
        if !acknowledged && next.level < self.state.level {
            return None;
        }
        let from = self.state.level;
        self.state = next;
        if from == self.state.level {
            return None;
        }
        tracing::debug!(
            from = from.as_str(),
            to = self.state.level.as_str(),
            "burnout level changed"
        );
        Some((from, self.state.level))
    }
}
