//! Trade/skip arbitration across advisors.
//!
//! Advisors are consulted through an ordered list of [`AdvisorPolicy`]; the
//! first policy that accepts its advisor's prediction is authoritative and
//! its `advice` alone decides trade or skip. Lower-priority advisors may still
//! be queried afterwards, but only for the audit record.

use std::sync::Arc;

use condor_core::{Advice, Advisor, AdvisorFeatures, AdvisorKind, Prediction};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Upper bound on any confidence the arbiter reports.
pub const MAX_CONFIDENCE: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArbiterState {
    AwaitingMl,
    AwaitingBackup,
    ResolvedTrade,
    ResolvedSkip,
    ResolvedNoData,
}

impl ArbiterState {
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(
            self,
            Self::ResolvedTrade | Self::ResolvedSkip | Self::ResolvedNoData
        )
    }
}

/// Rescales 0-100 values to 0-1 and clamps probability to `[0, 1]` and
/// confidence to `[0, 0.95]`. Non-finite values become zero.
#[must_use]
pub fn normalize(mut prediction: Prediction) -> Prediction {
    let unit = |v: f64| {
        if !v.is_finite() {
            0.0
        } else if v > 1.0 {
            v / 100.0
        } else {
            v
        }
    };
    prediction.win_probability = unit(prediction.win_probability).clamp(0.0, 1.0);
    prediction.confidence = unit(prediction.confidence).clamp(0.0, MAX_CONFIDENCE);
    prediction
}

/// What one policy made of its advisor's answer.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyOutcome {
    /// Accepted; this prediction is authoritative.
    Advised(Prediction),
    /// A prediction came back but the policy does not accept it.
    Rejected { prediction: Prediction, reason: String },
    /// No prediction (advisor had no opinion or failed).
    Unavailable(String),
}

/// One advisor plus the rule deciding whether its answer is authoritative.
pub struct AdvisorPolicy {
    advisor: Arc<dyn Advisor>,
    requires_positive_probability: bool,
}

impl AdvisorPolicy {
    /// Primary ML advisor: authoritative only with `win_probability > 0`.
    #[must_use]
    pub fn primary(advisor: Arc<dyn Advisor>) -> Self {
        Self {
            advisor,
            requires_positive_probability: true,
        }
    }

    /// Backup advisor: any prediction is authoritative.
    #[must_use]
    pub fn backup(advisor: Arc<dyn Advisor>) -> Self {
        Self {
            advisor,
            requires_positive_probability: false,
        }
    }

    #[must_use]
    pub fn kind(&self) -> AdvisorKind {
        self.advisor.kind()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.advisor.name()
    }

    fn awaiting_state(&self) -> ArbiterState {
        match self.kind() {
            AdvisorKind::Ml => ArbiterState::AwaitingMl,
            AdvisorKind::Oracle => ArbiterState::AwaitingBackup,
        }
    }

    pub async fn try_advise(&self, features: &AdvisorFeatures) -> PolicyOutcome {
        let kind = self.kind();
        match self.advisor.predict(features).await {
            Ok(Some(raw)) => {
                let prediction = normalize(raw);
                if self.requires_positive_probability && prediction.win_probability <= 0.0 {
                    PolicyOutcome::Rejected {
                        prediction,
                        reason: format!("{kind} returned zero win probability"),
                    }
                } else {
                    PolicyOutcome::Advised(prediction)
                }
            }
            Ok(None) => PolicyOutcome::Unavailable(format!("{kind} returned no prediction")),
            Err(e) => {
                warn!(
                    advisor = %self.name(),
                    kind = %kind,
                    error = %e,
                    "Advisor call failed"
                );
                PolicyOutcome::Unavailable(format!("{kind} advisor error: {e}"))
            }
        }
    }
}

/// Outcome of one arbitration.
#[derive(Debug, Clone, PartialEq)]
pub struct Arbitration {
    /// Final (resolved) state.
    pub state: ArbiterState,
    /// Every state visited, in order.
    pub trace: Vec<ArbiterState>,
    pub prediction_source: Option<AdvisorKind>,
    /// Normalised authoritative prediction.
    pub prediction: Option<Prediction>,
    /// Normalised predictions per advisor, authoritative or not.
    pub ml_prediction: Option<Prediction>,
    pub backup_prediction: Option<Prediction>,
    /// Advisor failures and rejections, for the reasoning trail.
    pub notes: Vec<String>,
}

impl Arbitration {
    fn start() -> Self {
        Self {
            state: ArbiterState::AwaitingMl,
            trace: vec![ArbiterState::AwaitingMl],
            prediction_source: None,
            prediction: None,
            ml_prediction: None,
            backup_prediction: None,
            notes: Vec::new(),
        }
    }

    fn transition(&mut self, next: ArbiterState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Arbiter transition");
            self.state = next;
            self.trace.push(next);
        }
    }

    fn record(&mut self, kind: AdvisorKind, outcome: &PolicyOutcome) {
        let prediction = match outcome {
            PolicyOutcome::Advised(p) => Some(p.clone()),
            PolicyOutcome::Rejected { prediction, reason } => {
                self.notes.push(reason.clone());
                Some(prediction.clone())
            }
            PolicyOutcome::Unavailable(reason) => {
                self.notes.push(reason.clone());
                None
            }
        };
        match kind {
            AdvisorKind::Ml => self.ml_prediction = prediction,
            AdvisorKind::Oracle => self.backup_prediction = prediction,
        }
    }

    #[must_use]
    pub fn advice(&self) -> Option<&Advice> {
        self.prediction.as_ref().map(|p| &p.advice)
    }

    #[must_use]
    pub fn win_probability(&self) -> f64 {
        self.prediction.as_ref().map_or(0.0, |p| p.win_probability)
    }

    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.prediction.as_ref().map_or(0.0, |p| p.confidence)
    }
}

pub struct PredictionArbiter {
    policies: Vec<AdvisorPolicy>,
    consult_for_audit: bool,
}

impl PredictionArbiter {
    /// Policies are consulted in the given order.
    #[must_use]
    pub fn new(policies: Vec<AdvisorPolicy>, consult_for_audit: bool) -> Self {
        Self {
            policies,
            consult_for_audit,
        }
    }

    /// ML first, backup second; either may be absent.
    #[must_use]
    pub fn from_advisors(
        ml: Option<Arc<dyn Advisor>>,
        backup: Option<Arc<dyn Advisor>>,
        consult_for_audit: bool,
    ) -> Self {
        let policies = ml
            .map(AdvisorPolicy::primary)
            .into_iter()
            .chain(backup.map(AdvisorPolicy::backup))
            .collect();
        Self::new(policies, consult_for_audit)
    }

    #[must_use]
    pub fn has_advisors(&self) -> bool {
        !self.policies.is_empty()
    }

    pub async fn arbitrate(&self, features: &AdvisorFeatures) -> Arbitration {
        let mut result = Arbitration::start();
        let mut winner = None;

        for (index, policy) in self.policies.iter().enumerate() {
            result.transition(policy.awaiting_state());
            let outcome = policy.try_advise(features).await;
            result.record(policy.kind(), &outcome);
            if let PolicyOutcome::Advised(prediction) = outcome {
                winner = Some((index, policy.kind(), prediction));
                break;
            }
        }

        let Some((index, kind, prediction)) = winner else {
            if self.policies.is_empty() {
                result.notes.push("no advisors configured".to_string());
            }
            result.transition(ArbiterState::ResolvedNoData);
            return result;
        };

        if self.consult_for_audit {
            for policy in &self.policies[index + 1..] {
                let outcome = policy.try_advise(features).await;
                if let PolicyOutcome::Advised(audit) | PolicyOutcome::Rejected { prediction: audit, .. } =
                    &outcome
                {
                    info!(
                        advisor = %policy.kind(),
                        advice = %audit.advice,
                        win_probability = audit.win_probability,
                        "Audit-only prediction (not used for decision)"
                    );
                }
                result.record(policy.kind(), &outcome);
            }
        }

        for factor in &prediction.top_factors {
            info!(
                advisor = %kind,
                factor = %factor.name,
                impact = factor.impact,
                "Advisor top factor"
            );
        }

        let resolved = if prediction.advice.endorses_trade() {
            ArbiterState::ResolvedTrade
        } else {
            ArbiterState::ResolvedSkip
        };
        result.prediction_source = Some(kind);
        result.prediction = Some(prediction);
        result.transition(resolved);
        result
    }
}
