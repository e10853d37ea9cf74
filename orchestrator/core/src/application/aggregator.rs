// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Result Aggregator
//!
//! Folds phase results and open checkpoints into one
//! [`OrchestrationResult`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Final status computation
//!
//! | Condition | Status |
//! |-----------|--------|
//! | any checkpoint still open | `AwaitingHumanInput` |
//! | a required phase stopped without output | `Failed` |
//! | otherwise | `Completed` |

use crate::domain::checkpoint::HumanCheckpoint;
use crate::domain::result::{OrchestrationResult, OrchestrationStatus, PhaseResult, PhaseStatus, RunId};
use tracing::debug;

pub struct ResultAggregator;

impl ResultAggregator {
    pub fn aggregate(
        run_id: RunId,
        phases: Vec<PhaseResult>,
        open_checkpoint: Option<HumanCheckpoint>,
    ) -> OrchestrationResult {
        let status = Self::status(&phases, open_checkpoint.as_ref());
        debug!(run_id = %run_id, status = %status, phases = phases.len(), "Aggregated run result");
        OrchestrationResult {
            run_id,
            status,
            phases,
            checkpoint: open_checkpoint,
        }
    }

    fn status(phases: &[PhaseResult], checkpoint: Option<&HumanCheckpoint>) -> OrchestrationStatus {
        if checkpoint.is_some() {
            return OrchestrationStatus::AwaitingHumanInput;
        }
        let unusable = phases.iter().any(|p| {
            p.required && p.output.is_none() && !matches!(p.status, PhaseStatus::Completed)
        });
        if unusable || phases.is_empty() {
            OrchestrationStatus::Failed
        } else {
            OrchestrationStatus::Completed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentName;
    use crate::domain::checkpoint::{ConversationId, ResumptionToken};
    use crate::domain::result::{AbortReason, PhaseDiagnostics, PhaseKind};
    use chrono::Utc;
    use std::time::Duration;

    fn swarm_phase(status: PhaseStatus, output: Option<&str>, required: bool) -> PhaseResult {
        PhaseResult {
            name: "swarm".into(),
            kind: PhaseKind::Swarm,
            required,
            status,
            output: output.map(String::from),
            diagnostics: PhaseDiagnostics::Swarm {
                handoffs: vec![],
                iterations: 1,
                elapsed: Duration::from_millis(5),
                failures: vec![],
                stored_records: vec![],
                unapproved_records: vec![],
            },
        }
    }

    fn checkpoint() -> HumanCheckpoint {
        HumanCheckpoint {
            conversation_id: ConversationId::new(),
            pending_message: "approve?".into(),
            resumption_token: ResumptionToken::generate(),
            requested_by: AgentName::new("critic").unwrap(),
            task_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_open_checkpoint_wins() {
        let result = ResultAggregator::aggregate(
            RunId::new(),
            vec![swarm_phase(PhaseStatus::Suspended, None, true)],
            Some(checkpoint()),
        );
        assert_eq!(result.status, OrchestrationStatus::AwaitingHumanInput);
        assert!(result.checkpoint.is_some());
    }

    #[test]
    fn test_aborted_with_partial_output_completes() {
        let aborted = PhaseStatus::Aborted {
            reason: AbortReason::HandoffLimitExceeded { limit: 2 },
        };
        let result = ResultAggregator::aggregate(
            RunId::new(),
            vec![swarm_phase(aborted, Some("partial plan"), true)],
            None,
        );
        assert_eq!(result.status, OrchestrationStatus::Completed);
        assert_eq!(result.final_output(), Some("partial plan"));
    }

    #[test]
    fn test_required_phase_without_output_fails() {
        let aborted = PhaseStatus::Aborted {
            reason: AbortReason::NoUsableOutput,
        };
        let result = ResultAggregator::aggregate(
            RunId::new(),
            vec![
                swarm_phase(PhaseStatus::Completed, Some("done"), true),
                swarm_phase(aborted.clone(), None, true),
            ],
            None,
        );
        assert_eq!(result.status, OrchestrationStatus::Failed);

        let optional = ResultAggregator::aggregate(
            RunId::new(),
            vec![
                swarm_phase(PhaseStatus::Completed, Some("done"), true),
                swarm_phase(aborted, None, false),
            ],
            None,
        );
        assert_eq!(optional.status, OrchestrationStatus::Completed);
    }
}
