//! Time-to-decision operator
//!
//! Single `pose` channel; every pose sample yields one deadline at the same
//! timestamp.

use contracts::{ChannelId, EngineConfig, LogicalTimestamp, Payload, TimeToDecision};
use sync_engine::{Correlate, CorrelationEngine, SyncError};
use tracing::debug;

use crate::deadline::DeadlineModel;
use crate::OperatorError;

pub const TIME_TO_DECISION: &str = "time_to_decision";

/// Deadline estimator wired as a correlation stage
#[derive(Debug, Clone)]
pub struct TimeToDecisionOperator {
    model: DeadlineModel,
}

impl TimeToDecisionOperator {
    pub fn new(model: DeadlineModel) -> Self {
        Self { model }
    }

    pub fn channels() -> Vec<ChannelId> {
        vec![ChannelId::POSE.into()]
    }

    pub fn into_engine(self, config: &EngineConfig) -> Result<CorrelationEngine<Self>, SyncError> {
        CorrelationEngine::new(config, &Self::channels(), self)
    }

    pub fn model(&self) -> &DeadlineModel {
        &self.model
    }
}

impl Correlate for TimeToDecisionOperator {
    type Input = Payload;
    type Output = Payload;
    type Error = OperatorError;

    fn name(&self) -> &str {
        TIME_TO_DECISION
    }

    fn correlate(
        &mut self,
        timestamp: &LogicalTimestamp,
        inputs: Vec<Payload>,
    ) -> Result<Payload, OperatorError> {
        let [input]: [Payload; 1] = inputs.try_into().map_err(|inputs: Vec<Payload>| {
            OperatorError::InputCount {
                expected: 1,
                found: inputs.len(),
            }
        })?;
        let pose = match input {
            Payload::Pose(pose) => pose,
            other => {
                return Err(OperatorError::unexpected(
                    ChannelId::POSE,
                    "pose",
                    other.kind(),
                ))
            }
        };

        let estimate = self.model.estimate_with_context(&pose, None);
        observability::record_deadline_ms(estimate.deadline_ms, estimate.is_flagged());
        debug!(
            timestamp = %timestamp,
            forward_speed = pose.forward_speed,
            deadline_ms = estimate.deadline_ms,
            "Deadline estimated"
        );

        Ok(Payload::TimeToDecision(TimeToDecision {
            deadline_ms: estimate.deadline_ms,
            flagged: estimate.is_flagged(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Message, VehiclePose};

    fn pose(speed: f64) -> Payload {
        Payload::Pose(VehiclePose {
            forward_speed: speed,
            ..Default::default()
        })
    }

    #[test]
    fn test_emits_deadline_per_pose() {
        let operator = TimeToDecisionOperator::new(DeadlineModel::default());
        let mut engine = operator.into_engine(&EngineConfig::default()).unwrap();

        engine.push_payload("pose", 100.into(), pose(20.0)).unwrap();
        engine.push_watermark("pose", 100.into()).unwrap();

        let output = engine.drain_output();
        assert_eq!(output.len(), 2);
        assert_eq!(
            output[0],
            Message::data(
                100,
                Payload::TimeToDecision(TimeToDecision {
                    deadline_ms: 300.0,
                    flagged: false,
                })
            )
        );
        assert_eq!(output[1], Message::watermark(100));
    }

    #[test]
    fn test_rejects_non_pose_payload() {
        let mut operator = TimeToDecisionOperator::new(DeadlineModel::default());
        let err = operator
            .correlate(&1.into(), vec![Payload::Obstacles(vec![])])
            .unwrap_err();
        assert!(matches!(
            err,
            OperatorError::UnexpectedPayload { found: "obstacles", .. }
        ));
    }

    #[test]
    fn test_flags_negative_deadline() {
        let mut operator = TimeToDecisionOperator::new(DeadlineModel::default());
        let out = operator.correlate(&1.into(), vec![pose(55.0)]).unwrap();
        assert_eq!(
            out,
            Payload::TimeToDecision(TimeToDecision {
                deadline_ms: -50.0,
                flagged: true,
            })
        );
    }
}
