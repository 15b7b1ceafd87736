use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::constants::events;
use crate::models::{Slot, WorkflowInvocation};
use crate::orchestration::state_merger::WorkflowState;

/// Lifecycle event of a workflow invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// Kickoff accepted and polling started
    WorkflowLaunched { invocation: WorkflowInvocation },
    /// A tick produced a new merged state
    StateUpdated { state: WorkflowState },
    /// Every tracked job is ready; published once per invocation
    WorkflowCompleted {
        state: WorkflowState,
        completed_at: DateTime<Utc>,
    },
}

impl OrchestratorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::WorkflowLaunched { .. } => events::WORKFLOW_LAUNCHED,
            Self::StateUpdated { .. } => events::WORKFLOW_STATE_UPDATED,
            Self::WorkflowCompleted { .. } => events::WORKFLOW_COMPLETED,
        }
    }

    pub fn slot(&self) -> Slot {
        match self {
            Self::WorkflowLaunched { invocation } => invocation.slot(),
            Self::StateUpdated { state } | Self::WorkflowCompleted { state, .. } => state.slot,
        }
    }
}

/// Broadcast registry for orchestrator events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<OrchestratorEvent>,
}

impl EventPublisher {
    /// Create a publisher with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: OrchestratorEvent) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => trace!(event = name, receivers, "Event published"),
            Err(broadcast::error::SendError(_)) => trace!(event = name, "Event dropped: no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobId, Stage, TrackedStage, WorkflowVariant};

    fn invocation() -> WorkflowInvocation {
        WorkflowInvocation::new(
            WorkflowVariant::LoadOnly,
            vec![TrackedStage::new(Stage::Load, JobId::from("t9"))],
            "load".to_string(),
        )
    }

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let publisher = EventPublisher::new(8);
        let mut rx = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 1);

        publisher.publish(OrchestratorEvent::WorkflowLaunched {
            invocation: invocation(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), events::WORKFLOW_LAUNCHED);
        assert_eq!(event.slot(), Slot::TransformLoad);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let publisher = EventPublisher::default();
        publisher.publish(OrchestratorEvent::WorkflowLaunched {
            invocation: invocation(),
        });
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let value = serde_json::to_value(OrchestratorEvent::WorkflowLaunched {
            invocation: invocation(),
        })
        .unwrap();
        assert_eq!(value["event"], "workflow_launched");
        assert_eq!(value["invocation"]["variant"], "load_only");
    }
}
