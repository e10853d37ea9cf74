// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus - Pub/Sub for orchestration events
//
// In-memory fan-out over a tokio broadcast channel. Observers (CLI progress
// output, tests) subscribe read-only; a run never waits on a subscriber.
// Events published with no subscriber attached are dropped.

use crate::domain::events::{RunEvent, SwarmEvent, TaskEvent};
use crate::domain::result::RunId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified event type carried on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestrationEvent {
    Run(RunEvent),
    Task(TaskEvent),
    Swarm(SwarmEvent),
}

impl OrchestrationEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            OrchestrationEvent::Run(e) => e.run_id(),
            OrchestrationEvent::Task(e) => e.run_id(),
            OrchestrationEvent::Swarm(e) => e.run_id(),
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<OrchestrationEvent>>,
}

impl EventBus {
    /// Capacity bounds how many events a slow receiver may fall behind
    /// before it starts losing the oldest ones.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_run_event(&self, event: RunEvent) {
        self.publish(OrchestrationEvent::Run(event));
    }

    pub fn publish_task_event(&self, event: TaskEvent) {
        self.publish(OrchestrationEvent::Task(event));
    }

    pub fn publish_swarm_event(&self, event: SwarmEvent) {
        self.publish(OrchestrationEvent::Swarm(event));
    }

    fn publish(&self, event: OrchestrationEvent) {
        debug!("Publishing event: {:?}", event);
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to the events of a single run.
    pub fn subscribe_run(&self, run_id: RunId) -> RunEventReceiver {
        RunEventReceiver {
            receiver: self.sender.subscribe(),
            run_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<OrchestrationEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<OrchestrationEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    pub fn try_recv(&mut self) -> Result<OrchestrationEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one run
pub struct RunEventReceiver {
    receiver: broadcast::Receiver<OrchestrationEvent>,
    run_id: RunId,
}

impl RunEventReceiver {
    pub async fn recv(&mut self) -> Result<OrchestrationEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.run_id() == self.run_id {
                return Ok(event);
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
