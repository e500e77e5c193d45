//! Recording broker double for testing.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::ports::{BrokerMessage, BrokerPublisher};

/// Broker double that records every send attempt.
///
/// Failures are scripted: each queued error fails exactly one publish call,
/// in order, after which publishes succeed. The failed attempt is still
/// recorded, matching how a real broker sees a send it rejected.
#[derive(Default)]
pub struct RecordingBroker {
    attempts: Mutex<Vec<BrokerMessage>>,
    scripted_failures: Mutex<VecDeque<DomainError>>,
}

impl RecordingBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an error for the next unscripted publish call.
    pub fn fail_next_with(&self, error: DomainError) {
        self.scripted_failures
            .lock()
            .expect("failure script poisoned")
            .push_back(error);
    }

    /// Every send attempt, including rejected ones.
    pub fn attempts(&self) -> Vec<BrokerMessage> {
        self.attempts.lock().expect("attempts poisoned").clone()
    }

    /// Number of send attempts.
    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().expect("attempts poisoned").len()
    }

    /// Attempts for one message id.
    pub fn attempts_for(&self, message_id: uuid::Uuid) -> Vec<BrokerMessage> {
        self.attempts()
            .into_iter()
            .filter(|m| m.message_id == message_id)
            .collect()
    }
}

#[async_trait]
impl BrokerPublisher for RecordingBroker {
    async fn publish(&self, message: BrokerMessage) -> Result<(), DomainError> {
        self.attempts
            .lock()
            .expect("attempts poisoned")
            .push(message);

        let scripted = self
            .scripted_failures
            .lock()
            .expect("failure script poisoned")
            .pop_front();

        match scripted {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
