//! Out-of-band push message routing.

use crate::error::{Error, Result};
use crate::resp::{PushMessage, Response};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Callback invoked with the payload of a push message.
pub type PushHandler = Box<dyn FnMut(&[Response]) -> Result<()> + Send>;

/// What to do with a push message nobody registered a handler for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushPolicy {
    /// Drop it
    #[default]
    Lenient,
    /// Fail the in-flight command with a push notification error
    Strict,
}

/// Maps push data types to handlers.
///
/// Dispatch runs on the task reading responses, so a slow handler stalls
/// the read path.
#[derive(Default)]
pub struct PushDispatcher {
    handlers: HashMap<String, PushHandler>,
    policy: PushPolicy,
}

impl PushDispatcher {
    pub fn new(policy: PushPolicy) -> Self {
        PushDispatcher {
            handlers: HashMap::new(),
            policy,
        }
    }

    /// Replace the whole handler table.
    pub fn register(&mut self, handlers: HashMap<String, PushHandler>) {
        self.handlers = handlers;
    }

    pub fn is_registered(&self, data_type: &str) -> bool {
        self.handlers.contains_key(data_type)
    }

    pub fn policy(&self) -> PushPolicy {
        self.policy
    }

    pub fn dispatch(&mut self, message: &PushMessage) -> Result<()> {
        match self.handlers.get_mut(&message.data_type) {
            Some(handler) => {
                trace!(data_type = %message.data_type, "Dispatching push message");
                handler(&message.payload)
            }
            None if self.policy == PushPolicy::Strict => Err(Error::PushNotification(format!(
                "no handler registered for push type '{}'",
                message.data_type
            ))),
            None => {
                debug!(data_type = %message.data_type, "Dropping unhandled push message");
                Ok(())
            }
        }
    }
}
