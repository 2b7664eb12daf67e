// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! The narrow seam between the core and the OpenFlow transport.
//!
//! Framing, TLS and connection management live outside the core; the core
//! only ever hands a finished message to a channel. A send failure is
//! reported to the caller, who logs it and keeps the session alive.

#[cfg(any(test, feature = "testing"))]
use std::sync::Mutex;

use net::openflow::OfMessage;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChannelError {
    #[error("control channel to {0} is closed")]
    Closed(String),
}

/// One direction of a control connection (to a tenant controller or to a
/// physical switch).
pub trait ControlChannel: Send + Sync {
    fn send(&self, msg: OfMessage) -> Result<(), ChannelError>;

    /// Human-readable peer identity, for logs.
    fn peer(&self) -> String;
}

/// A channel that keeps everything it is asked to send. Used by tests all
/// over the workspace to observe the messages the core emits.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug, Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<OfMessage>>,
    name: String,
}

#[cfg(any(test, feature = "testing"))]
impl RecordingChannel {
    #[must_use]
    pub fn new(name: &str) -> Self {
        RecordingChannel {
            sent: Mutex::new(Vec::new()),
            name: name.to_string(),
        }
    }

    /// Drain and return everything sent so far.
    pub fn take(&self) -> Vec<OfMessage> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[cfg(any(test, feature = "testing"))]
impl ControlChannel for RecordingChannel {
    fn send(&self, msg: OfMessage) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(msg);
        Ok(())
    }

    fn peer(&self) -> String {
        self.name.clone()
    }
}

/// A channel with no transport behind it yet: messages are logged and
/// discarded. The daemon uses it until a real connection is dialed for
/// the peer.
#[derive(Debug)]
pub struct LoggingChannel {
    name: String,
}

impl LoggingChannel {
    #[must_use]
    pub fn new(name: &str) -> Self {
        LoggingChannel {
            name: name.to_string(),
        }
    }
}

impl ControlChannel for LoggingChannel {
    fn send(&self, msg: OfMessage) -> Result<(), ChannelError> {
        debug!(
            peer = %self.name,
            kind = msg.kind(),
            len = msg.length(),
            "message discarded, no transport attached"
        );
        Ok(())
    }

    fn peer(&self) -> String {
        self.name.clone()
    }
}
