//! Error types for appliance provisioning

use std::time::Duration;

use bastion_core::provider::ProviderError;
use thiserror::Error;

/// Errors raised while provisioning or inspecting an appliance
#[derive(Debug, Error)]
pub enum ApplianceError {
    /// Transport or API failure reported by the order or portal client
    #[error("API error during {operation}: {message}")]
    Api { operation: String, message: String },

    /// The order API reported a terminal failure for an order
    #[error("Order {order_id} failed: {message}")]
    OrderFailed { order_id: String, message: String },

    /// The portal API reported a terminal failure for an interface update
    #[error("Interface update process {process_id} ended with status {status}")]
    ProcessFailed { process_id: String, status: String },

    /// Snapshot diff produced the wrong number of new records
    #[error(
        "Expected {expected} new device(s) but found {found} (inventory before: {before}, after: {after})"
    )]
    Resolution {
        expected: usize,
        found: usize,
        before: usize,
        after: usize,
    },

    /// Before and after snapshots hold the same number of records
    #[error("No new device found (inventory before: {before}, after: {after})")]
    NoNewIdentity { before: usize, after: usize },

    /// The two new HA records could not be bound to host 1 and host 2
    #[error("Cannot bind HA pair: {0}")]
    AmbiguousPair(String),

    /// Polling gave up before reaching a target state; the remote work may still be running
    #[error("Timed out after {elapsed:?} waiting for {operation} (last state: {})", .last_state.as_deref().unwrap_or("none"))]
    Timeout {
        operation: String,
        last_state: Option<String>,
        elapsed: Duration,
    },

    /// Waiting was cancelled by the caller
    #[error("Cancelled while waiting for {operation}")]
    Cancelled { operation: String },

    /// A port identifier did not have the expected `portN` shape
    #[error("Invalid port id {port_id:?}: {reason}")]
    PortParse { port_id: String, reason: String },

    /// A port identifier mapped outside the slot range of the device
    #[error("Port {port_id} maps to slot {index}, outside 0..{slots}")]
    PortIndexOutOfRange {
        port_id: String,
        index: i64,
        slots: usize,
    },

    /// Two observed interfaces mapped to the same slot
    #[error("Ports {first} and {second} both map to slot {index}")]
    PortIndexCollision {
        index: usize,
        first: String,
        second: String,
    },

    /// An inventory row could not be decoded
    #[error("Cannot decode inventory row (schema v{version}): {reason}")]
    RowDecode { version: u32, reason: String },

    /// A device is not present where it was expected
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration or desired state
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The device was created but a later step of the create failed
    #[error("Device {identity} was created but could not be configured: {source}")]
    Partial {
        identity: String,
        #[source]
        source: Box<ApplianceError>,
    },

    /// The device category is not usable for this appliance variant
    #[error("Device category {category} is not supported by {variant}")]
    UnsupportedCategory { variant: String, category: String },
}

impl ApplianceError {
    /// Create an API error for the given operation
    pub fn api(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Api {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether the remote operation may still be running server-side
    pub fn may_be_in_flight(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Cancelled { .. })
    }
}

impl From<ApplianceError> for ProviderError {
    fn from(e: ApplianceError) -> Self {
        ProviderError::new(e.to_string()).with_cause(e)
    }
}

/// Result type for appliance operations
pub type ApplianceResult<T> = Result<T, ApplianceError>;
