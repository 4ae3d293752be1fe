//! Notification Dispatch
//!
//! Fans an issued alert out across configured channels, records each
//! outcome independently, and attaches a static response plan.

mod channel;
mod dispatcher;
mod plan;

pub use channel::{
    AlertMessage, EmailGatewayChannel, NotificationChannel, WebhookChannel,
};
pub use dispatcher::{ChannelOutcome, DispatchReport, Dispatcher, NotifyConfig};
pub use plan::ResponsePlan;

use thiserror::Error;

/// Delivery failure for a single channel attempt
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("HTTP status {0}")]
    Http(u16),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Send timed out after {0} ms")]
    Timeout(u64),
    #[error("Channel not configured: {0}")]
    NotConfigured(String),
}
