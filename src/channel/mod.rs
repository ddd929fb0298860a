//! Event channel module
//!
//! Relays events from producers that must never block (platform
//! callbacks) to consumers that read at their own pace.

mod relay;

pub use relay::{channel, channel_on, ChannelClosed, EventReceiver, EventSender, EventTrigger, TryRecvError};
