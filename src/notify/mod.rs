//! # Push Dispatcher
//!
//! Priorities, recipient channels, target templating, channel notifiers,
//! the per-recipient dispatcher and the admin channel built on top of it.

pub mod admin_channel;
pub mod channel;
pub mod dispatcher;
pub mod messages;
pub mod notifier;
pub mod placeholders;
pub mod priority;
pub mod result;

pub use admin_channel::{AdminChannel, ADMIN_RECIPIENT};
pub use channel::{normalize_plate, ChannelConfig, ChannelKind, Recipient};
pub use dispatcher::{ChannelNotifiers, DispatchOptions, PushDispatcher};
pub use messages::{ComposedMessage, MessageComposer, RestrictionDay, NEXT_DAY_REMINDER_TYPE};
pub use notifier::{AppriseApiNotifier, Notifier, NotifierOutcome, TargetResult, WebhookNotifier};
pub use placeholders::{mask_target, substitute, TargetContext};
pub use priority::{Platform, PushPriority};
pub use result::{ChannelResult, PushHistoryEntry, PushOutcome, DEFAULT_MESSAGE_TYPE};
