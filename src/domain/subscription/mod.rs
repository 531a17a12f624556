//! Subscription domain types.
//!
//! - `SubscriptionRequest` - one client subscribe action
//! - `ChannelBinding` - topic + filter produced by the channel resolver
//! - `SubscriptionEntry` - a registered subscription and its status

mod binding;
mod entry;
mod request;

pub use binding::{ChannelBinding, FilterFn};
pub use entry::{SubscriptionEntry, SubscriptionStatus};
pub use request::{Arguments, ExecutionContext, SubscriptionRequest};
