pub mod notifier;

pub use notifier::{DeliveryError, NotificationEvent, NotificationKind, Notifier, Recipient};
