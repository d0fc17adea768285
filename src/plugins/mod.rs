pub mod notifiers;
pub mod traits;

pub use notifiers::{ConsoleNotifier, EmailNotifier};
pub use traits::{NotificationEvent, Notifier, Recipient};
