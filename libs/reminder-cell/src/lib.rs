pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::reminder_routes;
pub use services::notifier::{ReminderNotifier, WebhookNotifier};
pub use services::reminders::ReminderService;
pub use services::scheduler::ReminderSchedulerService;
