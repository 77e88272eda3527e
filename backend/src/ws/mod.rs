pub mod hub;
pub mod messages;
pub mod socket;

pub use hub::{NotificationHub, Notifier};
pub use socket::ws_handler;
