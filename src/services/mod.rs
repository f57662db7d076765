pub mod handlers;
pub mod notifier;
pub mod response;
