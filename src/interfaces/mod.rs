pub mod notifier;
pub mod scheduler;
pub mod session;
