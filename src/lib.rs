pub mod app;
pub mod core;
pub mod notifications;
pub mod processor;
pub mod queue;
pub mod recovery;
