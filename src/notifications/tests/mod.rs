//! Test modules for the notification system

mod event_flow;
