//! Delivery processors
//!
//! A [`DeliveryProcessor`] performs the side-effecting part of the pipeline:
//! it receives queued messages by reference, delivers them and reports a
//! [`ProcessingResult`] per message. The queue manager routes each result to
//! completion, a delayed retry or the dead-letter area.
//!
//! [`DeliveryProcessor`]: api::DeliveryProcessor
//! [`ProcessingResult`]: api::ProcessingResult

pub(crate) mod error;
pub(crate) mod http;
pub(crate) mod result;
pub(crate) mod traits;

pub mod api;

#[cfg(test)]
mod tests;
