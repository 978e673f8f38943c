//! Test modules for the queue system
//!
//! Tests are organized by functional area for better maintainability.
