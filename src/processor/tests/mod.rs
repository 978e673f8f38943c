//! Test modules for delivery processors

mod batch_defaults;
