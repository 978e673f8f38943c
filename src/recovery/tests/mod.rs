//! Test modules for fault recovery

mod retry_scenarios;
