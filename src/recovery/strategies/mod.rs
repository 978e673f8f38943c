//! Built-in recovery strategies

pub mod connection;
pub mod network;

pub use connection::ConnectionRecoveryStrategy;
pub use network::NetworkRecoveryStrategy;
