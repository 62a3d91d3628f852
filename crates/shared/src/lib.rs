//! Types shared by the fleet backend and the dashboard client.

pub mod domain;
pub mod error;
pub mod protocol;
