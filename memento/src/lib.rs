//! Session-scoped secret custodian: cache a prompted secret in the kernel keyring and deliver it
//! to a freshly spawned child without the secret ever touching the child's argv, environment, or
//! disk.

pub mod challenge;
pub mod cli;
pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod splice;
pub mod store;
pub mod terminal;
