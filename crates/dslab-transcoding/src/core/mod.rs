//! Control plane of the transcoding fleet and the simulated datacenter it drives.

pub mod broker;
pub mod config;
pub mod datacenter;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod fabric;
pub mod instance;
pub mod job;
pub mod ledger;
pub mod metrics;
pub mod provisioner;
