//! Provisioning-state resolver: turns customer and order trigger messages
//! into groups, drives, folder trees and teams on the remote collaboration
//! platform, recording progress so every message can be replayed safely.

pub mod app;
pub mod config;
pub mod provisioning;
pub mod queue;
pub mod remote;
pub mod shared;
pub mod store;
