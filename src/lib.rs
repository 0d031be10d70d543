//! Patch agent: polls a remote patch catalog, reconciles local and remote
//! version state, and stages updates for a human or installer to apply.

pub mod activity;
pub mod agent;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod patch;
pub mod version;
