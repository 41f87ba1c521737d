//! GitLab workspace helpers.
//!
//! This crate keeps a workstation's fleet of GitLab repositories current by:
//! - Listing the projects the operator is a member of
//! - Cloning missing repositories and fetching existing ones in parallel
//! - Fast-forwarding the checked-out branch and the integration branch
//!   without switching the working tree
//!
//! It also lists branches across the workspace and launches service
//! projects in parallel.

pub mod branches;
pub mod cli;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod git;
pub mod hosting;
pub mod logging;
pub mod output;
pub mod runner;
pub mod sync;
