//! CLI command implementations
//!
//! This module contains the implementation of all CLI subcommands.

pub mod cidr;
pub mod config;
pub mod routes;
