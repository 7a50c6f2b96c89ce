//! Command handlers

pub mod check;
pub mod config;
pub mod list;
pub mod page;
pub mod stats;
