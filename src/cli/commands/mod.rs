pub mod check;
pub mod config;
pub mod synthesize;
pub mod themes;
