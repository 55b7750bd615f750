pub mod clean;
pub mod config;
pub mod fetch;
pub mod naics;
pub mod output;
pub mod process;
