//! Process exit codes. Part of the CLI contract.

pub const SUCCESS: i32 = 0;
pub const CRAWL_FAILED: i32 = 1; // At least one profile failed to crawl or write
pub const CONFIG_ERROR: i32 = 2; // Invalid configuration or usage
