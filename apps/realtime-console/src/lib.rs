// Library exports for testing
// The binary (main.rs) imports these as well

pub mod app;
pub mod credentials;
pub mod error;
pub mod logger;
pub mod sink;

#[cfg(test)]
mod tests;

/// Directory under the platform data dir holding the console's logs.
pub const APP_DIR_NAME: &str = "realtime-console";
