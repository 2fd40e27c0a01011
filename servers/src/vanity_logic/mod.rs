pub mod config;
pub mod console;
pub mod logger;
pub mod sink;
