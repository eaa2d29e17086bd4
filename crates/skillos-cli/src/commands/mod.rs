pub mod auth;
pub mod config;
pub mod logs;
pub mod session;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;
