pub mod bugzilla;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod rpc;
pub mod session;
