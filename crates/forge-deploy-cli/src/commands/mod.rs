pub mod config;
pub mod deploy;
pub mod init;
pub mod version;
