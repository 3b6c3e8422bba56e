pub mod import;
pub mod init;
