pub mod init;
pub mod stream;
