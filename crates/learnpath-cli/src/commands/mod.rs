pub mod compare;
pub mod complete;
pub mod init;
pub mod path;
pub mod quiz;
pub mod report;
pub mod review;
pub mod validate;
pub mod workspace;
