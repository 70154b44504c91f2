pub mod backend;
pub mod kopia;
pub mod s3;

pub use backend::Backend;
pub use kopia::{CommandExecutor, KopiaBackend, KopiaConfig, ProcessExecutor};
pub use s3::{ObjectLister, S3Backend, S3Config};
