pub mod common;
pub mod recover;
pub mod subscription;
pub mod updates;
