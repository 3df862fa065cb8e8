//! Subcommand handlers.

pub mod build;
pub mod download;
pub mod list;
pub mod presign;
pub mod resume_point;
pub mod upload;
