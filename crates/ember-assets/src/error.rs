//! Asset error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset root must be an absolute path: {}", .0.display())]
    NotAbsolute(PathBuf),
}
