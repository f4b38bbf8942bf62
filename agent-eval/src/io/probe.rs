//! Filesystem-backed path existence checks.

use std::path::Path;

use crate::core::types::PathProbe;

#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl PathProbe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}
