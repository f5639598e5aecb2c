//! Reading corpus resources from disk.

use std::path::Path;

use crate::utilities::errors::ResourceError;

/// Read a required text resource.
///
/// A missing file is reported as [`ResourceError::Missing`] so startup can
/// fail with the offending path.
pub fn read_resource(path: &Path) -> Result<String, ResourceError> {
    if !path.exists() {
        return Err(ResourceError::Missing {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path).map_err(|source| ResourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Read resource {} ({} bytes)", path.display(), text.len());
    Ok(text)
}
