use std::path::Path;
use tower_http::services::ServeDir;

/// Serves stored uploads as `<category>/<stored-name>` below the storage root.
///
/// Content type comes from the file extension. Directory requests never fall
/// back to an index file, so nothing under the root can be listed.
pub fn uploads_service(root: &Path) -> ServeDir {
    ServeDir::new(root).append_index_html_on_directories(false)
}

/// Static front page and its assets.
pub fn public_service(public_dir: &Path) -> ServeDir {
    ServeDir::new(public_dir)
}
