use std::path::PathBuf;

use directories::ProjectDirs;

const QUALIFIER: &str = "gh";
const ORGANIZATION: &str = "stitchcraft";
const APPLICATION: &str = "stitchcraft";

/// Directory holding the local database. Created on first use.
///
/// Falls back to `./data` when the platform has no home directory.
pub fn asset_dir() -> PathBuf {
    let path = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"));

    if !path.exists() {
        if let Err(e) = std::fs::create_dir_all(&path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to create asset directory");
        }
    }

    path
}

/// Default SQLite connection string inside [`asset_dir`].
pub fn default_database_url() -> String {
    format!("sqlite://{}", asset_dir().join("stitchcraft.db").display())
}
