use std::path::{Path, PathBuf};

/// Accepted filename suffixes (matched case-sensitively)
pub const ALLOWED_EXTENSIONS: [&str; 2] = ["csv", "CSV"];

/// Check a client-supplied filename against the extension allow-list
///
/// The name must contain a dot and the text after the last dot must be one
/// of `ALLOWED_EXTENSIONS` exactly.
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext))
}

/// Reduce a client-supplied filename to something safe to join onto the upload folder
///
/// Keeps the last path component, turns whitespace runs into `_`, drops
/// anything outside `[A-Za-z0-9._-]` and trims leading/trailing `.` and `_`.
/// Non-ASCII letters are dropped rather than transliterated. The result can
/// be empty.
pub fn secure_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Write an upload to `dir/filename`, creating `dir` if needed
///
/// An existing file with the same name is overwritten.
pub async fn save_upload(dir: &Path, filename: &str, contents: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(filename);
    tokio::fs::write(&path, contents).await?;
    Ok(path)
}
