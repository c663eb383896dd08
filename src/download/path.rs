//! Deterministic artifact paths.

use std::path::{Path, PathBuf};

use crate::store::Paper;

/// Longest sanitized title kept in a file name, in UTF-8 bytes.
///
/// Leaves room for the id prefix and the `.pdf.part` suffix under the
/// common 255-byte file name limit.
pub const MAX_TITLE_BYTES: usize = 200;

const ILLEGAL_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replaces filesystem-illegal characters with `_` and truncates to
/// [`MAX_TITLE_BYTES`] on a character boundary.
///
/// # Examples
///
/// ```
/// use paper_harvest::download::sanitize_title;
///
/// assert_eq!(sanitize_title("A/B: Testing?"), "A_B_ Testing_");
/// ```
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    let mut cleaned = String::with_capacity(title.len().min(MAX_TITLE_BYTES));
    for c in title.chars() {
        let c = if ILLEGAL_CHARS.contains(&c) || c.is_control() {
            '_'
        } else {
            c
        };
        if cleaned.len() + c.len_utf8() > MAX_TITLE_BYTES {
            break;
        }
        cleaned.push(c);
    }
    cleaned.trim().to_string()
}

/// `<base>/<conference>/<year>/<id>_<title>.pdf` for a paper.
///
/// Papers without a year land in an `unknown` year directory.
#[must_use]
pub fn artifact_path(base: &Path, paper: &Paper) -> PathBuf {
    let year = paper
        .year
        .map_or_else(|| "unknown".to_string(), |year| year.to_string());
    base.join(sanitize_title(&paper.conference))
        .join(year)
        .join(format!("{}_{}.pdf", paper.id, sanitize_title(&paper.title)))
}

/// Temporary path the body streams into before the final rename.
#[must_use]
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}
