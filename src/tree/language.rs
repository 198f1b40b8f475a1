//! Editor language detection from file extensions.

use crate::tree::identity::RepoPath;

/// Fallback language for unknown extensions.
pub const PLAINTEXT: &str = "plaintext";

/// Language id the editor uses for a file path.
pub fn detect_language(path: &RepoPath) -> &'static str {
    let Some(ext) = path.extension() else {
        return PLAINTEXT;
    };
    match ext.to_ascii_lowercase().as_str() {
        "js" | "mjs" | "cjs" => "javascript",
        "ts" | "mts" | "cts" => "typescript",
        "jsx" => "jsx",
        "tsx" => "tsx",
        "html" | "htm" => "html",
        "css" => "css",
        "json" => "json",
        "md" | "markdown" => "markdown",
        "py" => "python",
        "rs" => "rust",
        "sql" => "sql",
        "xml" | "svg" => "xml",
        _ => PLAINTEXT,
    }
}
