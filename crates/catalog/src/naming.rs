//! Rules the upload handler applies before a file reaches the catalog:
//! which installers are accepted and what they are called on disk.

/// Per-file upload cap (10 GiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024 * 1024;

pub const ALLOWED_EXTENSIONS: [&str; 5] = [".exe", ".rar", ".AppImage", ".deb", ".rpm"];

pub fn is_allowed_extension(original_name: &str) -> bool {
    let lower = original_name.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&ext.to_ascii_lowercase()))
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_` and strip leading/trailing dots,
/// so the result is always a plain single path component (or empty).
pub fn sanitize_component(s: &str) -> String {
    let mapped: String = s
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    mapped.trim_matches('.').to_string()
}

/// `<basename>-<version>-<timestamp><ext>`, e.g. `Setup-1.2.3-1712345678901.exe`.
pub fn stored_file_name(original: &str, version: &str, timestamp_ms: i64) -> String {
    let name = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(original);
    let (stem, ext) = split_extension(name);

    let mut out = sanitize_component(stem);
    if out.is_empty() {
        out.push_str("file");
    }
    let version = sanitize_component(version);
    if !version.is_empty() {
        out.push('-');
        out.push_str(&version);
    }
    out.push('-');
    out.push_str(&timestamp_ms.to_string());

    let ext = sanitize_component(ext);
    if !ext.is_empty() {
        out.push('.');
        out.push_str(&ext);
    }
    out
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) if i > 0 => (&name[..i], &name[i + 1..]),
        _ => (name, ""),
    }
}
