//! Output path derivation.

use lazy_static::lazy_static;
use regex::Regex;

use crate::context::NormalizedContext;

/// Output root used when the configured one sanitizes to nothing.
pub const DEFAULT_OUTPUT_ROOT: &str = "F24";

const UNKNOWN: &str = "unknown";

lazy_static! {
    static ref INVALID_SEGMENT_CHARS: Regex =
        Regex::new(r#"[<>:"\\/|?*\r\n]+"#).expect("segment pattern");
    static ref ROOT_SEPARATORS: Regex = Regex::new(r"[\\/]+").expect("separator pattern");
}

/// Strip characters that are illegal in file names; `.` and `..` become empty.
pub fn sanitize_segment(value: &str) -> String {
    let cleaned = INVALID_SEGMENT_CHARS.replace_all(value, "");
    let cleaned = cleaned.trim();
    if cleaned == "." || cleaned == ".." {
        return String::new();
    }
    cleaned.to_string()
}

pub fn sanitize_path_segment(value: &str, fallback: &str) -> String {
    let sanitized = sanitize_segment(value);
    if sanitized.is_empty() {
        fallback.to_string()
    } else {
        sanitized
    }
}

/// Split on slashes, sanitize each segment and re-join with `/`.
pub fn sanitize_output_root(value: &str) -> String {
    let joined = ROOT_SEPARATORS
        .split(value)
        .map(sanitize_segment)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() {
        DEFAULT_OUTPUT_ROOT.to_string()
    } else {
        joined
    }
}

fn prefix(identifier: &str) -> &str {
    identifier.split('-').next().unwrap_or_default()
}

/// Folder for a capture: identifier prefix before the first hyphen, parcel
/// first, `unknown` when neither is usable.
pub fn derive_folder(parcel_id: &str, project_id: &str) -> String {
    if !prefix(parcel_id).is_empty() {
        return sanitize_path_segment(prefix(parcel_id), UNKNOWN);
    }
    if !project_id.is_empty() {
        let trimmed = match prefix(project_id) {
            "" => project_id,
            head => head,
        };
        return sanitize_path_segment(trimmed, UNKNOWN);
    }
    UNKNOWN.to_string()
}

/// `outputRoot/folder/baseName.png`, relative to the download directory.
pub fn capture_relative_path(context: &NormalizedContext, output_root: &str) -> String {
    let root = sanitize_output_root(output_root);
    let folder = derive_folder(&context.parcel_id, &context.project_id);
    let base = if context.parcel_id.is_empty() {
        &context.project_id
    } else {
        &context.parcel_id
    };
    let base = sanitize_path_segment(base, UNKNOWN);
    format!("{}/{}/{}.png", root, folder, base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment(" a<b>c:d|e?f*g\r\n "), "abcdefg");
        assert_eq!(sanitize_segment(".."), "");
        assert_eq!(sanitize_path_segment("//", "unknown"), "unknown");
    }

    #[test]
    fn test_output_root_normalized() {
        assert_eq!(sanitize_output_root(r"exports\\F24//batch 1/"), "exports/F24/batch 1");
        assert_eq!(sanitize_output_root("../.."), DEFAULT_OUTPUT_ROOT);
        assert_eq!(sanitize_output_root(""), DEFAULT_OUTPUT_ROOT);
    }

    #[test]
    fn test_folder_prefers_parcel_prefix() {
        assert_eq!(derive_folder("F24ABC-1-2", "H12PROJ"), "F24ABC");
        assert_eq!(derive_folder("", "H12PROJ-7"), "H12PROJ");
        assert_eq!(derive_folder("-1", "H12PROJ"), "H12PROJ");
        assert_eq!(derive_folder("", ""), "unknown");
    }

    #[test]
    fn test_project_only_capture_path() {
        let context = NormalizedContext {
            project_id: "H12PROJ".into(),
            ..NormalizedContext::default()
        };
        assert_eq!(capture_relative_path(&context, "out"), "out/H12PROJ/H12PROJ.png");
    }
}
