//! Destination directory resolution and filename sanitization.

use std::path::{Path, PathBuf};

use crate::job::Job;

/// Resolves a job's output directory under `download_root`.
///
/// An explicit folder override wins; otherwise `<root>/<platform>/<subject>`.
/// Every path component is sanitized, so a coomer "service/user" subject
/// nests one level deeper instead of escaping the root.
pub fn resolve_dest(download_root: &Path, job: &Job) -> PathBuf {
    if let Some(folder) = &job.folder {
        let mut dest = download_root.to_path_buf();
        for part in folder.split('/').filter(|p| !p.is_empty()) {
            dest.push(sanitize_filename(part));
        }
        return dest;
    }
    let mut dest = download_root.join(job.platform.as_str());
    for part in job.subject.split('/').filter(|p| !p.is_empty()) {
        dest.push(sanitize_filename(part));
    }
    dest
}

/// Sanitizes a candidate filename for safe use on Linux.
///
/// - Replaces NUL, `/`, `\`, and control characters with `_`
/// - Trims leading/trailing spaces and dots
/// - Collapses consecutive underscores
/// - Limits length to 255 bytes (Linux NAME_MAX)
pub fn sanitize_filename(name: &str) -> String {
    const NAME_MAX: usize = 255;

    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let replacement = if c == '\0' || c == '/' || c == '\\' || c.is_control() {
            '_'
        } else {
            c
        };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.' || c == '_');

    if trimmed.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].to_string()
    } else {
        trimmed.to_string()
    }
}
