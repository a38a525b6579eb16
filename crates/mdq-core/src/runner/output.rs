//! Heuristics over the external tool's output lines.
//!
//! The fetch tool is an opaque box; its combined output stream is the only
//! progress signal. A media-looking line counts a file, an error-looking
//! line colors the message, anything else long enough becomes the latest
//! progress message (most recent wins).

use crate::job::Job;

/// Progress messages are clamped to this many characters.
pub const MESSAGE_MAX: usize = 80;
const ERROR_SNIPPET: usize = 60;

/// File-ish markers: the tool's own "Downloading" prefix plus common media
/// extensions appearing anywhere in the line.
const MEDIA_MARKERS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".mp4", ".webm", ".mkv", ".mov", ".m4v", ".mp3",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// A file was (probably) downloaded.
    Media,
    /// The tool skipped something it already has.
    Skip,
    /// Error-flavored output; reported but not terminal by itself.
    Error,
    /// Ordinary progress chatter worth showing.
    Info,
    /// Too short / empty to be useful.
    Noise,
}

pub fn classify_line(line: &str) -> LineClass {
    let line = line.trim();
    if line.is_empty() {
        return LineClass::Noise;
    }
    if line.contains("Downloading") || MEDIA_MARKERS.iter().any(|ext| line.contains(ext)) {
        return LineClass::Media;
    }
    if line.contains("Skipping") {
        return LineClass::Skip;
    }
    if line.to_lowercase().contains("error") {
        return LineClass::Error;
    }
    if line.chars().count() > 10 {
        return LineClass::Info;
    }
    LineClass::Noise
}

/// Applies one output line to the job record. Returns true when the line
/// counted as a downloaded file.
pub fn apply_line(job: &mut Job, line: &str) -> bool {
    match classify_line(line) {
        LineClass::Media => {
            job.files_completed += 1;
            job.message = format!("Downloaded {} files...", job.files_completed);
            true
        }
        LineClass::Skip => {
            job.message = clamp(line.trim(), MESSAGE_MAX);
            false
        }
        LineClass::Error => {
            job.message = format!("Error: {}", clamp(line.trim(), ERROR_SNIPPET));
            false
        }
        LineClass::Info => {
            job.message = clamp(line.trim(), MESSAGE_MAX);
            false
        }
        LineClass::Noise => false,
    }
}

/// Char-boundary-safe prefix of at most `max` characters.
pub fn clamp(line: &str, max: usize) -> String {
    if line.chars().count() <= max {
        line.to_string()
    } else {
        line.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Platform;

    fn job() -> Job {
        Job::new(1, "someuser".to_string(), Platform::Instagram, None, None)
    }

    #[test]
    fn media_lines_count_files() {
        assert_eq!(classify_line("instagram/someuser/2024_001.jpg"), LineClass::Media);
        assert_eq!(classify_line("Downloading story 3 of 7"), LineClass::Media);
        assert_eq!(classify_line("clip.mp4"), LineClass::Media);

        let mut j = job();
        assert!(apply_line(&mut j, "a.jpg"));
        assert!(apply_line(&mut j, "b.mp4"));
        assert_eq!(j.files_completed, 2);
        assert_eq!(j.message, "Downloaded 2 files...");
    }

    #[test]
    fn skip_lines_update_message_only() {
        let mut j = job();
        assert!(!apply_line(&mut j, "Skipping post 1234 (archived)"));
        assert_eq!(j.files_completed, 0);
        assert!(j.message.starts_with("Skipping"));
    }

    #[test]
    fn error_lines_flavor_the_message_without_failing() {
        let mut j = job();
        assert!(!apply_line(&mut j, "[warning] HTTP Error 429: rate limited"));
        assert_eq!(j.files_completed, 0);
        assert!(j.message.starts_with("Error: "));
    }

    #[test]
    fn short_noise_is_ignored() {
        let mut j = job();
        let before = j.message.clone();
        assert!(!apply_line(&mut j, "ok"));
        assert!(!apply_line(&mut j, "   "));
        assert_eq!(j.message, before);
    }

    #[test]
    fn long_info_lines_become_the_message_most_recent_wins() {
        let mut j = job();
        apply_line(&mut j, "[instagram] fetching user metadata");
        apply_line(&mut j, "[instagram] scanning highlight reels");
        assert_eq!(j.message, "[instagram] scanning highlight reels");
    }

    #[test]
    fn messages_are_clamped() {
        let mut j = job();
        let long = "x".repeat(300);
        apply_line(&mut j, &long);
        assert_eq!(j.message.chars().count(), MESSAGE_MAX);
    }

    #[test]
    fn clamp_respects_multibyte_chars() {
        let s = "é".repeat(100);
        let clamped = clamp(&s, 80);
        assert_eq!(clamped.chars().count(), 80);
    }
}
