use std::path::{Path, PathBuf};

use regex::Regex;

/// Longest file stem kept after sanitizing.
pub const MAX_STEM_LEN: usize = 150;

/// Pull the 11-character video ID out of a YouTube URL, if there is one.
pub fn extract_video_id(url: &str) -> Option<String> {
    let re = Regex::new(
        r"(?:youtube\.com/(?:watch\?(?:.*&)?v=|embed/|shorts/|live/)|youtu\.be/)([A-Za-z0-9_-]{11})",
    )
    .ok()?;
    re.captures(url).map(|caps| caps[1].to_string())
}

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    let stripped: String = filename
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_control())
        .collect();

    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c == '.' || c == ' ');

    let truncated: String = trimmed.chars().take(MAX_STEM_LEN).collect();
    let truncated = truncated.trim_end_matches(|c: char| c == '.' || c == ' ');

    if truncated.is_empty() {
        "audio".to_string()
    } else {
        truncated.to_string()
    }
}

/// Destination names to try in order: `stem.ext`, `stem (1).ext`, `stem (2).ext`, ...
pub fn candidate_paths<'a>(
    dir: &'a Path,
    stem: &'a str,
    ext: &'a str,
) -> impl Iterator<Item = PathBuf> + 'a {
    (0u32..).map(move |n| {
        if n == 0 {
            dir.join(format!("{}.{}", stem, ext))
        } else {
            dir.join(format!("{} ({}).{}", stem, n, ext))
        }
    })
}

/// Human-readable byte count in binary units.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }

    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("AC/DC: Back in Black?"), "ACDC Back in Black");
        assert_eq!(sanitize_filename("normal-name"), "normal-name");
        assert_eq!(sanitize_filename("  lots   of\tspace  "), "lots of space");
        assert_eq!(sanitize_filename("...hidden..."), "hidden");
    }

    #[test]
    fn test_sanitize_filename_fallback_and_length() {
        assert_eq!(sanitize_filename("???"), "audio");
        let long = "a".repeat(400);
        assert_eq!(sanitize_filename(&long).chars().count(), MAX_STEM_LEN);
    }

    #[test]
    fn test_extract_video_id() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?list=PL1&v=dQw4w9WgXcQ&t=3"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(extract_video_id("https://www.youtube.com/playlist?list=PL1"), None);
    }

    #[test]
    fn test_candidate_paths() {
        let dir = Path::new("/music");
        let names: Vec<PathBuf> = candidate_paths(dir, "Song", "mp3").take(3).collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("/music/Song.mp3"),
                PathBuf::from("/music/Song (1).mp3"),
                PathBuf::from("/music/Song (2).mp3"),
            ]
        );
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/music"), PathBuf::from("/music"));
        assert_eq!(expand_home("a/~/b"), PathBuf::from("a/~/b"));

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~"), home);
            assert_eq!(expand_home("~/Music"), home.join("Music"));
        }
    }
}
