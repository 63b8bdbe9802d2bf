//! Path helpers: video discovery, capture naming and command templates

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use walkdir::WalkDir;

use crate::error::{SightclipError, SightclipResult};

/// Container extensions picked up by folder ingest
pub const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "mkv", "avi", "mov", "flv", "wmv"];

/// Whether `path` has a recognised video extension (case-insensitive)
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map_or(false, |ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

/// Video files directly inside `dir`, sorted by name
pub fn list_videos(dir: &Path) -> SightclipResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SightclipError::MissingFolder {
            path: dir.display().to_string(),
        });
    }

    let mut videos = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            SightclipError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })?;
        if entry.file_type().is_file() && is_video_file(entry.path()) {
            videos.push(entry.into_path());
        }
    }
    videos.sort();
    Ok(videos)
}

/// `{recordings_dir}/{channel}_{YYYYmmdd_HHMMSS}.{ext}`
pub fn capture_path<Tz>(
    recordings_dir: &Path,
    channel: &str,
    extension: &str,
    started_at: &DateTime<Tz>,
) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    recordings_dir.join(format!(
        "{}_{}.{}",
        channel,
        started_at.format("%Y%m%d_%H%M%S"),
        extension
    ))
}

/// Substitute `{name}` placeholders in every argument of a command template
pub fn expand_template(template: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            vars.iter().fold(arg.clone(), |acc, (name, value)| {
                acc.replace(&format!("{{{}}}", name), value)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file(Path::new("a/b/clip.MP4")));
        assert!(is_video_file(Path::new("movie.mkv")));
        assert!(!is_video_file(Path::new("notes.txt")));
        assert!(!is_video_file(Path::new("noext")));
    }

    #[test]
    fn test_list_videos_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mkv", "a.mp4", "readme.md", "c.WMV"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("d.mp4"), b"x").unwrap();

        let names: Vec<String> = list_videos(dir.path())
            .unwrap()
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.mp4", "b.mkv", "c.WMV"]);
    }

    #[test]
    fn test_list_videos_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let result = list_videos(&dir.path().join("absent"));
        assert!(matches!(result, Err(SightclipError::MissingFolder { .. })));
    }

    #[test]
    fn test_capture_path() {
        let started = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let path = capture_path(Path::new("vods"), "somechannel", "mp4", &started);
        assert_eq!(path, PathBuf::from("vods/somechannel_20240309_140507.mp4"));
    }

    #[test]
    fn test_expand_template() {
        let template = vec![
            "streamlink".to_string(),
            "-o".to_string(),
            "{output}".to_string(),
            "https://twitch.tv/{channel}".to_string(),
        ];
        let expanded = expand_template(&template, &[("channel", "abc"), ("output", "vods/x.mp4")]);
        assert_eq!(
            expanded,
            vec!["streamlink", "-o", "vods/x.mp4", "https://twitch.tv/abc"]
        );
    }
}
