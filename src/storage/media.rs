//! Media kinds and filename validation

use std::path::Path;

/// Kind of media attached to a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            "audio" => Some(MediaKind::Audio),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Image => &["jpg", "jpeg", "png", "webp"],
            MediaKind::Video => &["mp4", "mov", "webm"],
            MediaKind::Audio => &["mp3", "wav", "ogg", "webm"],
        }
    }

    /// Check whether a filename's extension is allowed for this kind
    pub fn allows_filename(&self, filename: &str) -> bool {
        match extension(filename) {
            Some(ext) => self.allowed_extensions().contains(&ext.as_str()),
            None => false,
        }
    }
}

/// Lowercased extension of a filename, without the dot
pub fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(MediaKind::parse("image"), Some(MediaKind::Image));
        assert_eq!(MediaKind::parse("video"), Some(MediaKind::Video));
        assert_eq!(MediaKind::parse("audio"), Some(MediaKind::Audio));
        assert_eq!(MediaKind::parse("document"), None);
    }

    #[test]
    fn test_image_extensions() {
        assert!(MediaKind::Image.allows_filename("photo.jpg"));
        assert!(MediaKind::Image.allows_filename("photo.JPEG"));
        assert!(MediaKind::Image.allows_filename("photo.webp"));
        assert!(!MediaKind::Image.allows_filename("clip.mp4"));
        assert!(!MediaKind::Image.allows_filename("noextension"));
    }

    #[test]
    fn test_webm_is_video_and_audio() {
        assert!(MediaKind::Video.allows_filename("clip.webm"));
        assert!(MediaKind::Audio.allows_filename("voice.webm"));
        assert!(!MediaKind::Image.allows_filename("clip.webm"));
    }

    #[test]
    fn test_audio_extensions() {
        assert!(MediaKind::Audio.allows_filename("note.mp3"));
        assert!(MediaKind::Audio.allows_filename("note.wav"));
        assert!(MediaKind::Audio.allows_filename("note.ogg"));
        assert!(!MediaKind::Audio.allows_filename("note.flac"));
    }
}
