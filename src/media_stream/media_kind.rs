use std::fmt;

/// MediaKind determines the type of media a track carries
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Unspecified = 0,

    /// MediaKindAudio indicates this is an audio track
    Audio = 1,

    /// MediaKindVideo indicates this is a video track
    Video = 2,
}

impl Default for MediaKind {
    fn default() -> Self {
        MediaKind::Unspecified
    }
}

impl From<&str> for MediaKind {
    fn from(raw: &str) -> Self {
        match raw {
            "audio" => MediaKind::Audio,
            "video" => MediaKind::Video,
            _ => MediaKind::Unspecified,
        }
    }
}

impl From<u8> for MediaKind {
    fn from(v: u8) -> Self {
        match v {
            1 => MediaKind::Audio,
            2 => MediaKind::Video,
            _ => MediaKind::Unspecified,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Unspecified => crate::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}
