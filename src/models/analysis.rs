use serde::{Deserialize, Serialize};

pub const NO_EXPLANATION: &str = "No explanation provided";

/// URL fragments that mark a reference as a video
pub const VIDEO_HOST_MARKERS: &[&str] = &["youtube.com", "youtu.be"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticityAssessment {
    pub score: u8,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Youtube,
    Web,
}

impl ReferenceKind {
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_ascii_lowercase();
        if VIDEO_HOST_MARKERS.iter().any(|m| lower.contains(m)) {
            ReferenceKind::Youtube
        } else {
            ReferenceKind::Web
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "youtube" | "video" => Some(ReferenceKind::Youtube),
            "web" | "article" | "website" => Some(ReferenceKind::Web),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReferenceKind::Youtube => "youtube",
            ReferenceKind::Web => "web",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: ReferenceKind,
}

/// References parsed from model output. When parsing failed even after the
/// recovery prompt the list is empty and `parse_error` says why.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReferenceList {
    pub references: Vec<Reference>,
    pub parse_error: Option<String>,
}

impl ReferenceList {
    pub fn parsed(references: Vec<Reference>) -> Self {
        Self {
            references,
            parse_error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            references: Vec::new(),
            parse_error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn youtube_urls_are_classified_as_video() {
        assert_eq!(
            ReferenceKind::from_url("https://www.youtube.com/watch?v=abc"),
            ReferenceKind::Youtube
        );
        assert_eq!(
            ReferenceKind::from_url("https://youtu.be/abc"),
            ReferenceKind::Youtube
        );
        assert_eq!(
            ReferenceKind::from_url("https://en.wikipedia.org/wiki/Coral_reef"),
            ReferenceKind::Web
        );
    }

    #[test]
    fn kind_serializes_lowercase() {
        let r = Reference {
            title: "t".into(),
            url: "u".into(),
            kind: ReferenceKind::Youtube,
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["type"], "youtube");
    }
}
