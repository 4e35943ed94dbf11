use serde::{Deserialize, Serialize};

/// Metadata sent alongside each uploaded audio file.
///
/// `chapters_json` is itself a JSON string: an object mapping chapter title to
/// start time in whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub duration_seconds: u64,
    pub chapters_json: String,
}

impl Metadata {
    pub fn new(title: impl Into<String>, duration_seconds: u64, chapters_json: String) -> Self {
        Self {
            title: title.into(),
            duration_seconds,
            chapters_json,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_wire_shape() {
        let metadata = Metadata::new("Daily Digest for 2024-05-01", 125, r#"{"Intro":0}"#.into());
        let value: serde_json::Value = serde_json::from_str(&metadata.to_json().unwrap()).unwrap();

        assert_eq!(value["title"], "Daily Digest for 2024-05-01");
        assert_eq!(value["duration_seconds"], 125);
        assert_eq!(value["chapters_json"], r#"{"Intro":0}"#);
    }
}
