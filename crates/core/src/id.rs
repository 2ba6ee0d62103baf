// SPDX-License-Identifier: MIT

//! ID generation and newtype helpers.

/// Define a newtype ID wrapper around `String`.
///
/// Generates `new()`, `as_str()`, `Display`, `From<String>`, `From<&str>`,
/// and `Borrow<str>` implementations.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Identifies a scene: the transcript filename with the
    /// `_transkript.txt` suffix stripped.
    pub struct SceneId;
}

impl SceneId {
    /// Derive a scene id from a transcript filename
    /// (e.g. `scene_20250620_sz001_transkript.txt` → `scene_20250620_sz001`).
    pub fn from_transcript_filename(filename: &str) -> Self {
        let stem = filename.strip_suffix(".txt").unwrap_or(filename);
        let stem = stem.strip_suffix("_transkript").unwrap_or(stem);
        Self::new(stem)
    }

    /// The `<scene>_transkript.txt` filename this scene was detected under.
    pub fn transcript_filename(&self) -> String {
        format!("{}_transkript.txt", self.0)
    }

    pub fn metadata_filename(&self) -> String {
        format!("{}_metadata.json", self.0)
    }

    pub fn image_filename(&self) -> String {
        format!("{}_image.png", self.0)
    }

    pub fn error_filename(&self) -> String {
        format!("{}_error.json", self.0)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
