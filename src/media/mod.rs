//! Media collections served through the fetch coordinator
//!
//! Each resource is one upstream call, a per-item record transform and a
//! sort order. Keys take the form `{resource}-for-user-{username}`.

pub mod records;
pub mod service;
pub mod source;

pub use records::{
    Highlight, HighlightRecord, Media, PostKind, PostRecord, Profile, ProfileRecord, RecordError,
    ReelRecord, Story, StoryRecord, UserRecord, UserShort,
};
pub use service::{MediaResponse, MediaService};
pub use source::{AccountSnapshot, JsonFileSource, MediaSource, SourceDocument};

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum MediaResource {
    Profile,
    Reels,
    Posts,
    Tagged,
    Followers,
    Following,
    Highlights,
    Stories,
}

impl MediaResource {
    pub const ALL: [MediaResource; 8] = [
        MediaResource::Profile,
        MediaResource::Reels,
        MediaResource::Posts,
        MediaResource::Tagged,
        MediaResource::Followers,
        MediaResource::Following,
        MediaResource::Highlights,
        MediaResource::Stories,
    ];

    /// Name used in cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaResource::Profile => "profile",
            MediaResource::Reels => "reels",
            MediaResource::Posts => "posts",
            MediaResource::Tagged => "tagged",
            MediaResource::Followers => "followers",
            MediaResource::Following => "following",
            MediaResource::Highlights => "highlights",
            MediaResource::Stories => "stories",
        }
    }

    /// Field holding the items in the JSON envelope
    pub fn field_name(&self) -> &'static str {
        match self {
            MediaResource::Tagged => "tagged_posts",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for MediaResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_resource_names_are_distinct() {
        let keys: HashSet<&str> = MediaResource::ALL.iter().map(|r| r.as_str()).collect();
        let fields: HashSet<&str> = MediaResource::ALL.iter().map(|r| r.field_name()).collect();

        assert_eq!(keys.len(), MediaResource::ALL.len());
        assert_eq!(fields.len(), MediaResource::ALL.len());
        assert_eq!(MediaResource::Tagged.field_name(), "tagged_posts");
        assert_eq!(MediaResource::Profile.to_string(), "profile");
    }

    #[test]
    fn test_every_resource_parses_from_its_name() {
        use clap::ValueEnum;

        for resource in MediaResource::ALL {
            assert_eq!(MediaResource::from_str(resource.as_str(), false), Ok(resource));
        }
    }
}
