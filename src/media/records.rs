//! Upstream media shapes and the JSON records served for them
//!
//! Every `process_*` function is a pure transform suitable for the fan-out
//! executor: one raw item in, one record out, no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A reel, feed post or tagged post as returned by the upstream client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub id: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub caption_text: Option<String>,
    pub taken_at: DateTime<Utc>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comment_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserShort {
    pub pk: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub profile_pic_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub media_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub pk: String,
    pub taken_at: DateTime<Utc>,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub video_duration: Option<f64>,
}

/// Full account details as returned by the upstream client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub pk: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub media_count: u64,
    #[serde(default)]
    pub profile_pic_url: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("media {0} has no shortcode")]
    MissingCode(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReelRecord {
    pub id: String,
    pub unique_identifier: String,
    pub reel_url: String,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub caption: String,
    pub posted_at_utc: DateTime<Utc>,
    pub views: Option<u64>,
    pub likes: u64,
    pub comments: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Video,
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub post_url: String,
    #[serde(rename = "type")]
    pub kind: PostKind,
    pub media_url: Option<String>,
    pub caption: String,
    pub posted_at_utc: DateTime<Utc>,
    pub likes: u64,
    pub comments: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub username: String,
    pub full_name: String,
    pub is_private: bool,
    pub profile_pic_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub username: String,
    pub full_name: String,
    pub bio: String,
    pub followers: u64,
    pub following: u64,
    pub posts: u64,
    pub profile_pic: Option<String>,
    pub is_private: bool,
    pub is_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightRecord {
    pub id: String,
    pub title: String,
    pub cover_url: Option<String>,
    pub story_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub media_url: Option<String>,
    pub is_video: bool,
    pub duration: f64,
}

fn shortcode(media: &Media) -> Result<&str, RecordError> {
    media
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| RecordError::MissingCode(media.id.clone()))
}

pub fn process_reel(media: Media) -> Result<ReelRecord, RecordError> {
    let code = shortcode(&media)?.to_string();
    Ok(ReelRecord {
        reel_url: format!("https://instagram.com/reel/{}", code),
        unique_identifier: code,
        id: media.id,
        video_url: media.video_url,
        thumbnail_url: media.thumbnail_url,
        caption: media.caption_text.unwrap_or_default(),
        posted_at_utc: media.taken_at,
        views: media.view_count,
        likes: media.like_count,
        comments: media.comment_count,
    })
}

pub fn process_post(media: Media) -> Result<PostRecord, RecordError> {
    let post_url = format!("https://instagram.com/p/{}", shortcode(&media)?);
    let (kind, media_url) = if media.is_video {
        (PostKind::Video, media.video_url)
    } else {
        (PostKind::Image, media.thumbnail_url)
    };
    Ok(PostRecord {
        id: media.id,
        post_url,
        kind,
        media_url,
        caption: media.caption_text.unwrap_or_default(),
        posted_at_utc: media.taken_at,
        likes: media.like_count,
        comments: media.comment_count,
    })
}

pub fn process_user(user: UserShort) -> Result<UserRecord, RecordError> {
    Ok(UserRecord {
        user_id: user.pk,
        username: user.username,
        full_name: user.full_name.unwrap_or_default(),
        is_private: user.is_private,
        profile_pic_url: user.profile_pic_url,
    })
}

pub fn process_profile(profile: Profile) -> Result<ProfileRecord, RecordError> {
    Ok(ProfileRecord {
        username: profile.username,
        full_name: profile.full_name.unwrap_or_default(),
        bio: profile.biography.unwrap_or_default(),
        followers: profile.follower_count,
        following: profile.following_count,
        posts: profile.media_count,
        profile_pic: profile.profile_pic_url,
        is_private: profile.is_private,
        is_verified: profile.is_verified,
    })
}

pub fn process_highlight(highlight: Highlight) -> Result<HighlightRecord, RecordError> {
    Ok(HighlightRecord {
        id: highlight.id,
        title: highlight
            .title
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| "Untitled".to_string()),
        cover_url: highlight.cover_url,
        story_count: highlight.media_count,
    })
}

pub fn process_story(story: Story) -> Result<StoryRecord, RecordError> {
    let (media_url, duration) = if story.is_video {
        (story.video_url, story.video_duration.unwrap_or(0.0))
    } else {
        (story.thumbnail_url, 0.0)
    };
    Ok(StoryRecord {
        id: story.pk,
        created_at: story.taken_at,
        media_url,
        is_video: story.is_video,
        duration,
    })
}
