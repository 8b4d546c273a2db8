//! Upstream media collaborators
//!
//! The core never talks to the platform itself. A [`MediaSource`] owns
//! authentication, sessions, retries and rate limits; the coordinator only
//! calls it once per resolution.

use super::records::{Highlight, Media, Profile, Story, UserShort};
use crate::error::{FetchError, Result};
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[async_trait]
pub trait MediaSource: Send + Sync + 'static {
    async fn user_id(&self, username: &str) -> Result<String>;
    async fn user_info(&self, user_id: &str) -> Result<Profile>;
    async fn user_clips(&self, user_id: &str, amount: usize) -> Result<Vec<Media>>;
    async fn user_medias(&self, user_id: &str, amount: usize) -> Result<Vec<Media>>;
    async fn usertag_medias(&self, user_id: &str, amount: usize) -> Result<Vec<Media>>;
    async fn user_followers(&self, user_id: &str, amount: usize) -> Result<Vec<UserShort>>;
    async fn user_following(&self, user_id: &str, amount: usize) -> Result<Vec<UserShort>>;
    async fn user_highlights(&self, user_id: &str) -> Result<Vec<Highlight>>;
    async fn user_stories(&self, user_id: &str) -> Result<Vec<Story>>;
}

/// Everything the source knows about one account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub clips: Vec<Media>,
    #[serde(default)]
    pub medias: Vec<Media>,
    #[serde(default)]
    pub tagged: Vec<Media>,
    #[serde(default)]
    pub followers: Vec<UserShort>,
    #[serde(default)]
    pub following: Vec<UserShort>,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
    #[serde(default)]
    pub stories: Vec<Story>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceDocument {
    pub accounts: Vec<AccountSnapshot>,
}

/// Serves account snapshots loaded from a JSON document
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    document: SourceDocument,
}

impl JsonFileSource {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            FetchError::Source(format!("cannot read {}: {}", path.display(), e))
        })?;
        let document: SourceDocument = serde_json::from_str(&raw)?;
        info!(
            "Loaded {} account snapshot(s) from {}",
            document.accounts.len(),
            path.display()
        );
        Ok(Self { document })
    }

    pub fn from_document(document: SourceDocument) -> Self {
        Self { document }
    }

    fn account(&self, user_id: &str) -> Result<&AccountSnapshot> {
        self.document
            .accounts
            .iter()
            .find(|account| account.user_id == user_id)
            .ok_or_else(|| FetchError::Upstream(format!("unknown user id {}", user_id)))
    }
}

fn first<T: Clone>(items: &[T], amount: usize) -> Vec<T> {
    items.iter().take(amount).cloned().collect()
}

#[async_trait]
impl MediaSource for JsonFileSource {
    async fn user_id(&self, username: &str) -> Result<String> {
        self.document
            .accounts
            .iter()
            .find(|account| account.username == username)
            .map(|account| account.user_id.clone())
            .ok_or_else(|| FetchError::Upstream(format!("user {} not found", username)))
    }

    async fn user_info(&self, user_id: &str) -> Result<Profile> {
        self.account(user_id)?
            .profile
            .clone()
            .ok_or_else(|| FetchError::Upstream(format!("no profile for user id {}", user_id)))
    }

    async fn user_clips(&self, user_id: &str, amount: usize) -> Result<Vec<Media>> {
        Ok(first(&self.account(user_id)?.clips, amount))
    }

    async fn user_medias(&self, user_id: &str, amount: usize) -> Result<Vec<Media>> {
        Ok(first(&self.account(user_id)?.medias, amount))
    }

    async fn usertag_medias(&self, user_id: &str, amount: usize) -> Result<Vec<Media>> {
        Ok(first(&self.account(user_id)?.tagged, amount))
    }

    async fn user_followers(&self, user_id: &str, amount: usize) -> Result<Vec<UserShort>> {
        Ok(first(&self.account(user_id)?.followers, amount))
    }

    async fn user_following(&self, user_id: &str, amount: usize) -> Result<Vec<UserShort>> {
        Ok(first(&self.account(user_id)?.following, amount))
    }

    async fn user_highlights(&self, user_id: &str) -> Result<Vec<Highlight>> {
        Ok(self.account(user_id)?.highlights.clone())
    }

    async fn user_stories(&self, user_id: &str) -> Result<Vec<Story>> {
        Ok(self.account(user_id)?.stories.clone())
    }
}
