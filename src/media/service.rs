use super::records::{
    process_highlight, process_post, process_profile, process_reel, process_story, process_user,
    HighlightRecord, PostRecord, ProfileRecord, ReelRecord, StoryRecord, UserRecord,
};
use super::source::MediaSource;
use super::MediaResource;
use crate::config::Config;
use crate::error::{FetchError, Result};
use crate::fetch::{CacheKey, CoordinatorStats, FanoutExecutor, FetchCoordinator};
use crate::utils::{format_seconds, Timer};
use log::info;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::{cmp::Reverse, sync::Arc, time::Duration};

/// Requests slower than this are logged as warnings
const SLOW_REQUEST: Duration = Duration::from_secs(5);

/// JSON envelope plus the HTTP-style status it would be served with
#[derive(Debug, Clone, PartialEq)]
pub struct MediaResponse {
    pub status_code: u16,
    pub body: Value,
}

impl MediaResponse {
    /// Collections are listed with their count; the profile is a single object.
    pub fn success(resource: MediaResource, items: Vec<Value>, elapsed: Duration) -> Self {
        let mut body = Map::new();
        body.insert("status".to_string(), json!("success"));
        body.insert("processing_time".to_string(), json!(format_seconds(elapsed)));
        let field = resource.field_name().to_string();
        match resource {
            MediaResource::Profile => {
                body.insert(field, items.into_iter().next().unwrap_or(Value::Null));
            }
            _ => {
                body.insert("count".to_string(), json!(items.len()));
                body.insert(field, Value::Array(items));
            }
        }
        Self {
            status_code: 200,
            body: Value::Object(body),
        }
    }

    pub fn error(err: &FetchError) -> Self {
        Self {
            status_code: 500,
            body: json!({
                "status": "error",
                "kind": err.kind(),
                "message": err.to_string(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

fn to_values<T: Serialize>(items: &[T]) -> Result<Vec<Value>> {
    items
        .iter()
        .map(|item| serde_json::to_value(item).map_err(FetchError::from))
        .collect()
}

/// Cached media collections for one account
///
/// Posts and tagged posts share a coordinator, as do followers and
/// following; their keys keep them apart.
pub struct MediaService<S: MediaSource> {
    source: Arc<S>,
    username: String,
    fetch_amount: usize,
    follow_amount: usize,
    profiles: FetchCoordinator<ProfileRecord>,
    reels: FetchCoordinator<ReelRecord>,
    posts: FetchCoordinator<PostRecord>,
    users: FetchCoordinator<UserRecord>,
    highlights: FetchCoordinator<HighlightRecord>,
    stories: FetchCoordinator<StoryRecord>,
}

impl<S: MediaSource> MediaService<S> {
    pub fn new(source: Arc<S>, config: &Config) -> Self {
        let executor = Arc::new(FanoutExecutor::new(config.fanout_config()));
        let coordinator_config = config.coordinator_config();

        info!(
            "Serving media for @{} ({} workers, ttl {}s)",
            config.username, config.max_workers, config.cache_ttl_secs
        );

        Self {
            source,
            username: config.username.clone(),
            fetch_amount: config.fetch_amount,
            follow_amount: config.follow_amount,
            profiles: FetchCoordinator::new(coordinator_config.clone(), Arc::clone(&executor)),
            reels: FetchCoordinator::new(coordinator_config.clone(), Arc::clone(&executor)),
            posts: FetchCoordinator::new(coordinator_config.clone(), Arc::clone(&executor)),
            users: FetchCoordinator::new(coordinator_config.clone(), Arc::clone(&executor)),
            highlights: FetchCoordinator::new(coordinator_config.clone(), Arc::clone(&executor)),
            stories: FetchCoordinator::new(coordinator_config, executor),
        }
    }

    pub fn key(&self, resource: MediaResource) -> CacheKey {
        CacheKey::for_user(resource.as_str(), &self.username)
    }

    /// Account details, cached like any collection of one
    pub async fn profile(&self) -> Result<ProfileRecord> {
        let source = Arc::clone(&self.source);
        let username = self.username.clone();
        let profiles = self
            .profiles
            .resolve(
                self.key(MediaResource::Profile),
                move || async move {
                    let user_id = source.user_id(&username).await?;
                    source.user_info(&user_id).await.map(|profile| vec![profile])
                },
                process_profile,
                |_: &ProfileRecord| (),
            )
            .await?;

        profiles
            .first()
            .cloned()
            .ok_or_else(|| FetchError::Upstream(format!("no profile for @{}", self.username)))
    }

    pub async fn reels(&self) -> Result<Arc<Vec<ReelRecord>>> {
        let source = Arc::clone(&self.source);
        let username = self.username.clone();
        let amount = self.fetch_amount;
        self.reels
            .resolve(
                self.key(MediaResource::Reels),
                move || async move {
                    let user_id = source.user_id(&username).await?;
                    source.user_clips(&user_id, amount).await
                },
                process_reel,
                |reel: &ReelRecord| reel.posted_at_utc,
            )
            .await
    }

    pub async fn posts(&self) -> Result<Arc<Vec<PostRecord>>> {
        let source = Arc::clone(&self.source);
        let username = self.username.clone();
        let amount = self.fetch_amount;
        self.posts
            .resolve(
                self.key(MediaResource::Posts),
                move || async move {
                    let user_id = source.user_id(&username).await?;
                    source.user_medias(&user_id, amount).await
                },
                process_post,
                |post: &PostRecord| post.posted_at_utc,
            )
            .await
    }

    pub async fn tagged(&self) -> Result<Arc<Vec<PostRecord>>> {
        let source = Arc::clone(&self.source);
        let username = self.username.clone();
        let amount = self.fetch_amount;
        self.posts
            .resolve(
                self.key(MediaResource::Tagged),
                move || async move {
                    let user_id = source.user_id(&username).await?;
                    source.usertag_medias(&user_id, amount).await
                },
                process_post,
                |post: &PostRecord| post.posted_at_utc,
            )
            .await
    }

    pub async fn followers(&self) -> Result<Arc<Vec<UserRecord>>> {
        let source = Arc::clone(&self.source);
        let username = self.username.clone();
        let amount = self.follow_amount;
        self.users
            .resolve(
                self.key(MediaResource::Followers),
                move || async move {
                    let user_id = source.user_id(&username).await?;
                    source.user_followers(&user_id, amount).await
                },
                process_user,
                |user: &UserRecord| Reverse(user.username.clone()),
            )
            .await
    }

    pub async fn following(&self) -> Result<Arc<Vec<UserRecord>>> {
        let source = Arc::clone(&self.source);
        let username = self.username.clone();
        let amount = self.follow_amount;
        self.users
            .resolve(
                self.key(MediaResource::Following),
                move || async move {
                    let user_id = source.user_id(&username).await?;
                    source.user_following(&user_id, amount).await
                },
                process_user,
                |user: &UserRecord| Reverse(user.username.clone()),
            )
            .await
    }

    pub async fn highlights(&self) -> Result<Arc<Vec<HighlightRecord>>> {
        let source = Arc::clone(&self.source);
        let username = self.username.clone();
        self.highlights
            .resolve(
                self.key(MediaResource::Highlights),
                move || async move {
                    let user_id = source.user_id(&username).await?;
                    source.user_highlights(&user_id).await
                },
                process_highlight,
                |highlight: &HighlightRecord| highlight.story_count,
            )
            .await
    }

    pub async fn stories(&self) -> Result<Arc<Vec<StoryRecord>>> {
        let source = Arc::clone(&self.source);
        let username = self.username.clone();
        self.stories
            .resolve(
                self.key(MediaResource::Stories),
                move || async move {
                    let user_id = source.user_id(&username).await?;
                    source.user_stories(&user_id).await
                },
                process_story,
                |story: &StoryRecord| story.created_at,
            )
            .await
    }

    /// Resolves `resource` and wraps the outcome in its JSON envelope.
    pub async fn fetch(&self, resource: MediaResource) -> MediaResponse {
        let timer = Timer::start(resource.as_str());
        let outcome = match resource {
            MediaResource::Profile => {
                self.profile().await.and_then(|profile| to_values(&[profile]))
            }
            MediaResource::Reels => self.reels().await.and_then(|items| to_values(&items)),
            MediaResource::Posts => self.posts().await.and_then(|items| to_values(&items)),
            MediaResource::Tagged => self.tagged().await.and_then(|items| to_values(&items)),
            MediaResource::Followers => self.followers().await.and_then(|items| to_values(&items)),
            MediaResource::Following => self.following().await.and_then(|items| to_values(&items)),
            MediaResource::Highlights => {
                self.highlights().await.and_then(|items| to_values(&items))
            }
            MediaResource::Stories => self.stories().await.and_then(|items| to_values(&items)),
        };
        let elapsed = timer.finish_with_threshold(SLOW_REQUEST);

        match outcome {
            Ok(items) => MediaResponse::success(resource, items, elapsed),
            Err(err) => MediaResponse::error(&err),
        }
    }

    /// Per-coordinator stats, labelled by the resources they serve
    pub async fn stats(&self) -> Vec<(&'static str, CoordinatorStats)> {
        vec![
            ("profile", self.profiles.stats().await),
            ("reels", self.reels.stats().await),
            ("posts+tagged", self.posts.stats().await),
            ("followers+following", self.users.stats().await),
            ("highlights", self.highlights.stats().await),
            ("stories", self.stories.stats().await),
        ]
    }

    pub async fn log_stats(&self) {
        for (label, stats) in self.stats().await {
            info!("{}: {}", label, stats.summary());
        }
        let fanout = self.reels.executor().get_stats().await;
        info!(
            "fanout: {} batches, {} items transformed, avg {:?}",
            fanout.batches,
            fanout.completed_tasks,
            fanout.avg_task_duration()
        );
    }
}
