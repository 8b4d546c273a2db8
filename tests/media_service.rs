use async_trait::async_trait;
use fanout_cache::config::Config;
use fanout_cache::media::{
    Highlight, JsonFileSource, Media, MediaResource, MediaService, MediaSource, Profile, Story,
    UserShort,
};
use fanout_cache::{FetchError, Result};
use futures::future::join_all;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn snapshot_json() -> serde_json::Value {
    json!({
        "accounts": [{
            "user_id": "1001",
            "username": "alice",
            "profile": {
                "pk": "1001", "username": "alice", "full_name": "Alice A.",
                "follower_count": 1200, "following_count": 80, "media_count": 35,
                "is_private": false, "is_verified": true
            },
            "clips": [
                {"id": "r1", "code": "AAA", "is_video": true, "taken_at": "2024-05-01T09:00:00Z",
                 "video_url": "https://cdn.example/r1.mp4", "view_count": 10, "like_count": 2},
                {"id": "r2", "code": "BBB", "is_video": true, "taken_at": "2024-05-03T09:00:00Z",
                 "caption_text": "latest"}
            ],
            "tagged": [
                {"id": "t1", "code": "TTT", "taken_at": "2024-04-01T00:00:00Z",
                 "thumbnail_url": "https://cdn.example/t1.jpg"}
            ],
            "stories": [
                {"pk": "s1", "taken_at": "2024-05-04T08:00:00Z", "is_video": true,
                 "video_url": "https://cdn.example/s1.mp4", "video_duration": 7.5}
            ]
        }]
    })
}

fn config() -> Config {
    Config {
        username: "alice".to_string(),
        ..Config::default()
    }
}

#[tokio::test]
async fn serves_envelopes_from_a_json_snapshot_file() {
    let path = std::env::temp_dir().join(format!(
        "fanout-cache-snapshot-{}.json",
        std::process::id()
    ));
    tokio::fs::write(&path, snapshot_json().to_string()).await.unwrap();

    let source = Arc::new(JsonFileSource::load(&path).await.unwrap());
    let service = MediaService::new(source, &config());

    let reels = service.fetch(MediaResource::Reels).await;
    assert!(reels.is_success());
    assert_eq!(reels.body["count"], 2);
    assert_eq!(reels.body["reels"][0]["id"], "r2");
    assert_eq!(reels.body["reels"][0]["caption"], "latest");
    assert_eq!(reels.body["reels"][1]["reel_url"], "https://instagram.com/reel/AAA");

    let tagged = service.fetch(MediaResource::Tagged).await;
    assert_eq!(tagged.body["tagged_posts"][0]["type"], "image");
    assert_eq!(tagged.body["tagged_posts"][0]["post_url"], "https://instagram.com/p/TTT");

    let stories = service.fetch(MediaResource::Stories).await;
    assert_eq!(stories.body["stories"][0]["duration"], 7.5);

    let posts = service.fetch(MediaResource::Posts).await;
    assert_eq!(posts.body["count"], 0);

    let profile = service.fetch(MediaResource::Profile).await;
    assert!(profile.is_success());
    assert_eq!(profile.body["profile"]["full_name"], "Alice A.");
    assert_eq!(profile.body["profile"]["bio"], "");
    assert_eq!(profile.body["profile"]["followers"], 1200);
    assert_eq!(profile.body["profile"]["posts"], 35);
    assert!(profile.body.get("count").is_none());

    tokio::fs::remove_file(&path).await.ok();
}

#[tokio::test]
async fn unknown_account_yields_error_envelope() {
    let source = Arc::new(JsonFileSource::from_document(
        serde_json::from_value(snapshot_json()).unwrap(),
    ));
    let service = MediaService::new(
        source,
        &Config {
            username: "mallory".to_string(),
            ..Config::default()
        },
    );

    let response = service.fetch(MediaResource::Followers).await;
    assert_eq!(response.status_code, 500);
    assert_eq!(response.body["kind"], "upstream");
    assert_eq!(response.body["message"], "Upstream Error: user mallory not found");
}

/// Slow source that counts how often each call reaches it
#[derive(Default)]
struct CountingSource {
    lookups: AtomicUsize,
    clip_calls: AtomicUsize,
}

#[async_trait]
impl MediaSource for CountingSource {
    async fn user_id(&self, _username: &str) -> Result<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok("1".to_string())
    }

    async fn user_info(&self, user_id: &str) -> Result<Profile> {
        Err(FetchError::Upstream(format!("profile {} is private", user_id)))
    }

    async fn user_clips(&self, _user_id: &str, amount: usize) -> Result<Vec<Media>> {
        self.clip_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        let clips = (0..amount)
            .map(|i| {
                serde_json::from_value(json!({
                    "id": format!("r{}", i),
                    "code": format!("C{}", i),
                    "taken_at": format!("2024-05-{:02}T00:00:00Z", i + 1),
                }))
                .map_err(FetchError::from)
            })
            .collect::<Result<Vec<Media>>>()?;
        Ok(clips)
    }

    async fn user_medias(&self, _user_id: &str, _amount: usize) -> Result<Vec<Media>> {
        Err(FetchError::Upstream("feed unavailable".to_string()))
    }

    async fn usertag_medias(&self, _user_id: &str, _amount: usize) -> Result<Vec<Media>> {
        Ok(Vec::new())
    }

    async fn user_followers(&self, _user_id: &str, _amount: usize) -> Result<Vec<UserShort>> {
        Ok(Vec::new())
    }

    async fn user_following(&self, _user_id: &str, _amount: usize) -> Result<Vec<UserShort>> {
        Ok(Vec::new())
    }

    async fn user_highlights(&self, _user_id: &str) -> Result<Vec<Highlight>> {
        Ok(Vec::new())
    }

    async fn user_stories(&self, _user_id: &str) -> Result<Vec<Story>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn concurrent_requests_reach_the_source_once() {
    let source = Arc::new(CountingSource::default());
    let service = MediaService::new(
        Arc::clone(&source),
        &Config {
            fetch_amount: 12,
            ..config()
        },
    );

    let responses = join_all((0..6).map(|_| service.fetch(MediaResource::Reels))).await;

    assert_eq!(source.clip_calls.load(Ordering::SeqCst), 1);
    assert_eq!(source.lookups.load(Ordering::SeqCst), 1);
    for response in &responses {
        assert_eq!(response.body["count"], 12);
        assert_eq!(response.body["reels"], responses[0].body["reels"]);
    }
    assert_eq!(responses[0].body["reels"][0]["id"], "r11");
}

#[tokio::test]
async fn upstream_failures_are_not_cached() {
    let source = Arc::new(CountingSource::default());
    let service = MediaService::new(Arc::clone(&source), &config());

    assert!(matches!(service.posts().await, Err(FetchError::Upstream(_))));
    assert!(matches!(service.posts().await, Err(FetchError::Upstream(_))));

    // each failed resolution looked the user up again
    assert_eq!(source.lookups.load(Ordering::SeqCst), 2);
}
