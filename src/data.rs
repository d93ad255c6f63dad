use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use crate::tuys::{self, Comment, DenounceParams, Owner, RequestError, StoryItem, StoryUpdate};

pub trait FeedService: Send + Sync {
    fn load_stories(&self, channel: Option<&str>) -> Result<Vec<StoryItem>>;
    fn load_story(&self, id: i64) -> Result<StoryItem>;
    fn load_comments(&self, story_id: i64) -> Result<Vec<Comment>>;
}

/// Story mutations. Errors stay typed so callers can show the server's
/// message.
pub trait StoryService: Send + Sync {
    fn like(&self, id: i64) -> Result<(), RequestError>;
    fn unlike(&self, id: i64) -> Result<(), RequestError>;
    fn denounce(&self, params: &DenounceParams) -> Result<(), RequestError>;
    fn delete(&self, id: i64) -> Result<(), RequestError>;
    fn update(&self, id: i64, update: &StoryUpdate) -> Result<(), RequestError>;
}

pub struct TuysFeedService {
    client: Arc<tuys::Client>,
}

impl TuysFeedService {
    pub fn new(client: Arc<tuys::Client>) -> Self {
        Self { client }
    }
}

impl FeedService for TuysFeedService {
    fn load_stories(&self, channel: Option<&str>) -> Result<Vec<StoryItem>> {
        self.client.stories(channel).context("fetch stories")
    }

    fn load_story(&self, id: i64) -> Result<StoryItem> {
        self.client.story(id).context("fetch story")
    }

    fn load_comments(&self, story_id: i64) -> Result<Vec<Comment>> {
        self.client.comments(story_id).context("fetch comments")
    }
}

pub struct TuysStoryService {
    client: Arc<tuys::Client>,
}

impl TuysStoryService {
    pub fn new(client: Arc<tuys::Client>) -> Self {
        Self { client }
    }
}

impl StoryService for TuysStoryService {
    fn like(&self, id: i64) -> Result<(), RequestError> {
        self.client.post_like(id)
    }

    fn unlike(&self, id: i64) -> Result<(), RequestError> {
        self.client.post_unlike(id)
    }

    fn denounce(&self, params: &DenounceParams) -> Result<(), RequestError> {
        self.client.post_denounce(params)
    }

    fn delete(&self, id: i64) -> Result<(), RequestError> {
        self.client.delete_story(id)
    }

    fn update(&self, id: i64, update: &StoryUpdate) -> Result<(), RequestError> {
        self.client.update_story(id, update)
    }
}

/// Sample stories shared by the offline feed and story services, so a
/// mutation is visible to the next fetch.
#[derive(Clone)]
pub struct MockStore(Arc<Mutex<Vec<StoryItem>>>);

impl Default for MockStore {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(mock_stories())))
    }
}

impl MockStore {
    pub fn story(&self, id: i64) -> Option<StoryItem> {
        self.0.lock().iter().find(|story| story.id == id).cloned()
    }

    fn modify<F: FnOnce(&mut StoryItem)>(&self, id: i64, change: F) -> Result<(), RequestError> {
        let mut stories = self.0.lock();
        let story = stories
            .iter_mut()
            .find(|story| story.id == id)
            .ok_or_else(|| not_found(id))?;
        change(story);
        Ok(())
    }

    fn remove(&self, id: i64) -> Result<(), RequestError> {
        let mut stories = self.0.lock();
        let before = stories.len();
        stories.retain(|story| story.id != id);
        if stories.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }
}

fn not_found(id: i64) -> RequestError {
    RequestError::Api {
        status: 404,
        message: Some(format!("História {id} não encontrada.")),
    }
}

#[derive(Default)]
pub struct MockFeedService {
    store: MockStore,
}

impl MockFeedService {
    pub fn new(store: MockStore) -> Self {
        Self { store }
    }
}

impl FeedService for MockFeedService {
    fn load_stories(&self, channel: Option<&str>) -> Result<Vec<StoryItem>> {
        let stories = self.store.0.lock();
        Ok(stories
            .iter()
            .filter(|story| channel.map_or(true, |c| story.channel.eq_ignore_ascii_case(c)))
            .cloned()
            .collect())
    }

    fn load_story(&self, id: i64) -> Result<StoryItem> {
        self.store
            .story(id)
            .with_context(|| format!("story {id} not found"))
    }

    fn load_comments(&self, story_id: i64) -> Result<Vec<Comment>> {
        let count = self.store.story(story_id).map_or(0, |story| story.comments);
        Ok((0..count.clamp(0, 3))
            .map(|n| Comment {
                id: story_id * 100 + n,
                text: "Que história bonita!".into(),
                date: sample_date(),
                owner: mock_owner(9, "leitor", false),
            })
            .collect())
    }
}

const MAX_RECORDED_CALLS: usize = 64;

/// Applies mutations to a [`MockStore`] and answers with a scripted result;
/// used offline and by tests that need a failing server. Keeps the most
/// recent calls for inspection.
#[derive(Default)]
pub struct MockStoryService {
    store: MockStore,
    failure: Mutex<Option<RequestError>>,
    calls: Mutex<VecDeque<String>>,
}

impl MockStoryService {
    pub fn new(store: MockStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    pub fn failing(error: RequestError) -> Self {
        let service = Self::default();
        service.set_failure(Some(error));
        service
    }

    pub fn store(&self) -> MockStore {
        self.store.clone()
    }

    pub fn set_failure(&self, error: Option<RequestError>) {
        *self.failure.lock() = error;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().iter().cloned().collect()
    }

    fn record(&self, call: String) -> Result<(), RequestError> {
        {
            let mut calls = self.calls.lock();
            if calls.len() == MAX_RECORDED_CALLS {
                calls.pop_front();
            }
            calls.push_back(call);
        }
        match self.failure.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn set_liked(&self, id: i64, liked: bool) -> Result<(), RequestError> {
        self.store.modify(id, |story| {
            if story.liked_by_user != liked {
                story.liked_by_user = liked;
                story.likes = (story.likes + if liked { 1 } else { -1 }).max(0);
            }
        })
    }
}

impl StoryService for MockStoryService {
    fn like(&self, id: i64) -> Result<(), RequestError> {
        self.record(format!("like {id}"))?;
        self.set_liked(id, true)
    }

    fn unlike(&self, id: i64) -> Result<(), RequestError> {
        self.record(format!("unlike {id}"))?;
        self.set_liked(id, false)
    }

    fn denounce(&self, params: &DenounceParams) -> Result<(), RequestError> {
        self.record(format!("denounce {} {}", params.story_id, params.body.text))
    }

    fn delete(&self, id: i64) -> Result<(), RequestError> {
        self.record(format!("delete {id}"))?;
        self.store.remove(id)
    }

    fn update(&self, id: i64, update: &StoryUpdate) -> Result<(), RequestError> {
        self.record(format!("update {id} {}", update.title))?;
        self.store.modify(id, |story| {
            story.title = update.title.clone();
            story.body = update.body.clone();
            story.updated_at = Some(Utc::now());
        })
    }
}

fn sample_date() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn mock_owner(id: i64, username: &str, is_owner: bool) -> Owner {
    Owner {
        id,
        username: username.into(),
        avatar: String::new(),
        rank_color: "#5b8def".into(),
        is_owner,
    }
}

pub fn mock_stories() -> Vec<StoryItem> {
    vec![
        StoryItem {
            id: 1,
            title: "Bem-vindo ao Tuys".into(),
            body: "Use j/k para navegar, l para curtir, c para comentários e d para denunciar."
                .into(),
            date: sample_date(),
            updated_at: None,
            owner: mock_owner(1, "tuys", false),
            likes: 1_200,
            comments: 42,
            liked_by_user: false,
            followed_by_user: true,
            channel: "geral".into(),
        },
        StoryItem {
            id: 2,
            title: "Minha primeira estória".into(),
            body: "Pressione e para editar ou x para apagar esta estória.".into(),
            date: sample_date(),
            updated_at: None,
            owner: mock_owner(2, "voce", true),
            likes: 7,
            comments: 0,
            liked_by_user: false,
            followed_by_user: false,
            channel: "pessoal".into(),
        },
    ]
}
