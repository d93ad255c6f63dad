use std::fmt;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::Sender;

use crate::data::StoryService;
use crate::tuys::{DenounceBody, DenounceParams, RequestError, StoryUpdate};

/// Identifies the cached data a mutation touches: `[stories, story, <id>, user]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(Vec<String>);

impl RequestKey {
    pub fn story(id: i64) -> Self {
        Self(vec![
            "stories".into(),
            "story".into(),
            id.to_string(),
            "user".into(),
        ])
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Like,
    Unlike,
    Denounce,
    Delete,
    Update,
}

/// A mutation plus the context needed to reconcile its outcome. Like and
/// unlike carry the pre-toggle value so a failure can be rolled back from the
/// completion message alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryRequest {
    Like { previous: bool },
    Unlike { previous: bool },
    Denounce { text: String },
    Delete,
    Update { title: String, body: String },
}

impl StoryRequest {
    pub fn kind(&self) -> MutationKind {
        match self {
            StoryRequest::Like { .. } => MutationKind::Like,
            StoryRequest::Unlike { .. } => MutationKind::Unlike,
            StoryRequest::Denounce { .. } => MutationKind::Denounce,
            StoryRequest::Delete => MutationKind::Delete,
            StoryRequest::Update { .. } => MutationKind::Update,
        }
    }
}

/// Completion of one issued request. Sent exactly once per `issue` call.
#[derive(Debug, Clone)]
pub struct Settled {
    pub key: RequestKey,
    pub story_id: i64,
    pub request: StoryRequest,
    pub result: Result<(), RequestError>,
}

#[derive(Clone)]
pub struct MutationClient {
    service: Arc<dyn StoryService>,
    tx: Sender<Settled>,
}

impl MutationClient {
    pub fn new(service: Arc<dyn StoryService>, tx: Sender<Settled>) -> Self {
        Self { service, tx }
    }

    /// Runs the request on a worker thread. The outcome arrives later on the
    /// channel; nothing here blocks the caller.
    pub fn issue(&self, key: RequestKey, story_id: i64, request: StoryRequest) {
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        tracing::debug!(%key, kind = ?request.kind(), "issuing mutation");
        thread::spawn(move || {
            let result = execute(service.as_ref(), story_id, &request);
            if let Err(err) = &result {
                tracing::warn!(%key, kind = ?request.kind(), error = %err, "mutation failed");
            }
            let _ = tx.send(Settled {
                key,
                story_id,
                request,
                result,
            });
        });
    }
}

fn execute(
    service: &dyn StoryService,
    story_id: i64,
    request: &StoryRequest,
) -> Result<(), RequestError> {
    match request {
        StoryRequest::Like { .. } => service.like(story_id),
        StoryRequest::Unlike { .. } => service.unlike(story_id),
        StoryRequest::Denounce { text } => service.denounce(&DenounceParams {
            story_id,
            body: DenounceBody { text: text.clone() },
        }),
        StoryRequest::Delete => service.delete(story_id),
        StoryRequest::Update { title, body } => service.update(
            story_id,
            &StoryUpdate {
                title: title.clone(),
                body: body.clone(),
            },
        ),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MutationStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Error(Option<String>),
}

/// Observable state of one mutation kind for one story.
#[derive(Debug, Default)]
pub struct MutationState {
    status: MutationStatus,
    in_flight: usize,
}

impl MutationState {
    pub fn start(&mut self) {
        self.in_flight += 1;
        self.status = MutationStatus::Pending;
    }

    pub fn settle(&mut self, result: &Result<(), RequestError>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.status = match result {
            Ok(()) => MutationStatus::Success,
            Err(err) => MutationStatus::Error(err.user_message().map(str::to_string)),
        };
    }

    /// Acknowledges a settled outcome so it is never observed twice.
    pub fn reset(&mut self) {
        self.status = if self.in_flight > 0 {
            MutationStatus::Pending
        } else {
            MutationStatus::Idle
        };
    }

    pub fn status(&self) -> &MutationStatus {
        &self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == MutationStatus::Success
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, MutationStatus::Error(_))
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            MutationStatus::Error(message) => message.as_deref(),
            _ => None,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

#[derive(Debug, Default)]
pub struct StoryMutations {
    pub like: MutationState,
    pub unlike: MutationState,
    pub denounce: MutationState,
    pub delete: MutationState,
    pub update: MutationState,
}

impl StoryMutations {
    pub fn get_mut(&mut self, kind: MutationKind) -> &mut MutationState {
        match kind {
            MutationKind::Like => &mut self.like,
            MutationKind::Unlike => &mut self.unlike,
            MutationKind::Denounce => &mut self.denounce,
            MutationKind::Delete => &mut self.delete,
            MutationKind::Update => &mut self.update,
        }
    }

    pub fn like_in_flight(&self) -> bool {
        self.like.in_flight() + self.unlike.in_flight() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MockStoryService;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    #[test]
    fn request_key_shape() {
        let key = RequestKey::story(12);
        assert_eq!(key, RequestKey::story(12));
        assert_ne!(key, RequestKey::story(13));
        assert_eq!(key.to_string(), "stories/story/12/user");
    }

    #[test]
    fn issue_sends_exactly_one_settlement() {
        let service = Arc::new(MockStoryService::default());
        let (tx, rx) = unbounded();
        let client = MutationClient::new(service.clone(), tx);
        client.issue(
            RequestKey::story(3),
            3,
            StoryRequest::Denounce {
                text: "spam post".into(),
            },
        );
        let settled = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(settled.story_id, 3);
        assert!(settled.result.is_ok());
        assert_eq!(settled.request.kind(), MutationKind::Denounce);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(service.calls(), vec!["denounce 3 spam post"]);
    }

    #[test]
    fn state_reset_clears_outcome_but_remembers_in_flight() {
        let mut state = MutationState::default();
        state.start();
        state.start();
        state.settle(&Err(RequestError::Api {
            status: 400,
            message: Some("nope".into()),
        }));
        assert!(state.is_error());
        assert_eq!(state.error(), Some("nope"));
        state.reset();
        assert_eq!(state.status(), &MutationStatus::Pending);
        state.settle(&Ok(()));
        assert!(state.is_success());
        state.reset();
        assert_eq!(state.status(), &MutationStatus::Idle);
        assert_eq!(state.in_flight(), 0);
    }
}
