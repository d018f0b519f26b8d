//! Per-visitor session state.
//!
//! NO_STORY → (generate) → STORY_READY | STORY_ERROR
//!
//! Each generate action first drops back to NO_STORY. Font size changes are
//! self-transitions and never touch the story.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;
use uuid::Uuid;

use crate::narrator::AudioClip;
use crate::story::StoryRequest;
use crate::writer::StoryOutcome;

pub const MIN_FONT_SIZE: u32 = 10;
pub const FONT_STEP: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoryState {
    #[default]
    NoStory,
    Ready(String),
    Failed(String),
}

impl From<StoryOutcome> for StoryState {
    fn from(outcome: StoryOutcome) -> Self {
        match outcome {
            StoryOutcome::Ready(text) => Self::Ready(text),
            StoryOutcome::Failed(message) => Self::Failed(message),
        }
    }
}

impl std::fmt::Display for StoryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoStory => write!(f, "NO_STORY"),
            Self::Ready(_) => write!(f, "STORY_READY"),
            Self::Failed(_) => write!(f, "STORY_ERROR"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub story: StoryState,
    pub font_size: u32,
    /// Last submitted form; refills the page and picks the narrator.
    pub request: StoryRequest,
    /// Clip produced by the most recent render, served by the MP3 download.
    pub audio: Option<AudioClip>,
    /// Bumped by every generate; a finishing call only lands if it still matches.
    generation: u64,
    last_seen: Instant,
}

impl SessionState {
    pub fn new(font_size: u32) -> Self {
        Self {
            story: StoryState::NoStory,
            font_size: font_size.max(MIN_FONT_SIZE),
            request: StoryRequest::default(),
            audio: None,
            generation: 0,
            last_seen: Instant::now(),
        }
    }

    /// Drop back to NO_STORY and return the ticket for this generation.
    pub fn begin_generation(&mut self, request: StoryRequest) -> u64 {
        debug!("Session: {} → NO_STORY", self.story);
        self.generation += 1;
        self.request = request;
        self.story = StoryState::NoStory;
        self.audio = None;
        self.generation
    }

    /// Store the outcome unless a newer generate started after `ticket`.
    pub fn finish_generation(&mut self, ticket: u64, outcome: StoryOutcome) -> bool {
        if ticket != self.generation {
            debug!("Session: dropping outcome of superseded generation {ticket}");
            return false;
        }
        self.story = outcome.into();
        debug!("Session: NO_STORY → {}", self.story);
        true
    }

    pub fn enlarge(&mut self) {
        self.font_size = self.font_size.saturating_add(FONT_STEP);
    }

    pub fn shrink(&mut self) {
        self.font_size = self.font_size.saturating_sub(FONT_STEP).max(MIN_FONT_SIZE);
    }
}

/// In-memory sessions keyed by the cookie id. Idle sessions expire.
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, SessionState>>,
    ttl: Duration,
    default_font_size: u32,
}

impl SessionStore {
    pub fn new(ttl: Duration, default_font_size: u32) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            default_font_size,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, SessionState>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` against the session, creating it if needed.
    pub fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut sessions = self.lock();
        let now = Instant::now();
        let ttl = self.ttl;
        let before = sessions.len();
        sessions.retain(|key, s| *key == id || now.duration_since(s.last_seen) <= ttl);
        if sessions.len() < before {
            debug!("Pruned {} idle sessions", before - sessions.len());
        }

        let session = sessions
            .entry(id)
            .or_insert_with(|| SessionState::new(self.default_font_size));
        session.last_seen = now;
        f(session)
    }

    /// Copy of the session for rendering outside the lock. Unknown ids get a
    /// fresh default state that is not stored.
    pub fn snapshot(&self, id: Uuid) -> SessionState {
        let mut sessions = self.lock();
        match sessions.get_mut(&id) {
            Some(session) => {
                session.last_seen = Instant::now();
                session.clone()
            }
            None => SessionState::new(self.default_font_size),
        }
    }

    /// Remember the clip rendered for `story`, unless a newer generate
    /// replaced the story in the meantime.
    pub fn attach_audio(&self, id: Uuid, story: &str, clip: Option<AudioClip>) {
        self.update(id, |s| {
            if matches!(&s.story, StoryState::Ready(text) if text == story) {
                s.audio = clip;
            }
        });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(text: &str) -> StoryOutcome {
        StoryOutcome::Ready(text.into())
    }

    fn generate(s: &mut SessionState, outcome: StoryOutcome) {
        let ticket = s.begin_generation(StoryRequest::default());
        assert!(s.finish_generation(ticket, outcome));
    }

    #[test]
    fn test_generate_transitions() {
        let mut s = SessionState::new(18);
        assert_eq!(s.story, StoryState::NoStory);

        generate(&mut s, ready("Once upon a time"));
        assert_eq!(s.story, StoryState::Ready("Once upon a time".into()));
        assert_eq!(s.story.to_string(), "STORY_READY");

        s.audio = Some(AudioClip::new(vec![1, 2, 3]));
        let ticket = s.begin_generation(StoryRequest::default());
        assert_eq!(s.story, StoryState::NoStory);
        assert!(s.audio.is_none());

        s.finish_generation(ticket, StoryOutcome::Failed("Story generation error: boom".into()));
        assert_eq!(s.story.to_string(), "STORY_ERROR");
    }

    #[test]
    fn test_resize_keeps_story() {
        let mut s = SessionState::new(18);
        generate(&mut s, ready("A story"));

        s.enlarge();
        assert_eq!(s.font_size, 20);
        s.shrink();
        s.shrink();
        assert_eq!(s.font_size, 16);
        assert_eq!(s.story, StoryState::Ready("A story".into()));
    }

    #[test]
    fn test_shrink_floor() {
        let mut s = SessionState::new(10);
        s.shrink();
        assert_eq!(s.font_size, 10);

        let mut s = SessionState::new(11);
        s.shrink();
        assert_eq!(s.font_size, 10);

        assert_eq!(SessionState::new(4).font_size, MIN_FONT_SIZE);
    }

    #[test]
    fn test_generate_keeps_font_size() {
        let mut s = SessionState::new(18);
        s.enlarge();
        generate(&mut s, ready("New story"));
        assert_eq!(s.font_size, 20);
    }

    #[test]
    fn test_sessions_are_independent() {
        let store = SessionStore::new(Duration::from_secs(60), 18);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store.update(a, |s| generate(s, ready("A's story")));
        store.update(b, SessionState::enlarge);

        assert_eq!(store.snapshot(a).font_size, 18);
        assert_eq!(store.snapshot(b).story, StoryState::NoStory);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_idle_sessions_expire() {
        let store = SessionStore::new(Duration::ZERO, 18);
        let old = Uuid::new_v4();
        store.update(old, |_| ());
        std::thread::sleep(Duration::from_millis(5));

        let fresh = Uuid::new_v4();
        store.update(fresh, |_| ());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_attach_audio_ignores_stale_story() {
        let store = SessionStore::new(Duration::from_secs(60), 18);
        let id = Uuid::new_v4();
        store.update(id, |s| generate(s, ready("second")));

        store.attach_audio(id, "first", Some(AudioClip::new(vec![9])));
        assert!(store.snapshot(id).audio.is_none());

        store.attach_audio(id, "second", Some(AudioClip::new(vec![7])));
        assert_eq!(store.snapshot(id).audio, Some(AudioClip::new(vec![7])));
    }

    #[test]
    fn test_superseded_generation_is_dropped() {
        let mut s = SessionState::new(18);
        let mut first = StoryRequest::default();
        first.profile.name = "Lea".into();
        let mut second = StoryRequest::default();
        second.profile.name = "Max".into();

        let early = s.begin_generation(first);
        let late = s.begin_generation(second);

        assert!(!s.finish_generation(early, ready("Lea's story")));
        assert_eq!(s.story, StoryState::NoStory);

        assert!(s.finish_generation(late, ready("Max's story")));
        assert_eq!(s.story, StoryState::Ready("Max's story".into()));
        assert_eq!(s.request.profile.name, "Max");
    }

    #[test]
    fn test_snapshot_does_not_create_sessions() {
        let store = SessionStore::new(Duration::from_secs(60), 18);
        let unknown = Uuid::new_v4();

        let snapshot = store.snapshot(unknown);
        assert_eq!(snapshot.story, StoryState::NoStory);
        assert_eq!(snapshot.font_size, 18);
        assert_eq!(store.len(), 0);

        store.update(unknown, SessionState::enlarge);
        assert_eq!(store.snapshot(unknown).font_size, 20);
        assert_eq!(store.len(), 1);
    }
}
