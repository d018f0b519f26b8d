//! HTTP front end: one page, a handful of form actions and two downloads.
//!
//! Every request loads the visitor's session, applies at most one action and
//! redirects back to `/`, where the page is rebuilt from state.

use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::narrator::{narrate, AudioOutcome, SpeechSynthesizer, AUDIO_MIME};
use crate::prompt::build_prompt;
use crate::render::{render_fatal, render_page, PageView};
use crate::session::{SessionState, SessionStore, StoryState};
use crate::story::{StoryForm, StoryRequest};
use crate::writer::{write_story, StoryWriter};

pub const SESSION_COOKIE: &str = "story_session";

/// RFC 5987 `attr-char` minus alphanumerics: everything else is escaped.
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Clone)]
pub struct AppState {
    pub title: String,
    pub model: String,
    pub sessions: Arc<SessionStore>,
    pub writer: Arc<dyn StoryWriter>,
    /// `None` when no speech credential is configured.
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
    pub started_at: chrono::DateTime<chrono::Local>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    story_model: String,
    audio_enabled: bool,
    sessions: usize,
    started_at: String,
}

/// Build the axum router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/generate", post(handle_generate))
        .route("/font/enlarge", post(handle_enlarge))
        .route("/font/shrink", post(handle_shrink))
        .route("/download/story", get(handle_download_story))
        .route("/download/audio", get(handle_download_audio))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Router that answers every request with the fatal configuration page.
pub fn fatal_router(title: String, message: String) -> Router {
    let page = Html(render_fatal(&title, &message));
    Router::new().fallback(move || {
        let page = page.clone();
        async move { (StatusCode::SERVICE_UNAVAILABLE, page) }
    })
}

/// Serve `app` on `host:port` until the process exits.
pub async fn serve(app: Router, host: &str, port: u16) -> std::io::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Story Factory listening on http://{addr}");
    axum::serve(listener, app).await
}

/// Session id from the cookie, minting a new one if absent or malformed.
fn session_id(jar: CookieJar) -> (CookieJar, Uuid) {
    let existing = jar
        .get(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok());
    if let Some(id) = existing {
        return (jar, id);
    }

    let id = Uuid::new_v4();
    let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), id)
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name.
fn attachment(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let encoded = utf8_percent_encode(filename, FILENAME_ENCODE_SET);

    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

impl AppState {
    /// Rebuild the page for one session. In audio mode this narrates the
    /// story again on every call.
    async fn render(&self, id: Uuid) -> String {
        let session = self.sessions.snapshot(id);

        let audio = match (&session.story, session.request.output.narration_voice()) {
            (StoryState::Ready(text), Some(voice)) => {
                let outcome = narrate(self.speech.as_deref(), text, voice).await;
                let clip = match &outcome {
                    AudioOutcome::Ready(clip) => Some(clip.clone()),
                    _ => None,
                };
                self.sessions.attach_audio(id, text, clip);
                Some(outcome)
            }
            _ => None,
        };

        render_page(&PageView {
            title: &self.title,
            request: &session.request,
            story: &session.story,
            font_size: session.font_size,
            audio: audio.as_ref(),
            speech_configured: self.speech.is_some(),
        })
    }
}

// --- Handlers ---

async fn handle_index(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let page = state.render(id).await;
    (jar, Html(page))
}

async fn handle_generate(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<StoryForm>,
) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let request = StoryRequest::from(form);
    let prompt = build_prompt(&request.profile, &request.options);

    info!(
        "Writing story: theme={}, age={}, minutes={}, audio={}",
        request.options.theme.key(),
        request.profile.age,
        request.options.duration_minutes,
        request.output.narration_voice().is_some(),
    );

    let ticket = state
        .sessions
        .update(id, |s| s.begin_generation(request));
    let outcome = write_story(state.writer.as_ref(), &prompt).await;
    let stored = state
        .sessions
        .update(id, |s| s.finish_generation(ticket, outcome));
    if !stored {
        info!("Discarded story from a superseded generate request");
    }

    (jar, Redirect::to("/"))
}

async fn handle_enlarge(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    state.sessions.update(id, SessionState::enlarge);
    (jar, Redirect::to("/"))
}

async fn handle_shrink(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    state.sessions.update(id, SessionState::shrink);
    (jar, Redirect::to("/"))
}

async fn handle_download_story(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (jar, id) = session_id(jar);
    let session = state.sessions.snapshot(id);

    let StoryState::Ready(text) = session.story else {
        return (StatusCode::NOT_FOUND, jar, "No story to download").into_response();
    };

    let filename = format!("{}.txt", session.request.file_stem());
    (
        jar,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&filename)),
        ],
        text,
    )
        .into_response()
}

async fn handle_download_audio(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (jar, id) = session_id(jar);
    let session = state.sessions.snapshot(id);

    let (StoryState::Ready(_), Some(clip)) = (&session.story, session.audio) else {
        warn!("Audio download requested with no rendered narration");
        return (StatusCode::NOT_FOUND, jar, "No audio to download").into_response();
    };

    let filename = format!("{}.mp3", session.request.file_stem());
    (
        jar,
        [
            (header::CONTENT_TYPE, AUDIO_MIME.to_string()),
            (header::CONTENT_DISPOSITION, attachment(&filename)),
        ],
        clip.as_bytes().to_vec(),
    )
        .into_response()
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        story_model: state.model.clone(),
        audio_enabled: state.speech.is_some(),
        sessions: state.sessions.len(),
        started_at: state.started_at.to_rfc3339(),
    })
}
