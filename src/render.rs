//! HTML rendering of the single story page.
//!
//! The whole page is rebuilt from session state on every request.

use std::fmt::Write as _;

use base64::engine::general_purpose::STANDARD;
use base64::write::EncoderStringWriter;

use crate::narrator::{AudioClip, AudioOutcome, AUDIO_ERROR_MARKER, AUDIO_MIME};
use crate::session::StoryState;
use crate::story::{
    Gender, Moral, OutputMode, StoryRequest, Theme, Voice, AGE_RANGE, DURATION_RANGE,
};

pub const AUDIO_UNAVAILABLE_WARNING: &str =
    "The OpenAI API key is missing. Audio narration is unavailable.";

/// Everything one render needs.
pub struct PageView<'a> {
    pub title: &'a str,
    pub request: &'a StoryRequest,
    pub story: &'a StoryState,
    pub font_size: u32,
    /// Narration attempted during this render, if audio mode is on.
    pub audio: Option<&'a AudioOutcome>,
    pub speech_configured: bool,
}

const STYLE: &str = r#"
body { background-color: #F0F8FF; font-family: 'Comic Sans MS', 'Trebuchet MS', sans-serif; margin: 0; }
main { max-width: 760px; margin: 0 auto; padding: 24px; }
h1, h2 { color: #4B0082; }
.caption { color: #666; margin-top: -8px; }
fieldset { border: 1px solid #d8c8f0; border-radius: 12px; margin-bottom: 16px; }
legend { color: #4B0082; font-weight: bold; }
label { display: block; margin: 8px 0; }
.button, button { background-color: #FF69B4; color: white; border-radius: 25px; padding: 12px 28px;
  font-size: 1.1em; font-weight: bold; border: none; cursor: pointer; text-decoration: none;
  box-shadow: 0px 4px 6px rgba(0,0,0,0.1); display: inline-block; }
.button:hover, button:hover { background-color: #FF1493; }
button.generate { width: 100%; font-size: 1.3em; }
form:has(#output-story:checked) .voice-row { display: none; }
.story { background: white; border-radius: 12px; padding: 16px 24px; line-height: 1.5; }
.resize form { display: inline; }
.resize button { padding: 6px 16px; }
.alert { border-radius: 8px; padding: 12px 16px; margin: 12px 0; }
.alert.error { background: #fde2e2; color: #8a1c1c; }
.alert.warning { background: #fff4d6; color: #7a5a00; }
.alert.success { background: #def7e5; color: #1d6b35; }
.actions { margin: 16px 0; display: flex; gap: 12px; flex-wrap: wrap; }
"#;

const SCRIPT: &str = r#"
document.getElementById('story-form').addEventListener('submit', function () {
  var button = this.querySelector('button.generate');
  button.disabled = true;
  button.textContent = '✍️ Writing the story...';
});
"#;

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Blank-line separated paragraphs, single newlines kept as line breaks.
fn story_paragraphs(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let lines: Vec<String> = p.lines().map(escape_html).collect();
            format!("<p>{}</p>", lines.join("<br>"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `data:` URI for the inline player, encoded straight from the clip stream.
fn audio_data_uri(clip: &AudioClip) -> std::io::Result<String> {
    let mut encoder = EncoderStringWriter::new(&STANDARD);
    std::io::copy(&mut clip.stream(), &mut encoder)?;
    Ok(format!("data:{AUDIO_MIME};base64,{}", encoder.into_inner()))
}

fn alert(kind: &str, message: &str) -> String {
    format!(
        "<div class=\"alert {kind}\" role=\"alert\">{}</div>",
        escape_html(message)
    )
}

fn selected(flag: bool) -> &'static str {
    if flag {
        " selected"
    } else {
        ""
    }
}

fn checked(flag: bool) -> &'static str {
    if flag {
        " checked"
    } else {
        ""
    }
}

fn render_form(request: &StoryRequest) -> String {
    let profile = &request.profile;
    let options = &request.options;
    let output = &request.output;
    let mut html = String::new();

    html.push_str("<form id=\"story-form\" method=\"post\" action=\"/generate\">\n");

    html.push_str("<fieldset><legend>👶 The child</legend>\n");
    for label in Gender::LABELS {
        let _ = writeln!(
            html,
            "<label><input type=\"radio\" name=\"gender\" value=\"{0}\"{1}> {0}</label>",
            escape_html(label),
            checked(Gender::from_label(label) == profile.gender),
        );
    }
    let _ = writeln!(
        html,
        "<label>Age <input type=\"number\" name=\"age\" min=\"{}\" max=\"{}\" value=\"{}\"></label>",
        AGE_RANGE.start(),
        AGE_RANGE.end(),
        profile.age,
    );
    let _ = writeln!(
        html,
        "<label>Name <input type=\"text\" name=\"name\" placeholder=\"e.g. Maxence\" value=\"{}\"></label>",
        escape_html(&profile.name),
    );
    html.push_str("</fieldset>\n");

    html.push_str("<fieldset><legend>✨ The story</legend>\n<label>Theme <select name=\"theme\">\n");
    for theme in Theme::ALL {
        let _ = writeln!(
            html,
            "<option value=\"{}\"{}>{}</option>",
            theme.key(),
            selected(theme == options.theme),
            theme.label(),
        );
    }
    html.push_str("</select></label>\n");
    let _ = writeln!(
        html,
        "<label>Companion <input type=\"text\" name=\"companion\" placeholder=\"e.g. Ulysses the cat\" value=\"{}\"></label>",
        escape_html(&options.companion),
    );
    html.push_str("<label>Moral <select name=\"moral\">\n");
    for moral in Moral::ALL {
        let _ = writeln!(
            html,
            "<option value=\"{}\"{}>{}</option>",
            moral.key(),
            selected(moral == options.moral),
            moral.label(),
        );
    }
    html.push_str("</select></label>\n");
    let _ = writeln!(
        html,
        "<label>Reading time (minutes) <input type=\"range\" name=\"duration\" min=\"{0}\" max=\"{1}\" step=\"1\" value=\"{2}\" \
         oninput=\"this.nextElementSibling.value = this.value\"> <output>{2}</output></label>",
        DURATION_RANGE.start(),
        DURATION_RANGE.end(),
        options.duration_minutes,
    );
    html.push_str("</fieldset>\n");

    html.push_str("<fieldset><legend>🔊 Output</legend>\n");
    for (id, mode) in [("output-story", OutputMode::Story), ("output-audio", OutputMode::Audio)] {
        let value = match mode {
            OutputMode::Story => "story",
            OutputMode::Audio => "audio",
        };
        let _ = writeln!(
            html,
            "<label><input type=\"radio\" id=\"{id}\" name=\"output\" value=\"{value}\"{}> {}</label>",
            checked(mode == output.mode),
            mode.label(),
        );
    }
    html.push_str("<label class=\"voice-row\">Narrator <select name=\"voice\">\n");
    for voice in Voice::ALL {
        let _ = writeln!(
            html,
            "<option value=\"{}\"{}>{}</option>",
            voice.id(),
            selected(voice == output.voice),
            voice.label(),
        );
    }
    html.push_str("</select></label>\n</fieldset>\n");

    html.push_str("<button type=\"submit\" class=\"generate\">✨ Tell the story</button>\n</form>\n");
    html
}

fn render_story(view: &PageView<'_>, text: &str) -> String {
    let mut html = String::new();

    html.push_str("<hr>\n<div class=\"resize\">\n");
    html.push_str("<form method=\"post\" action=\"/font/shrink\"><button type=\"submit\" title=\"Smaller text\">A−</button></form>\n");
    html.push_str("<form method=\"post\" action=\"/font/enlarge\"><button type=\"submit\" title=\"Bigger text\">A+</button></form>\n");
    html.push_str("</div>\n");

    let _ = writeln!(
        html,
        "<article class=\"story\" style=\"font-size: {}pt\">\n{}\n</article>",
        view.font_size,
        story_paragraphs(text),
    );

    let stem = escape_html(&view.request.file_stem());
    let _ = writeln!(
        html,
        "<div class=\"actions\"><a class=\"button\" href=\"/download/story\" download=\"{stem}.txt\">📄 Download text</a></div>",
    );

    match view.audio {
        None => {}
        Some(AudioOutcome::Unavailable) => {
            html.push_str(&alert("warning", AUDIO_UNAVAILABLE_WARNING));
        }
        Some(AudioOutcome::Failed(message)) => {
            html.push_str(&alert("error", message));
        }
        Some(AudioOutcome::Ready(clip)) => match audio_data_uri(clip) {
            Ok(src) => {
                html.push_str(&alert("success", "Ready to listen!"));
                let _ = writeln!(
                    html,
                    "<audio controls src=\"{src}\"></audio>\n\
                     <div class=\"actions\"><a class=\"button\" href=\"/download/audio\" download=\"{stem}.mp3\">📥 Download MP3</a></div>",
                );
            }
            Err(e) => {
                html.push_str(&alert("error", &format!("{AUDIO_ERROR_MARKER}{e}")));
            }
        },
    }

    html
}

pub fn render_page(view: &PageView<'_>) -> String {
    let mut body = String::new();

    let _ = writeln!(body, "<h1>🦄 {}</h1>", escape_html(view.title));
    body.push_str("<p class=\"caption\">Story by Google Gemini ⚡ | Audio by OpenAI 🔊</p>\n");
    if !view.speech_configured {
        body.push_str(&alert("warning", AUDIO_UNAVAILABLE_WARNING));
    }
    body.push_str(&render_form(view.request));

    match view.story {
        StoryState::NoStory => {}
        StoryState::Ready(text) => body.push_str(&render_story(view, text)),
        StoryState::Failed(message) => {
            body.push_str("<hr>\n");
            body.push_str(&alert("error", message));
        }
    }

    document(view.title, &body, true)
}

/// Page shown instead of the app when the story credential is missing.
pub fn render_fatal(title: &str, message: &str) -> String {
    let body = format!(
        "<h1>🦄 {}</h1>\n{}",
        escape_html(title),
        alert("error", message)
    );
    document(title, &body, false)
}

fn document(title: &str, body: &str, with_script: bool) -> String {
    let script = if with_script {
        format!("<script>{SCRIPT}</script>\n")
    } else {
        String::new()
    };
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{} ✨</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<main>\n{body}</main>\n{script}</body>\n</html>\n",
        escape_html(title),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view<'a>(
        request: &'a StoryRequest,
        story: &'a StoryState,
        audio: Option<&'a AudioOutcome>,
    ) -> PageView<'a> {
        PageView {
            title: "The Story Factory",
            request,
            story,
            font_size: 18,
            audio,
            speech_configured: true,
        }
    }

    #[test]
    fn test_no_story_renders_form_only() {
        let request = StoryRequest::default();
        let html = render_page(&view(&request, &StoryState::NoStory, None));
        assert!(html.contains("action=\"/generate\""));
        assert!(!html.contains("<article"));
        assert!(!html.contains("/download/"));
    }

    #[test]
    fn test_story_text_is_escaped_and_split() {
        let request = StoryRequest::default();
        let story = StoryState::Ready("🦖 Title\n\nLine <one>\nline two\n\nEnd & goodnight".into());
        let html = render_page(&view(&request, &story, None));

        assert!(html.contains("<p>🦖 Title</p>"));
        assert!(html.contains("<p>Line &lt;one&gt;<br>line two</p>"));
        assert!(html.contains("<p>End &amp; goodnight</p>"));
        assert!(html.contains("font-size: 18pt"));
    }

    #[test]
    fn test_error_has_no_actions() {
        let request = StoryRequest::default();
        let story = StoryState::Failed("Story generation error: timeout".into());
        let html = render_page(&view(&request, &story, None));

        assert!(html.contains("alert error"));
        assert!(html.contains("Story generation error: timeout"));
        assert!(!html.contains("/download/"));
        assert!(!html.contains("<audio"));
        assert!(!html.contains("/font/"));
    }

    #[test]
    fn test_audio_player_embeds_clip() {
        let request = StoryRequest::default();
        let story = StoryState::Ready("Once".into());
        let audio = AudioOutcome::Ready(AudioClip::new(b"ID3".to_vec()));
        let html = render_page(&view(&request, &story, Some(&audio)));

        assert!(html.contains("src=\"data:audio/mpeg;base64,SUQz\""));
        assert!(html.contains("/download/audio"));
        assert!(html.contains("download=\"Story.mp3\""));
    }

    #[test]
    fn test_audio_failure_keeps_story() {
        let request = StoryRequest::default();
        let story = StoryState::Ready("Once".into());
        let audio = AudioOutcome::Failed("Audio error: 500".into());
        let html = render_page(&view(&request, &story, Some(&audio)));

        assert!(html.contains("Audio error: 500"));
        assert!(html.contains("/download/story"));
        assert!(!html.contains("<audio"));
    }

    #[test]
    fn test_form_is_refilled() {
        let mut request = StoryRequest::default();
        request.profile.name = "Lea \"Bug\"".into();
        request.options.theme = Theme::Ocean;
        request.output.mode = OutputMode::Audio;
        request.output.voice = Voice::Onyx;

        let html = render_page(&view(&request, &StoryState::NoStory, None));
        assert!(html.contains("value=\"Lea &quot;Bug&quot;\""));
        assert!(html.contains("<option value=\"ocean\" selected>"));
        assert!(html.contains("<option value=\"onyx\" selected>"));
        assert!(html.contains("id=\"output-audio\" name=\"output\" value=\"audio\" checked"));
    }

    #[test]
    fn test_fatal_page_has_no_form() {
        let html = render_fatal("The Story Factory", "Missing GOOGLE_API_KEY");
        assert!(html.contains("Missing GOOGLE_API_KEY"));
        assert!(!html.contains("<form"));
    }
}
