//! Story request model: who the story is for, what it is about, and how it
//! should be delivered.

use serde::Deserialize;

/// Substring of the gender radio label that selects the boy wording.
pub const BOY_MARKER: &str = "Boy";

pub const AGE_RANGE: std::ops::RangeInclusive<u8> = 1..=12;
pub const DURATION_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

const DEFAULT_AGE: u8 = 4;
const DEFAULT_DURATION: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Boy,
    Girl,
}

impl Gender {
    pub const LABELS: [&'static str; 2] = ["Boy 👦", "Girl 👧"];

    pub fn from_label(label: &str) -> Self {
        if label.contains(BOY_MARKER) {
            Self::Boy
        } else {
            Self::Girl
        }
    }

    pub fn word(self) -> &'static str {
        match self {
            Self::Boy => "boy",
            Self::Girl => "girl",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Animals,
    Space,
    Magic,
    Dinosaurs,
    Superheroes,
    Ocean,
}

impl Theme {
    pub const ALL: [Theme; 6] = [
        Self::Animals,
        Self::Space,
        Self::Magic,
        Self::Dinosaurs,
        Self::Superheroes,
        Self::Ocean,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Animals => "Animals 🐻",
            Self::Space => "Space 🚀",
            Self::Magic => "Magic ✨",
            Self::Dinosaurs => "Dinosaurs 🦖",
            Self::Superheroes => "Superheroes ⚡",
            Self::Ocean => "Ocean 🐳",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Animals => "animals",
            Self::Space => "space",
            Self::Magic => "magic",
            Self::Dinosaurs => "dinosaurs",
            Self::Superheroes => "superheroes",
            Self::Ocean => "ocean",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Moral {
    #[default]
    None,
    Courage,
    Sharing,
    Patience,
    Calm,
}

impl Moral {
    pub const ALL: [Moral; 5] = [
        Self::None,
        Self::Courage,
        Self::Sharing,
        Self::Patience,
        Self::Calm,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Courage => "Courage 🦁",
            Self::Sharing => "Sharing 🤝",
            Self::Patience => "Patience ⏳",
            Self::Calm => "Calm 🧘",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Courage => "courage",
            Self::Sharing => "sharing",
            Self::Patience => "patience",
            Self::Calm => "calm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Story,
    Audio,
}

impl OutputMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Story => "Story only 📖",
            Self::Audio => "Story + audio 🔊",
        }
    }
}

/// Narrator voices offered by the speech service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Nova,
    #[default]
    Shimmer,
    Fable,
    Onyx,
}

impl Voice {
    pub const ALL: [Voice; 4] = [Self::Nova, Self::Shimmer, Self::Fable, Self::Onyx];

    pub fn label(self) -> &'static str {
        match self {
            Self::Nova => "Nova (Energetic)",
            Self::Shimmer => "Shimmer (Soft)",
            Self::Fable => "Fable (Storyteller)",
            Self::Onyx => "Onyx (Deep)",
        }
    }

    /// Voice id sent to the speech API.
    pub fn id(self) -> &'static str {
        match self {
            Self::Nova => "nova",
            Self::Shimmer => "shimmer",
            Self::Fable => "fable",
            Self::Onyx => "onyx",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub gender: Gender,
    pub age: u8,
    pub name: String,
}

impl Profile {
    /// Given name, or "the little boy/girl" when none was entered.
    pub fn display_name(&self) -> String {
        let name = self.name.trim();
        if name.is_empty() {
            format!("the little {}", self.gender.word())
        } else {
            name.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryOptions {
    pub theme: Theme,
    pub companion: String,
    pub moral: Moral,
    pub duration_minutes: u8,
}

impl StoryOptions {
    pub fn companion_or_default(&self) -> &str {
        let companion = self.companion.trim();
        if companion.is_empty() {
            "a surprise friend"
        } else {
            companion
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputOptions {
    pub mode: OutputMode,
    pub voice: Voice,
}

impl OutputOptions {
    /// The voice to narrate with, if audio was requested at all.
    pub fn narration_voice(&self) -> Option<Voice> {
        match self.mode {
            OutputMode::Audio => Some(self.voice),
            OutputMode::Story => None,
        }
    }
}

/// Everything submitted by one press of the generate button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryRequest {
    pub profile: Profile,
    pub options: StoryOptions,
    pub output: OutputOptions,
}

impl StoryRequest {
    /// Base name for downloads: the given name, or "Story".
    pub fn file_stem(&self) -> String {
        let name = self.profile.name.trim();
        if name.is_empty() {
            "Story".to_string()
        } else {
            name.to_string()
        }
    }
}

impl Default for StoryRequest {
    fn default() -> Self {
        StoryForm::default().into()
    }
}

/// Raw urlencoded form as posted by the page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoryForm {
    pub gender: String,
    pub age: String,
    pub name: String,
    pub theme: Theme,
    pub companion: String,
    pub moral: Moral,
    pub duration: String,
    pub output: OutputMode,
    pub voice: Voice,
}

fn parse_clamped(raw: &str, range: &std::ops::RangeInclusive<u8>, fallback: u8) -> u8 {
    raw.trim()
        .parse::<i64>()
        .map(|v| v.clamp(*range.start() as i64, *range.end() as i64) as u8)
        .unwrap_or(fallback)
}

impl From<StoryForm> for StoryRequest {
    fn from(form: StoryForm) -> Self {
        Self {
            profile: Profile {
                gender: Gender::from_label(&form.gender),
                age: parse_clamped(&form.age, &AGE_RANGE, DEFAULT_AGE),
                name: form.name.trim().to_string(),
            },
            options: StoryOptions {
                theme: form.theme,
                companion: form.companion.trim().to_string(),
                moral: form.moral,
                duration_minutes: parse_clamped(&form.duration, &DURATION_RANGE, DEFAULT_DURATION),
            },
            output: OutputOptions {
                mode: form.output,
                voice: form.voice,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(gender: Gender, name: &str) -> Profile {
        Profile {
            gender,
            age: 4,
            name: name.into(),
        }
    }

    #[test]
    fn test_gender_from_label() {
        assert_eq!(Gender::from_label("Boy 👦"), Gender::Boy);
        assert_eq!(Gender::from_label("Girl 👧"), Gender::Girl);
        assert_eq!(Gender::from_label(""), Gender::Girl);
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(profile(Gender::Girl, "").display_name(), "the little girl");
        assert_eq!(profile(Gender::Boy, "  ").display_name(), "the little boy");
        assert_eq!(profile(Gender::Girl, "Lea").display_name(), "Lea");
    }

    #[test]
    fn test_companion_fallback() {
        let mut options = StoryOptions {
            theme: Theme::Space,
            companion: String::new(),
            moral: Moral::None,
            duration_minutes: 2,
        };
        assert_eq!(options.companion_or_default(), "a surprise friend");
        options.companion = "Ulysses the cat".into();
        assert_eq!(options.companion_or_default(), "Ulysses the cat");
    }

    #[test]
    fn test_form_is_clamped_and_defaulted() {
        let form = StoryForm {
            gender: "Boy 👦".into(),
            age: "99".into(),
            duration: "abc".into(),
            ..Default::default()
        };
        let request = StoryRequest::from(form);
        assert_eq!(request.profile.gender, Gender::Boy);
        assert_eq!(request.profile.age, 12);
        assert_eq!(request.options.duration_minutes, 3);
        assert_eq!(request.output.voice, Voice::Shimmer);
        assert_eq!(request.output.narration_voice(), None);
    }

    #[test]
    fn test_file_stem() {
        let mut request = StoryRequest::default();
        assert_eq!(request.file_stem(), "Story");
        request.profile.name = "Maxence".into();
        assert_eq!(request.file_stem(), "Maxence");
    }
}
