//! Instruction prompt for the story model.
//!
//! Picks a writing style from the child's age and turns the requested
//! reading time into an approximate word budget.

use crate::story::{Profile, StoryOptions};

/// Reading-aloud pace used to turn minutes into a word budget.
pub const WORDS_PER_MINUTE: u32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeStyle {
    /// Two and under.
    Toddler,
    /// Three to five.
    Preschool,
    /// Six and up.
    Reader,
}

impl AgeStyle {
    pub fn for_age(age: u8) -> Self {
        match age {
            0..=2 => Self::Toddler,
            3..=5 => Self::Preschool,
            _ => Self::Reader,
        }
    }

    pub fn directive(self) -> &'static str {
        match self {
            Self::Toddler => {
                "Very short sentences (3 words). Lots of repetition. Onomatopoeia. Soft, gentle baby tone."
            }
            Self::Preschool => "Simple sentences. Clear structure. Joyful vocabulary.",
            Self::Reader => "Rich vocabulary. A plot with twists and turns.",
        }
    }
}

pub fn target_words(duration_minutes: u8) -> u32 {
    u32::from(duration_minutes) * WORDS_PER_MINUTE
}

/// Build the instruction sent to the text-generation service.
pub fn build_prompt(profile: &Profile, options: &StoryOptions) -> String {
    let style = AgeStyle::for_age(profile.age);

    // Filled in one pass so names containing braces reach the model verbatim.
    format!(
        "Role: expert children's book author.\n\
         Audience: {gender}, {age} years old.\n\
         Style: {style}\n\
         Length: about {words} words (roughly {minutes} minutes read aloud). \
         This is a target, not a strict limit.\n\
         \n\
         Task: Write a short story on the theme '{theme}'.\n\
         Hero: {hero}.\n\
         Companion: {companion}.\n\
         Moral: {moral}.\n\
         \n\
         Format: a title decorated with emojis, then airy text split into \
         paragraphs separated by blank lines. No preamble.",
        gender = profile.gender.word(),
        age = profile.age,
        style = style.directive(),
        words = target_words(options.duration_minutes),
        minutes = options.duration_minutes,
        theme = options.theme.label(),
        hero = profile.display_name(),
        companion = options.companion_or_default(),
        moral = options.moral.label(),
    )
}
