use std::fmt;

pub mod lt;
pub mod messenger;
pub mod scheduler;
pub mod template;
pub mod vote;

pub use lt::{LtInfo, LtInfoStore};
pub use messenger::{MessageRef, Messenger, RetryPolicy};
pub use scheduler::{CycleState, PendingCycle, Scheduler};
pub use vote::ReactionTally;

pub const REGULAR_EMOJI: &str = "👍";
pub const LIGHTNING_TALK_EMOJI: &str = "⚡";
pub const REST_EMOJI: &str = "💤";

/// Kind of meetup decided for the upcoming announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventDecision {
    #[default]
    Regular,
    LightningTalk,
    Rest,
}

impl EventDecision {
    /// Highest priority first, used to break ties between reactions.
    pub const BY_PRIORITY: [EventDecision; 3] = [
        EventDecision::LightningTalk,
        EventDecision::Regular,
        EventDecision::Rest,
    ];

    pub fn emoji(self) -> &'static str {
        match self {
            EventDecision::Regular => REGULAR_EMOJI,
            EventDecision::LightningTalk => LIGHTNING_TALK_EMOJI,
            EventDecision::Rest => REST_EMOJI,
        }
    }

    pub fn from_emoji(emoji: &str) -> Option<Self> {
        Self::BY_PRIORITY
            .into_iter()
            .find(|decision| decision.emoji() == emoji)
    }

    /// Key of the template rendered for this decision.
    pub fn template_key(self) -> &'static str {
        match self {
            EventDecision::Regular => "regular",
            EventDecision::LightningTalk => "lightning_talk",
            EventDecision::Rest => "rest",
        }
    }
}

impl fmt::Display for EventDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventDecision::Regular => write!(f, "regular meetup"),
            EventDecision::LightningTalk => write!(f, "lightning talk"),
            EventDecision::Rest => write!(f, "rest"),
        }
    }
}
