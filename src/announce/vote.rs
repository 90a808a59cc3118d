use std::collections::HashMap;

use log::debug;

use super::EventDecision;

/// Number of reactions per emoji on a confirmation message, the bot's own excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionTally {
    counts: HashMap<String, u64>,
}

impl ReactionTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tally from `(emoji, count, reacted_by_bot)` entries as the platform reports them.
    pub fn from_reactions<I, S>(reactions: I) -> Self
    where
        I: IntoIterator<Item = (S, u64, bool)>,
        S: Into<String>,
    {
        let mut tally = Self::new();
        for (emoji, count, me) in reactions {
            let count = if me { count.saturating_sub(1) } else { count };
            if count > 0 {
                *tally.counts.entry(emoji.into()).or_default() += count;
            }
        }
        tally
    }

    pub fn add(&mut self, emoji: &str) {
        *self.counts.entry(emoji.to_string()).or_default() += 1;
    }

    pub fn remove(&mut self, emoji: &str) {
        if let Some(count) = self.counts.get_mut(emoji) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.counts.remove(emoji);
            }
        }
    }

    pub fn count(&self, emoji: &str) -> u64 {
        self.counts.get(emoji).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.values().all(|count| *count == 0)
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for ReactionTally {
    fn from_iter<T: IntoIterator<Item = (S, u64)>>(iter: T) -> Self {
        Self::from_reactions(iter.into_iter().map(|(emoji, count)| (emoji, count, false)))
    }
}

/// Decides the event type from the reactions on the confirmation message.
///
/// A single reaction of a recognized emoji is decisive, when several are present the
/// priority is lightning talk, then regular, then rest. Without any recognized
/// reaction the meetup is a regular one, whether or not the window ran out.
pub fn resolve(tally: &ReactionTally, timeout_elapsed: bool) -> EventDecision {
    let decision = EventDecision::BY_PRIORITY
        .into_iter()
        .find(|decision| tally.count(decision.emoji()) > 0);

    match decision {
        Some(decision) => {
            debug!("vote resolved to {} from {:?}", decision, tally);
            decision
        }
        None => {
            debug!(
                "no recognized reaction (window elapsed: {}), defaulting to regular",
                timeout_elapsed
            );
            EventDecision::Regular
        }
    }
}

#[cfg(test)]
mod test {
    use crate::announce::EventDecision;

    use super::{resolve, ReactionTally};

    #[test]
    fn single_reaction_is_decisive() {
        let tally: ReactionTally = [("👍", 0), ("⚡", 1), ("💤", 0)].into_iter().collect();
        assert_eq!(resolve(&tally, true), EventDecision::LightningTalk);

        let tally: ReactionTally = [("💤", 1)].into_iter().collect();
        assert_eq!(resolve(&tally, true), EventDecision::Rest);
    }

    #[test]
    fn priority_breaks_ties() {
        let tally: ReactionTally = [("👍", 1), ("⚡", 1), ("💤", 0)].into_iter().collect();
        assert_eq!(resolve(&tally, true), EventDecision::LightningTalk);

        // not a majority vote
        let tally: ReactionTally = [("👍", 5), ("💤", 1)].into_iter().collect();
        assert_eq!(resolve(&tally, false), EventDecision::Regular);

        let tally: ReactionTally = [("👍", 1), ("⚡", 1), ("💤", 9)].into_iter().collect();
        assert_eq!(resolve(&tally, false), EventDecision::LightningTalk);
    }

    #[test]
    fn no_reaction_defaults_to_regular() {
        assert_eq!(resolve(&ReactionTally::new(), true), EventDecision::Regular);
        assert_eq!(resolve(&ReactionTally::new(), false), EventDecision::Regular);
    }

    #[test]
    fn unrecognized_emoji_are_ignored() {
        let tally: ReactionTally = [("🎉", 4), ("💤", 1)].into_iter().collect();
        assert_eq!(resolve(&tally, true), EventDecision::Rest);

        let tally: ReactionTally = [("🎉", 4)].into_iter().collect();
        assert_eq!(resolve(&tally, true), EventDecision::Regular);
    }

    #[test]
    fn bot_seeded_reactions_are_excluded() {
        // only the seeds placed by the bot
        let tally =
            ReactionTally::from_reactions([("👍", 1, true), ("⚡", 1, true), ("💤", 1, true)]);
        assert!(tally.is_empty());
        assert_eq!(resolve(&tally, true), EventDecision::Regular);

        let tally =
            ReactionTally::from_reactions([("👍", 1, true), ("⚡", 1, true), ("💤", 2, true)]);
        assert_eq!(resolve(&tally, true), EventDecision::Rest);
    }

    #[test]
    fn live_updates() {
        let mut tally = ReactionTally::new();
        tally.add("⚡");
        tally.add("👍");
        tally.remove("⚡");
        tally.remove("💤");

        assert_eq!(tally.count("⚡"), 0);
        assert_eq!(resolve(&tally, false), EventDecision::Regular);
    }
}
