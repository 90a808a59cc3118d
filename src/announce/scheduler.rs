use std::{fmt, sync::Arc};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use log::{debug, error, info, warn};
use tokio::sync::RwLock;

use crate::{
    cfg::{ConfigStore, ScheduleConfig, Templates},
    error::Error,
};

use super::{
    template::TemplateResolver, vote, EventDecision, LtInfo, LtInfoStore, MessageRef, Messenger,
    ReactionTally, RetryPolicy,
};

/// Working state of one confirm to announce span.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCycle {
    pub message: MessageRef,
    /// Live tally, fed by reaction events while the window is open.
    pub tally: ReactionTally,
    pub decision: Option<EventDecision>,
    pub posted_at: DateTime<Utc>,
    pub window_closes_at: DateTime<Utc>,
    /// Local date of the announcement this cycle prepares.
    pub announce_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum CycleState {
    #[default]
    Idle,
    AwaitingConfirmation(PendingCycle),
    Resolved(PendingCycle),
}

impl CycleState {
    pub fn cycle(&self) -> Option<&PendingCycle> {
        match self {
            CycleState::Idle => None,
            CycleState::AwaitingConfirmation(cycle) | CycleState::Resolved(cycle) => Some(cycle),
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleState::Idle => write!(f, "idle"),
            CycleState::AwaitingConfirmation(_) => write!(f, "awaiting confirmation"),
            CycleState::Resolved(_) => write!(f, "resolved"),
        }
    }
}

/// Instant of `time` on `date` in `tz`. A time skipped by a DST jump moves one hour later.
fn local_instant(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<DateTime<Utc>> {
    let local = date.and_time(time);
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
        .map(|instant| instant.with_timezone(&Utc))
}

/// Latest weekly occurrence of `weekday` at `time` within `(after, until]`.
pub fn occurrence_between(
    after: DateTime<Utc>,
    until: DateTime<Utc>,
    weekday: Weekday,
    time: NaiveTime,
    tz: Tz,
) -> Option<DateTime<Utc>> {
    if until <= after {
        return None;
    }

    // one occurrence a week, looking further back than that is pointless
    let start = after.max(until - Duration::days(8)).with_timezone(&tz).date_naive();
    let end = until.with_timezone(&tz).date_naive();

    start
        .iter_days()
        .take_while(|date| *date <= end)
        .filter(|date| date.weekday() == weekday)
        .filter_map(|date| local_instant(date, time, tz))
        .filter(|instant| *instant > after && *instant <= until)
        .last()
}

/// First weekly occurrence of `weekday` at `time` strictly after `after`.
pub fn next_occurrence(
    after: DateTime<Utc>,
    weekday: Weekday,
    time: NaiveTime,
    tz: Tz,
) -> Option<DateTime<Utc>> {
    after
        .with_timezone(&tz)
        .date_naive()
        .iter_days()
        .take(9)
        .filter(|date| date.weekday() == weekday)
        .filter_map(|date| local_instant(date, time, tz))
        .find(|instant| *instant > after)
}

/// Weekly confirm and announce state machine.
///
/// Nothing here waits: every timer tick, reaction event and manual command is a
/// call that evaluates the state against its input. The configuration is read
/// again on every call, so a change only affects the triggers still to come.
pub struct Scheduler {
    config: Arc<RwLock<ConfigStore>>,
    lt_info: Arc<RwLock<LtInfoStore>>,
    state: CycleState,
    last_tick: Option<DateTime<Utc>>,
    retry: RetryPolicy,
}

impl Scheduler {
    pub fn new(config: Arc<RwLock<ConfigStore>>, lt_info: Arc<RwLock<LtInfoStore>>) -> Self {
        Self {
            config,
            lt_info,
            state: CycleState::Idle,
            last_tick: None,
            retry: RetryPolicy::default(),
        }
    }

    #[cfg(test)]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    async fn snapshot(&self) -> (ScheduleConfig, Templates) {
        let store = self.config.read().await;
        (store.load(), store.templates().clone())
    }

    /// Next confirmation and announcement instants after `now`.
    pub async fn next_triggers(
        &self,
        now: DateTime<Utc>,
    ) -> (Option<DateTime<Tz>>, Option<DateTime<Tz>>) {
        let (schedule, _) = self.snapshot().await;
        let tz = schedule.timezone;
        (
            next_occurrence(now, schedule.confirm_weekday, schedule.confirm_time, tz)
                .map(|instant| instant.with_timezone(&tz)),
            next_occurrence(now, schedule.announce_weekday, schedule.announce_time, tz)
                .map(|instant| instant.with_timezone(&tz)),
        )
    }

    /// Evaluates the schedule at `now`.
    /// A trigger fires when its instant falls after the previous tick, the
    /// first tick only records where the schedule starts.
    pub async fn tick(&mut self, now: DateTime<Utc>, messenger: &dyn Messenger) {
        let Some(last) = self.last_tick.replace(now) else {
            debug!("scheduler started at {}", now);
            return;
        };
        if now <= last {
            return;
        }

        let (schedule, _) = self.snapshot().await;
        let tz = schedule.timezone;

        let window_elapsed = matches!(
            &self.state,
            CycleState::AwaitingConfirmation(cycle) if cycle.window_closes_at <= now
        );
        if window_elapsed {
            info!("reaction window closed");
            self.close_window(messenger, true).await;
        }

        let announce_due = occurrence_between(
            last,
            now,
            schedule.announce_weekday,
            schedule.announce_time,
            tz,
        );
        if let Some(at) = announce_due {
            info!("announcement time reached ({})", at.with_timezone(&tz));
            if let Err(err) = self.announce(now, messenger, None).await {
                error!("scheduled announcement failed: {}", err);
            }
        }

        let confirm_due =
            occurrence_between(last, now, schedule.confirm_weekday, schedule.confirm_time, tz);
        if let Some(at) = confirm_due {
            info!("confirmation time reached ({})", at.with_timezone(&tz));
            if let Err(err) = self.confirm(now, messenger, false).await {
                error!("scheduled confirmation failed: {}", err);
            }
        }
    }

    async fn mention(&self, messenger: &dyn Messenger, channel_id: &str, role: &str) -> String {
        match messenger.role_mention(channel_id, role).await {
            Ok(mention) => mention,
            Err(err) => {
                warn!("could not resolve the role {}: {:#}", role, err);
                role.to_string()
            }
        }
    }

    /// Posts the confirmation request and opens the reaction window.
    ///
    /// A manual confirmation is refused while a cycle is outstanding. On the
    /// schedule the outstanding cycle is stale, it is dropped once the new
    /// request is posted.
    pub async fn confirm(
        &mut self,
        now: DateTime<Utc>,
        messenger: &dyn Messenger,
        manual: bool,
    ) -> Result<MessageRef, Error> {
        if let Some(cycle) = self.state.cycle() {
            if manual {
                return Err(Error::CycleOutstanding);
            }
            warn!(
                "inconsistent state: the cycle of {} is still {}, discarding it",
                cycle.message, self.state
            );
        }

        let (schedule, templates) = self.snapshot().await;
        let tz = schedule.timezone;
        let channel = schedule.action_channel_id.as_str();
        if channel.is_empty() {
            return Err(Error::invalid(
                "channels.action_channel_id",
                channel,
                "no action channel configured",
            ));
        }

        let announce_at =
            next_occurrence(now, schedule.announce_weekday, schedule.announce_time, tz)
                .ok_or_else(|| {
                    Error::invalid(
                        "settings.announce_time",
                        schedule.announce_time,
                        "no upcoming occurrence",
                    )
                })?;
        let announce_date = announce_at.with_timezone(&tz).date_naive();

        let mention = self.mention(messenger, channel, &schedule.action_role).await;
        let content =
            TemplateResolver::new(&templates).render_confirmation(&mention, announce_date)?;

        let message = self
            .retry
            .run("posting the confirmation", || messenger.post(channel, &content))
            .await
            .map_err(|err| Error::platform("post the confirmation", err))?;
        info!("confirmation posted as {} for {}", message, announce_date);

        for decision in [
            EventDecision::Regular,
            EventDecision::LightningTalk,
            EventDecision::Rest,
        ] {
            let seeded = self
                .retry
                .run("seeding a reaction", || messenger.react(&message, decision.emoji()))
                .await;
            if let Err(err) = seeded {
                warn!("could not add {} to {}: {:#}", decision.emoji(), message, err);
            }
        }

        let window_closes_at = schedule
            .vote_window
            .and_then(|window| Duration::from_std(window).ok())
            .map(|window| (now + window).min(announce_at))
            .unwrap_or(announce_at);

        self.state = CycleState::AwaitingConfirmation(PendingCycle {
            message: message.clone(),
            tally: ReactionTally::new(),
            decision: None,
            posted_at: now,
            window_closes_at,
            announce_date,
        });

        Ok(message)
    }

    /// Resolves the outstanding vote from the reactions present on the message.
    /// A message that is gone or cannot be read counts as a missed confirmation.
    async fn close_window(&mut self, messenger: &dyn Messenger, timeout_elapsed: bool) {
        let mut cycle = match std::mem::take(&mut self.state) {
            CycleState::AwaitingConfirmation(cycle) => cycle,
            other => {
                self.state = other;
                return;
            }
        };

        let fetched = self
            .retry
            .run("fetching the confirmation reactions", || messenger.reactions(&cycle.message))
            .await;

        let decision = match fetched {
            Ok(Some(tally)) => {
                if tally.is_empty() {
                    info!("nobody voted on {}", cycle.message);
                }
                cycle.tally = tally;
                vote::resolve(&cycle.tally, timeout_elapsed)
            }
            Ok(None) => {
                warn!(
                    "confirmation {} was deleted, treating it as a missed confirmation",
                    cycle.message
                );
                EventDecision::Regular
            }
            Err(err) => {
                warn!(
                    "confirmation {} could not be retrieved ({:#}), counting it as missed",
                    cycle.message, err
                );
                EventDecision::Regular
            }
        };

        info!("next meetup on {} resolved to {}", cycle.announce_date, decision);
        cycle.decision = Some(decision);
        self.state = CycleState::Resolved(cycle);
    }

    /// Posts the announcement.
    ///
    /// An open reaction window is closed first. Without any cycle the
    /// confirmation was missed and a regular meetup is announced. `forced`
    /// replaces the decision of the cycle.
    pub async fn announce(
        &mut self,
        now: DateTime<Utc>,
        messenger: &dyn Messenger,
        forced: Option<EventDecision>,
    ) -> Result<EventDecision, Error> {
        if matches!(self.state, CycleState::AwaitingConfirmation(_)) {
            info!("closing the reaction window early");
            self.close_window(messenger, false).await;
        }

        let (schedule, templates) = self.snapshot().await;
        let tz = schedule.timezone;

        let (decision, date) = match (&self.state, forced) {
            (CycleState::Resolved(cycle), forced) => (
                forced.or(cycle.decision).unwrap_or_default(),
                cycle.announce_date,
            ),
            (_, Some(forced)) => (forced, now.with_timezone(&tz).date_naive()),
            (_, None) => {
                warn!("no confirmation cycle for this announcement, counting it as missed");
                (EventDecision::Regular, now.with_timezone(&tz).date_naive())
            }
        };

        let channel = schedule.announce_channel_id.as_str();
        if channel.is_empty() {
            return Err(Error::invalid(
                "channels.announce_channel_id",
                channel,
                "no announcement channel configured",
            ));
        }

        let lt_info = match decision {
            EventDecision::LightningTalk => self.lt_info.read().await.get_all(),
            _ => LtInfo::default(),
        };

        let rendered = TemplateResolver::new(&templates).render(
            decision,
            date,
            &lt_info,
            &schedule.default_url,
        );
        let content = match rendered {
            Ok(content) => content,
            Err(err) => {
                error!("announcement for {} aborted: {}", date, err);
                self.state = CycleState::Idle;
                return Err(err);
            }
        };

        let message = self
            .retry
            .run("posting the announcement", || messenger.post(channel, &content))
            .await
            .map_err(|err| Error::platform("post the announcement", err))?;
        info!("{} announced for {} as {}", decision, date, message);

        if decision == EventDecision::LightningTalk {
            self.lt_info.write().await.clear();
        }
        self.state = CycleState::Idle;

        Ok(decision)
    }

    /// Applies a reaction event. Returns `true` when it belongs to the open vote.
    pub fn on_reaction(&mut self, message_id: &str, emoji: &str, added: bool) -> bool {
        let CycleState::AwaitingConfirmation(cycle) = &mut self.state else {
            return false;
        };
        if cycle.message.message_id != message_id || EventDecision::from_emoji(emoji).is_none() {
            return false;
        }

        if added {
            cycle.tally.add(emoji);
        } else {
            cycle.tally.remove(emoji);
        }
        debug!(
            "reaction {} {} on {}",
            if added { "added" } else { "removed" },
            emoji,
            cycle.message
        );
        true
    }

    /// Confirmation text that would be posted at `now`.
    pub async fn preview_confirmation(
        &self,
        now: DateTime<Utc>,
        messenger: &dyn Messenger,
    ) -> Result<String, Error> {
        let (schedule, templates) = self.snapshot().await;
        let tz = schedule.timezone;
        let date = next_occurrence(now, schedule.announce_weekday, schedule.announce_time, tz)
            .map(|instant| instant.with_timezone(&tz).date_naive())
            .unwrap_or_else(|| now.with_timezone(&tz).date_naive());

        let mention = self
            .mention(messenger, &schedule.action_channel_id, &schedule.action_role)
            .await;
        TemplateResolver::new(&templates).render_confirmation(&mention, date)
    }

    /// Announcement text that would be posted at `now`, with the decision used.
    /// An open vote is read from the live tally.
    pub async fn preview_announcement(
        &self,
        now: DateTime<Utc>,
        forced: Option<EventDecision>,
    ) -> Result<(EventDecision, String), Error> {
        let (schedule, templates) = self.snapshot().await;
        let tz = schedule.timezone;

        let decision = forced.unwrap_or_else(|| match &self.state {
            CycleState::Idle => EventDecision::Regular,
            CycleState::AwaitingConfirmation(cycle) => vote::resolve(&cycle.tally, false),
            CycleState::Resolved(cycle) => cycle.decision.unwrap_or_default(),
        });

        let date = match self.state.cycle() {
            Some(cycle) => cycle.announce_date,
            None => next_occurrence(now, schedule.announce_weekday, schedule.announce_time, tz)
                .map(|instant| instant.with_timezone(&tz).date_naive())
                .unwrap_or_else(|| now.with_timezone(&tz).date_naive()),
        };

        let lt_info = match decision {
            EventDecision::LightningTalk => self.lt_info.read().await.get_all(),
            _ => LtInfo::default(),
        };

        let content = TemplateResolver::new(&templates).render(
            decision,
            date,
            &lt_info,
            &schedule.default_url,
        )?;
        Ok((decision, content))
    }
}
