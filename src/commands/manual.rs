use chrono::Utc;

use crate::{announce::EventDecision, bot::CommandContext, discord::DiscordMessenger};

use super::reply;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum DecisionChoice {
    #[name = "regular"]
    Regular,
    #[name = "lt"]
    LightningTalk,
    #[name = "rest"]
    Rest,
}

impl From<DecisionChoice> for EventDecision {
    fn from(choice: DecisionChoice) -> Self {
        match choice {
            DecisionChoice::Regular => EventDecision::Regular,
            DecisionChoice::LightningTalk => EventDecision::LightningTalk,
            DecisionChoice::Rest => EventDecision::Rest,
        }
    }
}

#[poise::command(
    slash_command,
    guild_only,
    rename = "manual",
    description_localized("en-US", "Run a step of the weekly cycle now"),
    subcommands("confirm", "announce")
)]
pub async fn manual(_: CommandContext<'_>) -> Result<(), anyhow::Error> {
    Ok(())
}

/// Post the confirmation request now
#[poise::command(slash_command)]
pub async fn confirm(ctx: CommandContext<'_>) -> Result<(), anyhow::Error> {
    ctx.defer_ephemeral().await?;

    let messenger = DiscordMessenger::new(ctx.serenity_context().http.clone());
    let message = ctx
        .data()
        .scheduler
        .lock()
        .await
        .confirm(Utc::now(), &messenger, true)
        .await?;

    reply(ctx, format!("Confirmation request posted ({})", message)).await
}

/// Post the announcement now, closing the vote if it is still open
#[poise::command(slash_command)]
pub async fn announce(
    ctx: CommandContext<'_>,
    #[description = "Force the kind of meetup instead of the vote result"]
    kind: Option<DecisionChoice>,
) -> Result<(), anyhow::Error> {
    ctx.defer_ephemeral().await?;

    let messenger = DiscordMessenger::new(ctx.serenity_context().http.clone());
    let decision = ctx
        .data()
        .scheduler
        .lock()
        .await
        .announce(Utc::now(), &messenger, kind.map(EventDecision::from))
        .await?;

    reply(ctx, format!("Announcement posted as a {}", decision)).await
}
