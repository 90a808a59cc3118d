use chrono::Utc;

use crate::{announce::EventDecision, bot::CommandContext, discord::DiscordMessenger};

use super::{manual::DecisionChoice, reply};

#[poise::command(
    slash_command,
    guild_only,
    rename = "test",
    description_localized("en-US", "Preview the messages without posting them"),
    subcommands("confirm", "announce")
)]
pub async fn test(_: CommandContext<'_>) -> Result<(), anyhow::Error> {
    Ok(())
}

/// Preview the confirmation request
#[poise::command(slash_command)]
pub async fn confirm(ctx: CommandContext<'_>) -> Result<(), anyhow::Error> {
    let messenger = DiscordMessenger::new(ctx.serenity_context().http.clone());
    let content = ctx
        .data()
        .scheduler
        .lock()
        .await
        .preview_confirmation(Utc::now(), &messenger)
        .await?;

    reply(ctx, format!("**Preview of the confirmation request**\n\n{}", content)).await
}

/// Preview the announcement
#[poise::command(slash_command)]
pub async fn announce(
    ctx: CommandContext<'_>,
    #[description = "Kind of meetup to preview, the current vote by default"]
    kind: Option<DecisionChoice>,
) -> Result<(), anyhow::Error> {
    let (decision, content) = ctx
        .data()
        .scheduler
        .lock()
        .await
        .preview_announcement(Utc::now(), kind.map(EventDecision::from))
        .await?;

    reply(
        ctx,
        format!("**Preview of the {} announcement**\n\n{}", decision, content),
    )
    .await
}
