use crate::bot::CommandContext;

use super::reply;

#[poise::command(
    slash_command,
    guild_only,
    rename = "lt",
    description_localized("en-US", "Manage the details of the next lightning talk"),
    subcommands("speaker", "title", "url", "info", "clear")
)]
pub async fn lt(_: CommandContext<'_>) -> Result<(), anyhow::Error> {
    Ok(())
}

/// Set the speaker of the next lightning talk
#[poise::command(slash_command)]
pub async fn speaker(
    ctx: CommandContext<'_>,
    #[description = "Name of the speaker"] name: String,
) -> Result<(), anyhow::Error> {
    ctx.data().lt_info.write().await.set_speaker(&name)?;
    reply(ctx, format!("Speaker set to **{}**", name.trim())).await
}

/// Set the title of the next lightning talk
#[poise::command(slash_command)]
pub async fn title(
    ctx: CommandContext<'_>,
    #[description = "Title of the talk"] title: String,
) -> Result<(), anyhow::Error> {
    ctx.data().lt_info.write().await.set_title(&title)?;
    reply(ctx, format!("Title set to **{}**", title.trim())).await
}

/// Set the event url of the next lightning talk
#[poise::command(slash_command)]
pub async fn url(
    ctx: CommandContext<'_>,
    #[description = "Event page of the talk"] url: String,
) -> Result<(), anyhow::Error> {
    ctx.data().lt_info.write().await.set_url(&url)?;
    reply(ctx, format!("URL set to <{}>", url.trim())).await
}

/// Show the details of the next lightning talk
#[poise::command(slash_command)]
pub async fn info(ctx: CommandContext<'_>) -> Result<(), anyhow::Error> {
    let info = ctx.data().lt_info.read().await.get_all();

    let mut response = info.to_string();
    if !info.is_empty() {
        response += if info.is_complete() {
            "\nAll details are set."
        } else {
            "\nSome details are missing, they will be left empty in the announcement."
        };
    }

    reply(ctx, response).await
}

/// Forget the details of the next lightning talk
#[poise::command(slash_command)]
pub async fn clear(ctx: CommandContext<'_>) -> Result<(), anyhow::Error> {
    ctx.data().lt_info.write().await.clear();
    reply(ctx, "Lightning talk details cleared").await
}
