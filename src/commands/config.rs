use chrono::Weekday;
use poise::serenity_prelude as serenity;

use crate::{
    bot::CommandContext,
    cfg::{store::weekday_name, ConfigKey},
};

use super::reply;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum WeekdayChoice {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl From<WeekdayChoice> for Weekday {
    fn from(choice: WeekdayChoice) -> Self {
        match choice {
            WeekdayChoice::Mon => Weekday::Mon,
            WeekdayChoice::Tue => Weekday::Tue,
            WeekdayChoice::Wed => Weekday::Wed,
            WeekdayChoice::Thu => Weekday::Thu,
            WeekdayChoice::Fri => Weekday::Fri,
            WeekdayChoice::Sat => Weekday::Sat,
            WeekdayChoice::Sun => Weekday::Sun,
        }
    }
}

async fn set_key(
    ctx: CommandContext<'_>,
    key: ConfigKey,
    value: &str,
) -> Result<(), anyhow::Error> {
    let (old, new) = ctx.data().store.write().await.set(key, value)?;

    let response = if old == new {
        format!("`{}` is already `{}`", key, new)
    } else {
        format!("`{}` changed from `{}` to `{}`", key, old, new)
    };
    reply(ctx, response).await
}

#[poise::command(
    slash_command,
    guild_only,
    rename = "config",
    description_localized("en-US", "Change the announcement schedule"),
    subcommands("time", "weekday", "role", "channel", "url", "show", "reset")
)]
pub async fn config(_: CommandContext<'_>) -> Result<(), anyhow::Error> {
    Ok(())
}

/// Change the time of the confirmation or the announcement
#[poise::command(slash_command, subcommands("time_confirm", "time_announce"))]
pub async fn time(_: CommandContext<'_>) -> Result<(), anyhow::Error> {
    Ok(())
}

/// Time of the confirmation request
#[poise::command(slash_command, rename = "confirm")]
pub async fn time_confirm(
    ctx: CommandContext<'_>,
    #[description = "24 hour time, HH:MM"] time: String,
) -> Result<(), anyhow::Error> {
    set_key(ctx, ConfigKey::ConfirmTime, &time).await
}

/// Time of the announcement
#[poise::command(slash_command, rename = "announce")]
pub async fn time_announce(
    ctx: CommandContext<'_>,
    #[description = "24 hour time, HH:MM"] time: String,
) -> Result<(), anyhow::Error> {
    set_key(ctx, ConfigKey::AnnounceTime, &time).await
}

/// Change the weekday of the confirmation or the announcement
#[poise::command(slash_command, subcommands("weekday_confirm", "weekday_announce"))]
pub async fn weekday(_: CommandContext<'_>) -> Result<(), anyhow::Error> {
    Ok(())
}

/// Weekday of the confirmation request
#[poise::command(slash_command, rename = "confirm")]
pub async fn weekday_confirm(
    ctx: CommandContext<'_>,
    #[description = "Day of the week"] day: WeekdayChoice,
) -> Result<(), anyhow::Error> {
    set_key(ctx, ConfigKey::ConfirmWeekday, weekday_name(day.into())).await
}

/// Weekday of the announcement
#[poise::command(slash_command, rename = "announce")]
pub async fn weekday_announce(
    ctx: CommandContext<'_>,
    #[description = "Day of the week"] day: WeekdayChoice,
) -> Result<(), anyhow::Error> {
    set_key(ctx, ConfigKey::AnnounceWeekday, weekday_name(day.into())).await
}

/// Role mentioned by the confirmation request
#[poise::command(slash_command)]
pub async fn role(
    ctx: CommandContext<'_>,
    #[description = "Role asked to vote"] role: serenity::Role,
) -> Result<(), anyhow::Error> {
    set_key(ctx, ConfigKey::ActionRole, &role.name).await
}

/// Change the channel of the confirmation or the announcement
#[poise::command(slash_command, subcommands("channel_action", "channel_announce"))]
pub async fn channel(_: CommandContext<'_>) -> Result<(), anyhow::Error> {
    Ok(())
}

/// Channel receiving the confirmation request
#[poise::command(slash_command, rename = "action")]
pub async fn channel_action(
    ctx: CommandContext<'_>,
    #[description = "Channel"] channel: serenity::Channel,
) -> Result<(), anyhow::Error> {
    set_key(ctx, ConfigKey::ActionChannel, &channel.id().to_string()).await
}

/// Channel receiving the announcement
#[poise::command(slash_command, rename = "announce")]
pub async fn channel_announce(
    ctx: CommandContext<'_>,
    #[description = "Channel"] channel: serenity::Channel,
) -> Result<(), anyhow::Error> {
    set_key(ctx, ConfigKey::AnnounceChannel, &channel.id().to_string()).await
}

/// Default url of the announcements
#[poise::command(slash_command)]
pub async fn url(
    ctx: CommandContext<'_>,
    #[description = "Event page used when no other url is set"] url: String,
) -> Result<(), anyhow::Error> {
    set_key(ctx, ConfigKey::DefaultUrl, &url).await
}

/// Show the effective configuration
#[poise::command(slash_command)]
pub async fn show(ctx: CommandContext<'_>) -> Result<(), anyhow::Error> {
    let response = {
        let store = ctx.data().store.read().await;
        let mut response = String::from("**Configuration**\n");
        for (key, value) in store.show() {
            let value = if value.is_empty() {
                "(not set)".to_string()
            } else {
                format!("`{}`", value)
            };
            let origin = if store.is_overridden(key) { "override" } else { "default" };
            response += &format!("{}: {} ({})\n", key, value, origin);
        }
        response
    };

    reply(ctx, response).await
}

/// Drop every override and go back to the default configuration
#[poise::command(slash_command)]
pub async fn reset(ctx: CommandContext<'_>) -> Result<(), anyhow::Error> {
    ctx.data().store.write().await.reset()?;
    reply(ctx, "Configuration reset to the defaults").await
}
