use chrono::Utc;
use poise::CreateReply;

use crate::{
    announce::{CycleState, EventDecision},
    bot::CommandContext,
    cfg::Permission,
};

pub mod config;
pub mod lt;
pub mod manual;
pub mod preview;

/// Permissions required for each command path, a path also covers its subcommands.
/// Commands absent from the table are open to everyone.
pub const COMMAND_PERMISSIONS: &[(&str, &[Permission])] = &[
    ("config", &[Permission::Admin, Permission::Moderator]),
    ("manual", &[Permission::Admin, Permission::Moderator]),
    ("test", &[Permission::Admin, Permission::Moderator]),
    (
        "lt",
        &[Permission::Admin, Permission::Moderator, Permission::LtAdmin],
    ),
];

pub fn required_permissions(qualified_name: &str) -> &'static [Permission] {
    COMMAND_PERMISSIONS
        .iter()
        .find(|(path, _)| {
            qualified_name == *path
                || qualified_name
                    .strip_prefix(path)
                    .is_some_and(|rest| rest.starts_with(' '))
        })
        .map(|(_, permissions)| *permissions)
        .unwrap_or(&[])
}

/// Every command registered by the bot.
pub fn all() -> Vec<poise::Command<std::sync::Arc<crate::bot::Data>, anyhow::Error>> {
    vec![
        help(),
        status(),
        lt::lt(),
        config::config(),
        manual::manual(),
        preview::test(),
    ]
}

/// Checks the role names of the invoking member against [`COMMAND_PERMISSIONS`].
pub async fn check_permissions(ctx: CommandContext<'_>) -> Result<bool, anyhow::Error> {
    let required = required_permissions(&ctx.command().qualified_name);
    if required.is_empty() {
        return Ok(true);
    }

    let Some(member) = ctx.author_member().await else {
        return Ok(false);
    };
    let role_names: Vec<String> = match ctx.guild() {
        Some(guild) => member
            .roles
            .iter()
            .filter_map(|id| guild.roles.get(id))
            .map(|role| role.name.clone())
            .collect(),
        None => return Ok(false),
    };

    let allowed = ctx
        .data()
        .store
        .read()
        .await
        .permissions()
        .allows(required, &role_names);
    Ok(allowed)
}

/// Answers privately to the invoking user.
pub async fn reply(
    ctx: CommandContext<'_>,
    content: impl Into<String>,
) -> Result<(), anyhow::Error> {
    ctx.send(CreateReply::default().ephemeral(true).content(content))
        .await?;
    Ok(())
}

/// Show help about the bot commands
#[poise::command(slash_command, track_edits)]
pub async fn help(
    ctx: CommandContext<'_>,
    #[description = "Command to get help for"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> Result<(), anyhow::Error> {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            ephemeral: true,
            extra_text_at_bottom: "The weekly confirmation and announcement are automatic.",
            ..Default::default()
        },
    )
    .await?;
    Ok(())
}

/// Show the state of the weekly cycle
#[poise::command(slash_command, guild_only)]
pub async fn status(ctx: CommandContext<'_>) -> Result<(), anyhow::Error> {
    let data = ctx.data();
    let now = Utc::now();

    let mut response = String::from("**Announcement status**\n");
    {
        let scheduler = data.scheduler.lock().await;
        let state = scheduler.state();
        response += &format!("State: {}\n", state);

        match state {
            CycleState::AwaitingConfirmation(cycle) => {
                let votes: Vec<String> = EventDecision::BY_PRIORITY
                    .iter()
                    .map(|decision| {
                        let emoji = decision.emoji();
                        format!("{} {}", emoji, cycle.tally.count(emoji))
                    })
                    .collect();
                response += &format!(
                    "Confirmation posted <t:{}:R>\nVotes: {}\nWindow closes <t:{}:R>\n",
                    cycle.posted_at.timestamp(),
                    votes.join(" "),
                    cycle.window_closes_at.timestamp()
                );
            }
            CycleState::Resolved(cycle) => {
                response += &format!(
                    "Decision for {}: {}\n",
                    cycle.announce_date,
                    cycle.decision.unwrap_or_default()
                );
            }
            CycleState::Idle => {}
        }

        let (confirm, announce) = scheduler.next_triggers(now).await;
        if let Some(confirm) = confirm {
            response += &format!(
                "Next confirmation: {} (<t:{}:R>)\n",
                confirm.format("%a %Y-%m-%d %H:%M %Z"),
                confirm.timestamp()
            );
        }
        if let Some(announce) = announce {
            response += &format!(
                "Next announcement: {} (<t:{}:R>)\n",
                announce.format("%a %Y-%m-%d %H:%M %Z"),
                announce.timestamp()
            );
        }
    }

    let info = data.lt_info.read().await.get_all();
    response += &format!(
        "Lightning talk details: {}",
        if info.is_complete() {
            "complete"
        } else if info.is_empty() {
            "not set"
        } else {
            "incomplete"
        }
    );

    reply(ctx, response).await
}

#[cfg(test)]
mod test {
    use crate::cfg::Permission;

    use super::required_permissions;

    #[test]
    fn permissions_cover_subcommands() {
        assert_eq!(
            required_permissions("config time confirm"),
            &[Permission::Admin, Permission::Moderator]
        );
        assert_eq!(required_permissions("lt speaker").len(), 3);
        assert!(required_permissions("status").is_empty());
        assert!(required_permissions("help").is_empty());
        // prefix of a word is not a match
        assert!(required_permissions("ltx").is_empty());
    }
}
