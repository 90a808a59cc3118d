use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use log::debug;
use poise::serenity_prelude::{
    self as serenity, ChannelId, Http, Mentionable, MessageId, ReactionType,
};

use crate::announce::{MessageRef, Messenger, ReactionTally};

fn channel_id(id: &str) -> Result<ChannelId, anyhow::Error> {
    let id: u64 = id
        .trim()
        .parse()
        .with_context(|| format!("`{}` is not a channel id", id))?;
    if id == 0 {
        bail!("the channel id cannot be zero");
    }
    Ok(ChannelId::new(id))
}

fn message_id(id: &str) -> Result<MessageId, anyhow::Error> {
    let id: u64 = id
        .parse()
        .with_context(|| format!("`{}` is not a message id", id))?;
    if id == 0 {
        bail!("the message id cannot be zero");
    }
    Ok(MessageId::new(id))
}

fn is_not_found(err: &serenity::Error) -> bool {
    match err {
        serenity::Error::Http(err) => err.status_code().map(|code| code.as_u16()) == Some(404),
        _ => false,
    }
}

/// [`Messenger`] talking to discord through the REST api.
#[derive(Clone)]
pub struct DiscordMessenger {
    http: Arc<Http>,
}

impl DiscordMessenger {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Messenger for DiscordMessenger {
    async fn post(&self, channel: &str, content: &str) -> anyhow::Result<MessageRef> {
        let message = channel_id(channel)?
            .say(&*self.http, content)
            .await
            .context("failed to send the message")?;

        Ok(MessageRef {
            channel_id: message.channel_id.to_string(),
            message_id: message.id.to_string(),
        })
    }

    async fn react(&self, message: &MessageRef, emoji: &str) -> anyhow::Result<()> {
        channel_id(&message.channel_id)?
            .create_reaction(
                &self.http,
                message_id(&message.message_id)?,
                ReactionType::Unicode(emoji.to_string()),
            )
            .await
            .context("failed to add the reaction")?;
        Ok(())
    }

    async fn reactions(&self, message: &MessageRef) -> anyhow::Result<Option<ReactionTally>> {
        let fetched = channel_id(&message.channel_id)?
            .message(&*self.http, message_id(&message.message_id)?)
            .await;

        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(err) if is_not_found(&err) => return Ok(None),
            Err(err) => return Err(err).context("failed to fetch the message"),
        };

        let tally = ReactionTally::from_reactions(fetched.reactions.iter().filter_map(|reaction| {
            match &reaction.reaction_type {
                ReactionType::Unicode(emoji) => Some((emoji.clone(), reaction.count, reaction.me)),
                _ => None,
            }
        }));
        debug!("reactions of {}: {:?}", message, tally);

        Ok(Some(tally))
    }

    async fn role_mention(&self, channel: &str, role_name: &str) -> anyhow::Result<String> {
        let name = role_name.trim();
        if name == "@everyone" || name == "@here" {
            return Ok(name.to_string());
        }
        let name = name.trim_start_matches('@');

        let guild_id = channel_id(channel)?
            .to_channel(&*self.http)
            .await
            .context("failed to fetch the channel")?
            .guild()
            .context("the channel is not part of a guild")?
            .guild_id;

        let roles = guild_id
            .roles(&*self.http)
            .await
            .context("failed to fetch the guild roles")?;

        Ok(roles
            .values()
            .find(|role| role.name == name)
            .map(|role| role.mention().to_string())
            .unwrap_or_else(|| role_name.to_string()))
    }
}
