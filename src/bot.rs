use crate::{
    announce::{LtInfoStore, Scheduler},
    cfg::{Config, ConfigStore},
    commands,
    discord::DiscordMessenger,
};
use anyhow::Context;
use chrono::Utc;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use log::{debug, error, info, warn};
use poise::serenity_prelude::{
    self as serenity, ClientBuilder, GatewayIntents, Http, ReactionType,
};
use poise::CreateReply;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tokio::{
    signal,
    sync::{broadcast::Sender, Mutex, RwLock},
};

/// Delay between two evaluations of the schedule.
const TICK_INTERVAL: Duration = Duration::from_secs(30);

pub type CommandContext<'a> = poise::Context<'a, Arc<Data>, anyhow::Error>;

// User data, which is stored and accessible in all command invocations
pub struct Data {
    pub config: Arc<Config>,
    pub store: Arc<RwLock<ConfigStore>>,
    pub lt_info: Arc<RwLock<LtInfoStore>>,
    pub scheduler: Arc<Mutex<Scheduler>>,
}

pub struct Bot {
    pub data: Arc<Data>,
    pub shutdown: Receiver<()>,
    shutdown_send: Sender<()>,
}

/// Sends a message through `shutdown_send` when a stop signal is detected.
/// Used to start the bot stop sequence.
async fn wait_for_stop_signal(bot: Arc<Bot>) -> Result<(), anyhow::Error> {
    let mut shutdown = bot.shutdown.resubscribe();
    tokio::select! {
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => {
                    info!("stop signal received");
                    bot.shutdown_send
                        .send(())
                        .context("failed to send a shutdown signal")?;
                    Ok(())
                }
                Err(err) => Err(anyhow::anyhow!(err)),
            }
        },
        _ = shutdown.recv() => { Ok(()) }
    }
}

/// Evaluates the schedule every [`TICK_INTERVAL`] until shutdown.
async fn scheduler_task(bot: Arc<Bot>, http: Arc<Http>) -> Result<(), anyhow::Error> {
    let mut shutdown = bot.shutdown.resubscribe();
    let messenger = DiscordMessenger::new(http);
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                bot.data.scheduler.lock().await.tick(Utc::now(), &messenger).await;
            },
            _ = shutdown.recv() => {
                debug!("scheduler stopped");
                return Ok(());
            }
        }
    }
}

/// Feeds reactions on the open confirmation request to the scheduler.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Arc<Data>,
) -> Result<(), anyhow::Error> {
    let (reaction, added) = match event {
        serenity::FullEvent::ReactionAdd { add_reaction } => (add_reaction, true),
        serenity::FullEvent::ReactionRemove { removed_reaction } => (removed_reaction, false),
        serenity::FullEvent::Ready { data_about_bot } => {
            info!("connected as {}", data_about_bot.user.name);
            return Ok(());
        }
        _ => return Ok(()),
    };

    let bot_id = ctx.cache.current_user().id;
    if reaction.user_id == Some(bot_id) {
        return Ok(());
    }
    let ReactionType::Unicode(emoji) = &reaction.emoji else {
        return Ok(());
    };

    data.scheduler
        .lock()
        .await
        .on_reaction(&reaction.message_id.to_string(), emoji, added);
    Ok(())
}

async fn on_error(error: poise::FrameworkError<'_, Arc<Data>, anyhow::Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {:?}", error);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            let f = CreateReply::default()
                .ephemeral(true)
                .content(format!("{:#}", error));
            std::mem::drop(ctx.send(f).await);
            error!("Error in command `{}`: {:?}", ctx.command().qualified_name, error);
        }
        poise::FrameworkError::CommandCheckFailed { error, ctx, .. } => {
            let f = CreateReply::default()
                .ephemeral(true)
                .content("You are not allowed to use this command.");
            std::mem::drop(ctx.send(f).await);
            let required: Vec<String> =
                commands::required_permissions(&ctx.command().qualified_name)
                    .iter()
                    .map(|permission| permission.to_string())
                    .collect();
            warn!(
                "`{}` denied to {}, requires one of [{}]{}",
                ctx.command().qualified_name,
                ctx.author().name,
                required.join(", "),
                error.map(|e| format!(": {:#}", e)).unwrap_or_default()
            );
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

impl Bot {
    pub async fn new(config: Arc<Config>, store: ConfigStore) -> Result<Arc<Self>, anyhow::Error> {
        // Theses signals are used to stop the many tasks trigered.
        // this is called by the task listening for a stop signal.
        let (shutdown_send, shutdown) = tokio::sync::broadcast::channel(1);

        let store = Arc::new(RwLock::new(store));
        let lt_info = Arc::new(RwLock::new(LtInfoStore::new()));
        let scheduler = Arc::new(Mutex::new(Scheduler::new(store.clone(), lt_info.clone())));

        let data = Arc::new(Data {
            config: config.clone(),
            store,
            lt_info,
            scheduler,
        });

        Ok(Arc::new(Self {
            data,
            shutdown,
            shutdown_send,
        }))
    }

    pub async fn start(self: Arc<Self>) -> Result<(), anyhow::Error> {
        let mut shutdown = self.shutdown.resubscribe();
        let mut tasks = FuturesUnordered::new();

        let options = poise::FrameworkOptions {
            commands: commands::all(),
            command_check: Some(|ctx| Box::pin(commands::check_permissions(ctx))),
            event_handler: |ctx, event, _framework, data| Box::pin(event_handler(ctx, event, data)),
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        };
        let data = self.data.clone();
        let framework = poise::Framework::builder()
            .options(options)
            .setup(move |ctx, _ready, framework| {
                Box::pin(async move {
                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                    Ok(data)
                })
            })
            .build();
        let client = ClientBuilder::new(
            self.data.config.discord_token.clone(),
            GatewayIntents::non_privileged(),
        )
        .framework(framework);

        let mut client = client.await.context("failed to create the discord client")?;
        let http = client.http.clone();

        tasks.push(tokio::spawn(async move {
            // wait until the bot terminates or a shutdown signal is received.
            tokio::select! {
                result = client.start_autosharded() => {
                    if let Err(err) = result {
                        error!("Client error: {}", err);
                    }
                },
                _ = shutdown.recv() => {
                    // shutdown the bot properly
                    client.shard_manager.shutdown_all().await;
                }
            };
        }));
        let self_clone = self.clone();
        tasks.push(tokio::spawn(async {
            if let Err(err) = scheduler_task(self_clone, http).await {
                error!("scheduler error: {:#}", err);
            }
        }));
        let self_clone = self.clone();
        tasks.push(tokio::spawn(async {
            let _ = wait_for_stop_signal(self_clone).await;
        }));

        // wait for a task to finish.
        let task = tasks
            .next()
            .await
            .context("no tasks started, illegal state")?
            .context("failed to join task");

        // when a task is finished, we must terminate all the others,
        // hence we send a signal talling all tasks to stop processing
        // and return.
        let _ = self.shutdown_send.send(());

        while let Some(operation) = tasks.next().await {
            operation.context("failed to join task")?;
        }

        task?;
        Ok(())
    }
}
