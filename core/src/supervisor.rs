use std::sync::Arc;

use indexer_gateway::{GatewayEvent, GatewaySession};
use indexer_http::Client;
use indexer_store::Store;
use indexer_types::{ApiChannel, ApiGuild, MessageSource};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::backfill::run_worker;
use crate::config::Config;
use crate::error::Result;
use crate::ingest::ingest_message;

const GUILDS_ROUTE_KEY: &str = "GET:/users/@me/guilds";
const CHANNELS_ROUTE_KEY: &str = "GET:/guilds/:guildId/channels";
const GUILDS_PAGE_LIMIT: u32 = 200;

/// Process-wide startup (§4.F): wires the rate-limited client and
/// store, resolves which guilds to index, seeds backfill state for
/// their channels, spawns the backfill worker pool, then runs the
/// gateway session forever.
pub async fn run(config: Config) -> Result<()> {
    let store = Store::connect(&config.mongodb_uri, &config.mongodb_db).await?;
    store.ensure_indexes().await?;
    info!("store connected and indexes ensured");

    let client = Arc::new(Client::new(&config.discord_api_base, &config.discord_bot_token)?);

    let guild_ids = resolve_guild_ids(&client, &config).await?;
    info!(count = guild_ids.len(), "resolved guild list");

    for guild_id in &guild_ids {
        seed_channels(&client, &store, guild_id).await;
    }

    // A single structured group for every long-running task: backfill
    // workers, the live-ingest consumer, and the gateway session
    // itself. None of them are expected to ever return — `join_next`
    // resolving is the group failing, and dropping `tasks` (on
    // cancellation or after that failure) aborts whatever's left,
    // rather than leaving fire-and-forget tasks running untracked.
    let mut tasks: JoinSet<()> = JoinSet::new();

    for worker_id in 0..config.backfill_workers {
        let client = client.clone();
        let store = store.clone();
        let page_size = config.backfill_page_size;
        let request_delay_ms = config.backfill_request_delay_ms;
        tasks.spawn(async move {
            run_worker(worker_id, client, store, page_size, request_delay_ms).await;
        });
    }
    info!(workers = config.backfill_workers, "backfill workers spawned");

    // The gateway session calls its callback synchronously, so it
    // can't await an ingest itself; instead it hands the raw payload
    // off over a channel to a dedicated task that's part of the same
    // supervised group, keeping live ingestion inside the worker
    // group instead of spawned loose per message.
    let (live_tx, mut live_rx) = mpsc::unbounded_channel::<serde_json::Value>();
    let ingest_store = store.clone();
    tasks.spawn(async move {
        while let Some(raw) = live_rx.recv().await {
            if let Err(e) = ingest_message(&ingest_store, raw, MessageSource::Live).await {
                error!(error = %e, "failed to ingest a live message");
            }
        }
    });

    let gateway = GatewaySession::new(
        config.discord_gateway_url.clone(),
        config.discord_bot_token.clone(),
        config.discord_intents,
    );
    tasks.spawn(async move {
        gateway
            .run(move |event| {
                let GatewayEvent::MessageCreate(raw) = event;
                // Receiver only goes away if its task already died;
                // nothing to do but drop the event, the dead task
                // itself surfaces through `join_next` below.
                let _ = live_tx.send(raw);
            })
            .await;
    });

    match tasks.join_next().await {
        Some(Ok(())) => warn!("a supervised task exited unexpectedly"),
        Some(Err(e)) => error!(error = %e, "a supervised task panicked"),
        None => {}
    }

    Ok(())
}

/// §4.F step 4: the configured CSV short-circuits discovery entirely;
/// otherwise page `GET /users/@me/guilds` until a short page ends it.
async fn resolve_guild_ids(client: &Client, config: &Config) -> Result<Vec<String>> {
    if !config.discord_guild_ids.is_empty() {
        return Ok(config.discord_guild_ids.clone());
    }

    let mut ids = Vec::new();
    let mut after: Option<String> = None;

    loop {
        let mut path = format!("/users/@me/guilds?limit={GUILDS_PAGE_LIMIT}");
        if let Some(after_id) = &after {
            path.push_str(&format!("&after={after_id}"));
        }

        let response = client.get(&path, GUILDS_ROUTE_KEY).await?;
        if !response.is_success() {
            warn!(status = response.status, "guild listing returned a non-2xx status; stopping discovery");
            break;
        }

        let guilds: Vec<ApiGuild> = response.json()?;
        let page_len = guilds.len();

        match guilds.last() {
            Some(last) => after = Some(last.id.clone()),
            None => break,
        }
        ids.extend(guilds.into_iter().map(|g| g.id));

        if (page_len as u32) < GUILDS_PAGE_LIMIT {
            break;
        }
    }

    Ok(ids)
}

/// §4.F step 5: enumerate a guild's channels and seed backfill state
/// for the text/announcement subset; every other channel type is
/// ignored. Failures here are logged per-guild, not fatal — a guild
/// the bot can't enumerate just never gets backfilled.
async fn seed_channels(client: &Client, store: &Store, guild_id: &str) {
    let path = format!("/guilds/{guild_id}/channels");
    let response = match client.get(&path, CHANNELS_ROUTE_KEY).await {
        Ok(response) => response,
        Err(e) => {
            error!(guild_id, error = %e, "failed to list channels");
            return;
        }
    };

    if !response.is_success() {
        warn!(guild_id, status = response.status, "channel listing returned a non-2xx status");
        return;
    }

    let channels: Vec<ApiChannel> = match response.json() {
        Ok(channels) => channels,
        Err(e) => {
            warn!(guild_id, error = %e, "failed to decode channel list");
            return;
        }
    };

    for channel in channels.iter().filter(|c| c.is_backfill_eligible()) {
        if let Err(e) = store.seed_backfill(&channel.id, Some(guild_id)).await {
            error!(guild_id, channel_id = %channel.id, error = %e, "failed to seed backfill state");
        }
    }
}
