use std::sync::Mutex;

use async_trait::async_trait;
use log::{info, warn};
use serenity::all::{ConnectionStage, Context, EventHandler, Ready, ResumedEvent, ShardStageUpdateEvent};
use tokio::sync::oneshot;

/// Gateway event handler. Hands the first ready `Context` to the price
/// update task; reconnects fire `ready` again and are only logged.
pub struct Handler {
    ready_tx: Mutex<Option<oneshot::Sender<Context>>>,
}

impl Handler {
    pub fn new(ready_tx: oneshot::Sender<Context>) -> Handler {
        Handler {
            ready_tx: Mutex::new(Some(ready_tx)),
        }
    }

    fn take_sender(&self) -> Option<oneshot::Sender<Context>> {
        match self.ready_tx.lock() {
            Ok(mut sender) => sender.take(),
            Err(_) => None,
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Bot logged in as {} (ID: {})", ready.user.name, ready.user.id);
        info!("Connected to {} guilds", ready.guilds.len());
        if let Some(sender) = self.take_sender() {
            if sender.send(ctx).is_err() {
                warn!("Price update task is gone, not starting it");
            }
        }
    }

    async fn resume(&self, _ctx: Context, _event: ResumedEvent) {
        info!("Bot resumed connection to Discord");
    }

    async fn shard_stage_update(&self, _ctx: Context, event: ShardStageUpdateEvent) {
        if event.new == ConnectionStage::Disconnected {
            warn!("Bot disconnected from Discord");
        }
    }
}
