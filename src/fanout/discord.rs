use anyhow::Result;
use async_trait::async_trait;
use serenity::client::Context;
use serenity::http::HttpError;
use serenity::model::id::{GuildId, UserId};
use serenity::model::ModelError;
use serenity::Error as SerenityError;

use super::target::{NicknameTarget, TargetDirectory, TargetError};

/// Every guild in the gateway cache, read fresh on each call.
pub struct DiscordGuilds {
    ctx: Context,
}

impl DiscordGuilds {
    pub fn new(ctx: Context) -> DiscordGuilds {
        DiscordGuilds { ctx }
    }
}

#[async_trait]
impl TargetDirectory for DiscordGuilds {
    async fn targets(&self) -> Result<Vec<Box<dyn NicknameTarget>>> {
        let user_id = self.ctx.cache.current_user().id;
        let targets = self
            .ctx
            .cache
            .guilds()
            .into_iter()
            .map(|guild_id| {
                let name = self
                    .ctx
                    .cache
                    .guild(guild_id)
                    .map(|guild| guild.name.clone())
                    .unwrap_or_else(|| guild_id.to_string());
                Box::new(DiscordGuild {
                    ctx: self.ctx.clone(),
                    guild_id,
                    user_id,
                    name,
                }) as Box<dyn NicknameTarget>
            })
            .collect();
        Ok(targets)
    }
}

struct DiscordGuild {
    ctx: Context,
    guild_id: GuildId,
    user_id: UserId,
    name: String,
}

#[async_trait]
impl NicknameTarget for DiscordGuild {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn resolve_member(&self) -> Result<bool, TargetError> {
        match self.guild_id.member(&self.ctx, self.user_id).await {
            Ok(_) => Ok(true),
            Err(e) => match classify(&e) {
                TargetError::MemberMissing => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn set_nickname(&self, label: &str) -> Result<(), TargetError> {
        self.guild_id
            .edit_nickname(&self.ctx, Some(label))
            .await
            .map_err(|e| classify(&e))
    }
}

fn classify(err: &SerenityError) -> TargetError {
    match err {
        SerenityError::Model(ModelError::InvalidPermissions { .. }) => {
            TargetError::PermissionDenied(err.to_string())
        }
        SerenityError::Http(http) => classify_http(http, err.to_string()),
        _ => TargetError::Other(err.to_string()),
    }
}

fn classify_http(http: &HttpError, detail: String) -> TargetError {
    match http.status_code() {
        Some(status) => classify_status(status.as_u16(), detail),
        None => match http {
            HttpError::Request(_) => TargetError::Transient(detail),
            _ => TargetError::Other(detail),
        },
    }
}

fn classify_status(status: u16, detail: String) -> TargetError {
    match status {
        401 | 403 => TargetError::PermissionDenied(detail),
        404 => TargetError::MemberMissing,
        429 | 500..=599 => TargetError::Transient(detail),
        _ => TargetError::Other(detail),
    }
}
