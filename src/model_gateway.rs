use anyhow::Result;
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;

use crate::config::Config;
use crate::model::{self, Message};

pub struct CompletionRequest {
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub content: String,
}

pub type CompletionFuture<'a> = Pin<Box<dyn Future<Output = Result<CompletionResponse>> + Send + 'a>>;

/// Anything that can turn a role-tagged history into a reply.
pub trait CompletionGateway: Send + Sync {
    fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a>;
}

type ModelChatFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

trait ChatBackend: Send + Sync {
    fn chat<'a>(
        &'a self,
        client: &'a Client,
        cfg: &'a Config,
        messages: &'a [Message],
    ) -> ModelChatFuture<'a>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderChatBackend;

impl ChatBackend for ProviderChatBackend {
    fn chat<'a>(
        &'a self,
        client: &'a Client,
        cfg: &'a Config,
        messages: &'a [Message],
    ) -> ModelChatFuture<'a> {
        Box::pin(async move { model::chat(client, cfg, messages).await })
    }
}

pub struct HostCompletionGateway<B = ProviderChatBackend> {
    client: Client,
    cfg: Config,
    backend: B,
}

impl HostCompletionGateway<ProviderChatBackend> {
    pub fn new(client: Client, cfg: Config) -> Self {
        Self {
            client,
            cfg,
            backend: ProviderChatBackend,
        }
    }
}

impl<B> HostCompletionGateway<B> {
    #[cfg(test)]
    fn with_backend(client: Client, cfg: Config, backend: B) -> Self {
        Self {
            client,
            cfg,
            backend,
        }
    }
}

impl<B> CompletionGateway for HostCompletionGateway<B>
where
    B: ChatBackend,
{
    fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(async move {
            let content = self
                .backend
                .chat(&self.client, &self.cfg, &request.messages)
                .await?;
            Ok(CompletionResponse { content })
        })
    }
}
