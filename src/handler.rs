use crate::{
    config::{self, Configuration},
    constant, generation,
};
use serenity::{
    async_trait,
    client::{Context, EventHandler},
    model::prelude::{Message, Ready},
};
use std::{sync::Arc, thread::JoinHandle};
use thiserror::Error;

#[derive(Debug, Error)]
enum AskError {
    /// No deadline is applied to the pool wait, so this is never produced;
    /// it exists to keep the command's timeout message reachable from the
    /// error surface once a deadline is configured.
    #[error("the response generation timed out")]
    #[allow(dead_code)]
    TimedOut,
    #[error("the worker pool is no longer accepting requests")]
    PoolClosed,
    #[error("the worker dropped the request without replying")]
    NoReply,
}

pub struct Handler {
    _workers: Vec<JoinHandle<()>>,
    config: Configuration,
    request_tx: flume::Sender<generation::Request>,
}
impl Handler {
    pub fn new(config: Configuration, model: Box<dyn llm::Model>) -> Self {
        let (request_tx, request_rx) = flume::unbounded::<generation::Request>();

        let model: Arc<dyn llm::Model> = Arc::from(model);
        let _workers = generation::make_pool(model, config.inference.clone(), request_rx);

        Self {
            _workers,
            config,
            request_tx,
        }
    }

    /// Hands the question to the worker pool and suspends until the worker
    /// sends the response back. The wait has no timeout bound.
    async fn ask(&self, question: &str) -> Result<String, AskError> {
        let (reply_tx, reply_rx) = flume::bounded(1);
        self.request_tx
            .send(generation::Request {
                question: question.to_string(),
                reply_tx,
            })
            .map_err(|_| AskError::PoolClosed)?;

        reply_rx.recv_async().await.map_err(|_| AskError::NoReply)
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        println!("{} is connected!", ready.user.name);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let Some(question) = parse_ask(&msg.content, &self.config.commands) else {
            return;
        };
        if question.is_empty() {
            println!(
                "Ignoring {}{} invocation without a question",
                self.config.commands.prefix, self.config.commands.ask
            );
            return;
        }

        println!("Received question: {question}");

        let response = response_for(self.ask(question).await);

        if let Err(err) = msg.channel_id.say(&ctx.http, response).await {
            eprintln!("Failed to send response: {err:?}");
        }
    }
}

/// Maps the outcome of the pool wait onto the text sent to the channel.
/// Every error is converted to a fixed fallback string; nothing propagates
/// out of the message handler.
fn response_for(result: Result<String, AskError>) -> String {
    match result {
        Ok(response) => response,
        Err(AskError::TimedOut) => constant::fallback::TIMED_OUT.to_string(),
        Err(err) => {
            eprintln!("Error in ask command: {err}");
            constant::fallback::ERROR_OCCURRED.to_string()
        }
    }
}

/// Returns the question when `content` invokes the ask command, e.g.
/// `!ask why is the sky blue?`. A longer word sharing the command as a
/// prefix (`!askew ...`) does not match.
fn parse_ask<'a>(content: &'a str, commands: &config::Commands) -> Option<&'a str> {
    let invocation = content.strip_prefix(&commands.prefix)?;
    let rest = invocation.strip_prefix(&commands.ask)?;

    match rest.chars().next() {
        None => Some(""),
        Some(c) if c.is_whitespace() => Some(rest.trim()),
        Some(_) => None,
    }
}
