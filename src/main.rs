use anyhow::Context as AnyhowContext;
use serenity::{model::gateway::GatewayIntents, Client};

mod config;
mod constant;
mod generation;
mod handler;

use config::Configuration;
use handler::Handler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Configuration::load()?;

    println!("Loading model and tokenizer...");
    let model = load_model(&config.model)?;
    println!("Model and tokenizer loaded.");

    let token = config
        .authentication
        .discord_token
        .as_deref()
        .context("Expected authentication.discord_token to be filled in config")?
        .to_string();

    // Message content is a privileged intent; the bot reads `!ask` out of
    // plain channel messages.
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(token, intents)
        .event_handler(Handler::new(config.clone(), model))
        .await
        .context("Error creating client")?;

    if let Err(why) = client.start().await {
        println!("Client error: {why:?}");
    }

    Ok(())
}

fn load_model(model: &config::Model) -> anyhow::Result<Box<dyn llm::Model>> {
    let architecture: llm::ModelArchitecture = model
        .architecture
        .parse()
        .map_err(|err| anyhow::anyhow!("{err}"))
        .context("failed to parse model architecture")?;

    let tokenizer_source = match &model.tokenizer_repository {
        Some(repository) => llm::TokenizerSource::HuggingFaceRemote(repository.clone()),
        None => llm::TokenizerSource::Embedded,
    };

    let params = llm::ModelParameters {
        context_size: model.context_token_length,
        use_gpu: model.use_gpu,
        ..Default::default()
    };

    llm::load_dynamic(
        Some(architecture),
        std::path::Path::new(&model.path),
        tokenizer_source,
        params,
        llm::load_progress_callback_stdout,
    )
    .context("failed to load model")
}
