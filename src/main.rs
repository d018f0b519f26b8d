//! story-factory: bedtime stories for kids, written by Gemini and read aloud
//! by OpenAI text-to-speech.

mod config;
mod narrator;
mod prompt;
mod render;
mod session;
mod story;
mod web;
mod writer;

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "story-factory", about = "Personalised bedtime story generator")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides server.host)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging (suppress noisy HTTP internals)
    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info,reqwest=info")
    } else {
        EnvFilter::new("info,hyper=warn,reqwest=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("story-factory starting");

    let mut config = config::Config::load(args.config.as_deref());
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let secrets = config::Secrets::load(Path::new(&config.secrets.path));

    let google_api_key = match secrets.google_api_key() {
        Ok(key) => key.to_string(),
        Err(e) => {
            error!("{e}; serving the configuration error page only");
            let message = format!(
                "The {} is missing from the secrets. Add it and restart.",
                config::GOOGLE_API_KEY
            );
            let app = web::fatal_router(config.ui.title.clone(), message);
            web::serve(app, &config.server.host, config.server.port).await?;
            return Ok(());
        }
    };

    let speech: Option<Arc<dyn narrator::SpeechSynthesizer>> = match &secrets.openai_api_key {
        Some(key) => {
            info!("Narration enabled (model: {})", config.speech.model);
            Some(Arc::new(narrator::OpenAiSpeech::new(key, &config.speech)))
        }
        None => {
            warn!("{} missing, audio narration disabled", config::OPENAI_API_KEY);
            None
        }
    };

    let writer = Arc::new(writer::GeminiWriter::new(&google_api_key, &config.gemini));
    info!("Story model: {}", config.gemini.model);

    let state = web::AppState {
        title: config.ui.title.clone(),
        model: config.gemini.model.clone(),
        sessions: Arc::new(session::SessionStore::new(
            Duration::from_secs(config.server.session_ttl_secs),
            config.ui.default_font_size,
        )),
        writer,
        speech,
        started_at: chrono::Local::now(),
    };

    web::serve(web::router(state), &config.server.host, config.server.port).await?;

    Ok(())
}
