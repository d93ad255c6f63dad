use std::fs::{self, OpenOptions};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config;
use crate::data::{self, FeedService, StoryService};
use crate::tuys;
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub offline: bool,
    pub channel: Option<String>,
}

pub fn run(opts: RunOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    init_logging(&cfg.ui.log_level);
    tracing::info!(version = crate::VERSION, offline = opts.offline, "starting tuys-tui");

    let feed_service: Arc<dyn FeedService>;
    let story_service: Arc<dyn StoryService>;
    let status: String;

    if opts.offline {
        let store = data::MockStore::default();
        feed_service = Arc::new(data::MockFeedService::new(store.clone()));
        story_service = Arc::new(data::MockStoryService::new(store));
        status = "Modo offline: exibindo histórias de exemplo.".to_string();
    } else {
        let client = tuys::Client::new(tuys::ClientConfig {
            base_url: Some(cfg.api.base_url.clone()),
            user_agent: cfg.api.user_agent.clone(),
            token: Some(cfg.api.token.clone()),
            timeout: Some(cfg.api.timeout),
            http_client: None,
        })
        .context("create tuys api client")?;
        let client = Arc::new(client);
        feed_service = Arc::new(data::TuysFeedService::new(client.clone()));
        story_service = Arc::new(data::TuysStoryService::new(client));
        status = format!("Conectando a {}...", cfg.api.base_url);
    }

    let options = ui::Options {
        status_message: status,
        feed_service,
        story_service,
        channel: opts.channel,
        locale: cfg.ui.locale,
        show_channel: cfg.ui.show_channel,
        notice_ttl: cfg.ui.notice_ttl,
    };

    let mut model = ui::Model::new(options);
    model.run()?;
    tracing::info!("tuys-tui exited");

    Ok(())
}

// The terminal owns stdout, so logs go to a file in the cache dir. Logging
// is best effort: without a writable cache dir the app runs unlogged.
fn init_logging(level: &str) {
    let Some(path) = config::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .try_init();
}
