use std::sync::Arc;

use anyhow::{Context, Result};

use crate::catalog;
use crate::config;
use crate::data::{self, CatalogService};
use crate::host;
use crate::ui;
use crate::video;

pub fn run() -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let config_path = config::default_path();
    let display_path = friendly_path(config_path.as_ref());

    let host = host::Hooks {
        app_state: Some(Box::new(host::LogReporter)),
        splash: Some(Box::new(host::LogSplashScreen)),
    };
    // Hold the splash as early as possible; it is released only after the
    // first content paint has been reported.
    host.prevent_splash_auto_hide();

    let (catalog_service, status): (Option<Arc<dyn CatalogService + Send + Sync>>, String) =
        match catalog::Client::new(catalog::ClientConfig {
            feed_url: cfg.catalog.feed_url.clone(),
            user_agent: cfg.catalog.user_agent.clone(),
            fetch_timeout: Some(cfg.catalog.fetch_timeout),
            http_client: None,
        }) {
            Ok(client) => (
                Some(Arc::new(data::HttpCatalogService::new(Arc::new(client)))),
                "Loading catalog…".to_string(),
            ),
            Err(err) => {
                video::debug_log(format!("catalog client unavailable: {err:#}"));
                (
                    Some(Arc::new(data::MockCatalogService)),
                    "Catalog feed unavailable; browsing offline samples.".to_string(),
                )
            }
        };

    let options = ui::Options {
        status_message: status,
        catalog_service,
        pipeline_factory: video::pipeline_factory(&cfg.player),
        host,
        config_path: display_path,
        fetch_catalog_on_start: true,
    };

    let mut model = ui::Model::new(options);
    model.run()?;

    Ok(())
}

fn friendly_path(path: Option<&std::path::PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/telly/config.yaml".to_string()
    }
}
