use std::io::Write;

use anyhow::{Context, Result};
use suspense_resource::config::Config;
use suspense_resource::fetch::USER_AGENT;
use suspense_resource::{HttpFetcher, ResourceCache, ResourceKey, logging, metrics};

use output::{error_view, skeleton};
use settings::{OutputFormat, Settings};
use user::{User, user_url};

mod output;
mod render;
mod settings;
mod user;

fn init_sentry(config: &Config) -> Result<Option<sentry::ClientInitGuard>> {
    let Some(dsn) = &config.sentry_dsn else {
        return Ok(None);
    };
    let dsn = dsn.parse().context("Invalid sentry DSN")?;

    let guard = sentry::init(sentry::ClientOptions {
        dsn: Some(dsn),
        release: sentry::release_name!(),
        ..Default::default()
    });
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::get()?;
    let config = &settings.config;

    logging::init_logging(config);
    let _sentry = init_sentry(config)?;

    if let Some(statsd) = &config.metrics.statsd {
        metrics::configure_statsd(
            &config.metrics.prefix,
            statsd.as_str(),
            config.metrics.custom_tags.clone(),
        )
        .context("Failed to configure statsd")?;
    }

    if let Err(error) = run(&settings).await {
        logging::ensure_log_error(&error);
        return Err(error);
    }
    Ok(())
}

async fn run(settings: &Settings) -> Result<()> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to create HTTP client")?;
    let cache = ResourceCache::new(
        &settings.config.resources,
        HttpFetcher::<User>::new(client),
        tokio::runtime::Handle::current(),
    );

    let pretty = settings.output_format == OutputFormat::Pretty;
    let mut views = Vec::with_capacity(settings.ids.len());

    for &id in &settings.ids {
        let key = ResourceKey::from(user_url(&settings.base_url, id)?);

        let view = render::render_user(
            &cache,
            id,
            &key,
            settings.retries,
            || {
                if pretty {
                    println!("{}", skeleton());
                    std::io::stdout().flush().ok();
                }
            },
            |failure, attempt| {
                if pretty {
                    println!("{}\n    Retry {attempt}...", error_view(failure));
                }
            },
        )
        .await;

        if pretty {
            output::print_pretty(&view);
        }
        views.push(view);
    }

    tracing::debug!(stats = ?cache.stats(), "Done rendering");

    match settings.output_format {
        OutputFormat::Pretty => {}
        OutputFormat::Compact => output::print_compact(&views),
        OutputFormat::Json => output::print_json(&views)?,
    }

    Ok(())
}
