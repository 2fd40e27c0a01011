use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;

use lib_vanity::core::notify::LogSink;
use lib_vanity::core::registry::Registry;
use lib_vanity::core::requests::RequestHandler;
use lib_vanity::core::scheduler::{Registries, Scheduler};
use lib_vanity::remote::availability::HttpAvailabilityClient;
use lib_vanity::remote::channel::RestChannelSink;
use lib_vanity::remote::claim::HttpClaimClient;
use lib_vanity::remote::scopes::RestScopeDirectory;
use lib_vanity::retrieve::ky_http::Transport;

mod vanity_logic;
use vanity_logic::config::{self, NotifyMode};
use vanity_logic::console::Console;
use vanity_logic::logger;
use vanity_logic::sink::Sink;

async fn terminate_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
            }
            Err(e) => {
                log::warn!("Could not install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        // On non-unix platforms, just wait forever.
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let settings = config::load_config().into_settings()?;
    logger::setup_logging(&settings.log_dir, &settings.log_level)?;
    log::debug!("Settings: {:?}", settings);

    let proxies = Arc::new(settings.load_proxies().context("Invalid proxy configuration")?);
    if proxies.is_empty() {
        log::warn!("No proxies configured. All checks use direct egress.");
    } else {
        log::info!("Loaded {} proxies.", proxies.len());
    }

    let base_url = settings.api_base_url.as_str();
    let timeout = settings.request_timeout;

    let transport = Arc::new(Transport::new(timeout)?);
    let availability = Arc::new(HttpAvailabilityClient::new(base_url, transport.clone())?);
    let scopes = Arc::new(RestScopeDirectory::new(base_url, &settings.token, timeout)?);
    let claimer = Arc::new(HttpClaimClient::new(
        base_url,
        &settings.token,
        timeout,
        transport.clone(),
        proxies.clone(),
        scopes.clone(),
    )?);
    let sink = Arc::new(match settings.notify {
        NotifyMode::Rest => Sink::Rest(RestChannelSink::new(base_url, &settings.token, timeout)?),
        NotifyMode::Log => Sink::Log(LogSink),
    });

    let mut registries = Registries {
        watches: Registry::load(&settings.watch_registry_path),
        autoclaims: Registry::load(&settings.autoclaim_registry_path),
    };
    log::info!(
        "Loaded {} watches and {} auto-claims.",
        registries.watches.len(),
        registries.autoclaims.len()
    );

    let scheduler = Scheduler::new(availability.clone(), claimer, sink, proxies.clone(), settings.check_interval);
    let console = Console::new(RequestHandler::new(availability, scopes, proxies), settings.console.clone());

    let mut ticker = scheduler.ticker();
    // The first tick of a tokio interval completes immediately.
    ticker.tick().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let shutdown = async {
        tokio::select! {
            _ = signal::ctrl_c() => log::info!("Ctrl-C received, initiating shutdown."),
            _ = terminate_signal() => log::info!("SIGTERM received, initiating shutdown."),
        }
    };
    tokio::pin!(shutdown);

    log::info!(
        "Monitoring started (interval {}s). Type ,help for commands.",
        scheduler.interval().as_secs()
    );

    // Ticks and console commands run on this one task, so they never interleave.
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                scheduler.tick(&mut registries).await;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Some(reply) = console.execute(&mut registries, &line).await {
                        println!("{reply}");
                    }
                }
                Ok(None) => {
                    log::info!("Console input closed. Monitoring continues.");
                    stdin_open = false;
                }
                Err(e) => {
                    log::warn!("Console read failed: {}. Disabling console input.", e);
                    stdin_open = false;
                }
            },
        }
    }

    log::info!("Shutdown complete.");
    Ok(())
}
