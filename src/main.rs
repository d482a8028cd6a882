use std::{
    process,
    sync::{Arc, OnceLock},
};

use tracing::{debug, error, info, warn};
use ulcrawler::{
    config::Config,
    core::{
        publisher::Publisher, reconciler::Reconciler, runner::JobRunner, scheduler::Scheduler,
        sources::HostSource,
    },
    logger::LoggerManager,
    print_error,
};
use ulcrawler_iota::IotaClient;

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::new().unwrap_or_else(|e| {
            print_error!("{}", e);
            process::exit(1);
        })
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config();
    let mut logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });
    info!("Starting ulcrawler version {}...", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", cfg.logger.level);
    debug!("{:#?}", cfg.transport);

    let iota = IotaClient::new(&cfg.iota.host, cfg.iota.port, cfg.iota.request_timeout())
        .unwrap_or_else(|e| {
            error!("Failed to create IoT Agent client: {}", e);
            process::exit(1);
        });
    match iota.about().await {
        Ok(about) => debug!("IoT Agent at {}: {}", iota.base_url(), about),
        Err(e) => warn!("IoT Agent at {} did not answer /iot/about: {}", iota.base_url(), e),
    }

    let scope = cfg.iota.scope();
    let reconciler = Reconciler::new(Arc::new(iota));

    if let Err(e) = reconciler
        .ensure_config_group(&scope, &cfg.iota.config_group())
        .await
    {
        error!("Failed to provision config group: {}", e);
        process::exit(1);
    }

    match cfg.iota.device() {
        Some(device) => {
            if let Err(e) = reconciler.ensure_device(&scope, &device).await {
                error!("Failed to provision device '{}': {}", device.id, e);
                process::exit(1);
            }
        }
        None => warn!("No DEVICE_ID configured, every tick will fail until one is set"),
    }

    let publisher = Arc::new(Publisher::new(cfg.transport.clone()));
    info!("Publishing to MQTT broker {}", publisher.broker().address());

    let runner = JobRunner::new(
        Arc::new(HostSource::new()),
        publisher,
        cfg.iota.api_key.clone(),
        cfg.iota.device_id.clone(),
    );

    let scheduler = Scheduler::from_config(&cfg.crawler).unwrap_or_else(|e| {
        error!("{}", e);
        process::exit(1);
    });
    info!("Crawling on schedule '{}'", cfg.crawler.schedule);

    let cancel = scheduler.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down after the current run");
            cancel.cancel();
        }
    });

    let report = scheduler.run(Arc::new(runner)).await;
    info!(
        "Shutdown complete ({} runs, {} skipped, {} failed)",
        report.runs, report.skipped, report.failures
    );
    Ok(())
}
