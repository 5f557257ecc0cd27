//! AD Prediction Service - Main Entry Point
//!
//! Loads the model registry, then answers prediction requests arriving over
//! NATS request/reply. Each request runs on its own task.

use ad_prediction_service::{
    config::AppConfig,
    consumer::{route_from_subject, RequestConsumer},
    models::registry::ModelRegistry,
    producer::ReplyProducer,
    router::InferenceRouter,
};
use anyhow::{Context, Result};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(
        format!("ad_prediction_service={}", config.logging.level).parse()?,
    );

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config)?;

    info!("Starting AD Prediction Service");
    info!(
        workers = config.pipeline.workers,
        timeout_ms = config.pipeline.timeout_ms,
        "Configuration loaded successfully"
    );

    // Any registry problem aborts startup; there is no partial registry
    let registry = Arc::new(
        ModelRegistry::load(&config.models).context("Failed to load model registry")?,
    );
    info!(
        models = registry.model_count(),
        models_dir = %config.models.models_dir,
        "Model registry loaded"
    );

    let router = Arc::new(InferenceRouter::new(registry));

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(
        client.clone(),
        &config.request_subject(),
        &config.nats.queue_group,
    );
    let producer = ReplyProducer::new(client.clone());

    let num_workers = config.pipeline.workers.max(1);
    let timeout = Duration::from_millis(config.pipeline.timeout_ms);
    let prefix = config.nats.subject_prefix.clone();
    info!(
        "Listening on subject {} with {} parallel workers",
        consumer.subject(),
        num_workers
    );

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));

    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        let Some(reply_to) = message.reply.clone() else {
            warn!(subject = %message.subject, "Request without reply subject, dropping");
            continue;
        };

        // Acquire permit (limits concurrent tasks)
        let permit = semaphore.clone().acquire_owned().await?;

        let router = router.clone();
        let producer = producer.clone();
        let route = route_from_subject(&message.subject, &prefix).to_string();
        let request_id = uuid::Uuid::new_v4();
        let span = info_span!("request", request_id = %request_id, route = %route);

        tokio::spawn(
            async move {
                let start_time = Instant::now();

                // The permit travels with the scoring call and is released
                // when it finishes, not when the reply goes out
                let outcome = router
                    .handle_with_timeout(&route, message.payload.to_vec(), timeout, permit)
                    .await;

                if let Err(e) = producer.reply(reply_to, &outcome).await {
                    error!(error = %e, "Failed to publish reply");
                } else {
                    debug!(
                        ok = outcome.is_ok(),
                        processing_time_us = start_time.elapsed().as_micros(),
                        "Request answered"
                    );
                }
            }
            .instrument(span),
        );
    }

    info!("Service shutting down...");

    Ok(())
}
