//! Test Request Client
//!
//! Sends sample requests to every prediction route over NATS and prints the replies.

use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// Plausible ranges of the linguistic sliders
const SLIDER_RANGES: [(&str, f64, f64); 7] = [
    ("AUX(participant)", 10.0, 120.0),
    ("VERB(participant)", 20.0, 180.0),
    ("CCONJ(participant)", 5.0, 90.0),
    ("NUM(participant)", 0.0, 40.0),
    ("PROPN(participant)", 0.0, 60.0),
    ("TTR(participant)", 0.2, 0.7),
    ("MATTR(participant)", 0.95, 1.0),
];

#[derive(Debug, Serialize)]
struct SliderRequest {
    sliders: HashMap<String, f64>,
}

#[derive(Debug, Serialize)]
struct TokenCountRequest {
    num_tokens: i64,
}

/// Request generator for testing
struct RequestGenerator {
    rng: rand::rngs::ThreadRng,
}

impl RequestGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Random subset of slider values
    fn sliders(&mut self) -> SliderRequest {
        let mut sliders = HashMap::new();
        for (name, low, high) in SLIDER_RANGES {
            if self.rng.gen_bool(0.6) {
                sliders.insert(name.to_string(), self.rng.gen_range(low..high));
            }
        }
        SliderRequest { sliders }
    }

    fn token_count(&mut self) -> TokenCountRequest {
        TokenCountRequest {
            num_tokens: self.rng.gen_range(0..2000),
        }
    }

    /// One payload per route, plus requests that must come back as errors
    fn round(&mut self) -> anyhow::Result<Vec<(&'static str, Vec<u8>)>> {
        let mut with_foreign = self.sliders();
        with_foreign.sliders.insert("not_a_feature".to_string(), 1.0);

        Ok(vec![
            ("predict", serde_json::to_vec(&self.sliders())?),
            ("predict", serde_json::to_vec(&with_foreign)?),
            ("predict_linguistic_only", serde_json::to_vec(&self.sliders())?),
            ("predict_from_token_count", serde_json::to_vec(&self.token_count())?),
            ("predict_from_token_count", br#"{"num_tokens": -1}"#.to_vec()),
            ("predict_everything", br#"{"sliders": {}}"#.to_vec()),
        ])
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_client=info".parse()?),
        )
        .init();

    info!("Starting Test Request Client");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let prefix = args.get(2).map(|s| s.as_str()).unwrap_or("ad");
    let rounds: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(5);
    let delay_ms: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(200);

    info!(
        nats_url = %nats_url,
        prefix = %prefix,
        rounds = rounds,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let mut generator = RequestGenerator::new();

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            for (route, payload) in generator.round()? {
                info!("{}.{} <- {}", prefix, route, String::from_utf8_lossy(&payload));
            }
            return Ok(());
        }
    };

    let mut failures = 0;

    for round in 0..rounds {
        for (route, payload) in generator.round()? {
            let subject = format!("{}.{}", prefix, route);
            let request = client.request(subject.clone(), payload.into());

            match tokio::time::timeout(Duration::from_secs(5), request).await {
                Ok(Ok(reply)) => {
                    info!(
                        round = round + 1,
                        subject = %subject,
                        "{}",
                        String::from_utf8_lossy(&reply.payload)
                    );
                }
                Ok(Err(e)) => {
                    failures += 1;
                    warn!(subject = %subject, error = %e, "Request failed");
                }
                Err(_) => {
                    failures += 1;
                    warn!(subject = %subject, "Request timed out");
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!("Completed {} rounds ({} transport failures)", rounds, failures);

    Ok(())
}
