use std::time::Duration;

use anyhow::{bail, Result};
use dog_rowq::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize)]
struct HttpResponse {
    body: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let queue = Queue::<HttpResponse>::open_local("events")
        .await?
        .with_retry_backoff(Duration::from_secs(5))
        .with_max_retries(5)
        .with_lease_duration(Duration::from_secs(1));

    info!(location = %queue.location(), "Opened queue");

    for i in 1..=10 {
        queue
            .insert(&HttpResponse {
                body: format!("Hello from event {i}"),
            })
            .await?;
    }

    while queue.size().await? > 0 {
        let Some(event) = queue.next().await? else {
            info!("No events available for pick up, sleeping");
            tokio::time::sleep(Duration::from_secs(2)).await;
            continue;
        };

        // Roughly one in five events succeeds; the rest go back for a retry.
        if rand::thread_rng().gen_bool(0.2) {
            info!(job_id = %event.id, body = %event.content.body, "Acking event");
            if let Err(e) = queue.ack(event.id).await {
                warn!(job_id = %event.id, "Problem acking, will retry: {}", e);
            }
        } else {
            info!(job_id = %event.id, body = %event.content.body, "Nacking event");
            if let Err(e) = queue.nack(event.id).await {
                warn!(job_id = %event.id, "Problem nacking, will retry: {}", e);
            }
        }
    }

    let remaining = queue.size().await?;
    if remaining > 0 {
        bail!("queue is not empty, {remaining} events remain");
    }

    let metrics = queue.metrics().snapshot();
    info!(
        acked = metrics.jobs_acked,
        nacked = metrics.jobs_nacked,
        "Event queue cleared"
    );

    queue.shutdown().await;
    Ok(())
}
