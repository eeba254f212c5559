//! Directory connectivity check

use clap::Args;
use serde_json::json;

use super::{connect, print_json};
use crate::error::CliResult;

#[derive(Args, Debug)]
pub struct HealthArgs {}

/// Open one connection and run the liveness probe
pub async fn execute(_args: HealthArgs) -> CliResult<()> {
    let service = connect()?;
    let result = service.health_check().await;
    let status = service.pool().status().await;
    service.shutdown().await;
    result?;

    print_json(&json!({
        "status": "ok",
        "pool": {
            "capacity": status.capacity,
            "live": status.live,
        },
    }))
}
