//! Account name availability

use adgate_directory::Availability;
use clap::Args;
use serde_json::json;

use super::{connect, print_json};
use crate::error::CliResult;

#[derive(Args, Debug)]
pub struct AvailabilityArgs {
    /// Account name to check
    pub name: String,
}

pub async fn execute(args: AvailabilityArgs) -> CliResult<()> {
    let service = connect()?;
    let availability = service.check_availability(&args.name).await;
    service.shutdown().await;

    match availability? {
        Availability::Available => print_json(&json!({ "available": true })),
        Availability::Taken(existing) => print_json(&json!({
            "available": false,
            "conflict": existing,
        })),
    }
}
