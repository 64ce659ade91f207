use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::info;

use queuescale_autoscale::{Controller, CycleOptions, CycleReport, ShutdownOutcome};
use queuescale_broker::FlowerBroker;
use queuescale_core::ScaleConfig;
use queuescale_fleet::AwsFleet;

pub async fn run(fleet_name: &str, broker_url: &str) -> anyhow::Result<()> {
    let config = ScaleConfig::load().context("loading configuration")?;
    let options = CycleOptions::from_config(&config)?;

    let broker = FlowerBroker::new(broker_url, config.request_timeout()?)?;
    let fleet = AwsFleet::connect(config.region.clone()).await;
    let controller = Controller::new(
        fleet_name,
        config.queue_name(),
        Arc::new(broker),
        Arc::new(fleet),
    );
    info!(
        fleet = fleet_name,
        queue = config.queue_name(),
        dry_run = options.dry_run,
        "starting cycle"
    );

    let report = match controller.run_cycle(&options).await {
        Ok(report) => report,
        Err(e) => {
            print_shutdowns(&e.report);
            return Err(anyhow::Error::new(e).context(format!("balancing fleet \"{fleet_name}\"")));
        }
    };

    for line in report_lines(&report) {
        println!("{line}");
    }
    print_failures(&report);

    if !report.is_success() {
        let attempted = report.failed.len() + report.shut_down.len();
        bail!("{} of {attempted} shutdowns failed", report.failed.len());
    }
    Ok(())
}

/// Shutdowns carried out by a cycle that aborted before finishing.
fn print_shutdowns(report: &CycleReport) {
    for line in shutdown_lines(report) {
        println!("{line}");
    }
    print_failures(report);
}

fn print_failures(report: &CycleReport) {
    for failed in &report.failed {
        eprintln!("Failed to shut down {}: {}", failed.instance_id, failed.error);
    }
}

fn shutdown_lines(report: &CycleReport) -> Vec<String> {
    report
        .shut_down
        .iter()
        .map(|outcome| match outcome {
            ShutdownOutcome::Terminated(id) => format!("Shutting down: {id}"),
            ShutdownOutcome::WouldTerminate(id) => format!("Would shut down: {id}"),
        })
        .collect()
}

/// Operator-facing summary of a cycle.
fn report_lines(report: &CycleReport) -> Vec<String> {
    let mut lines = shutdown_lines(report);
    lines.push("Auto balancing fleet...".to_string());
    if let Some(desired) = report.desired {
        lines.push(format!("Desired changed to {desired}"));
    }
    lines
}
