//! `FleetManager` over the AWS Auto Scaling and EC2 APIs.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_autoscaling::config::Region;
use aws_sdk_autoscaling::error::DisplayErrorContext;
use aws_sdk_ec2::types::Filter;
use tracing::{debug, info};

use queuescale_core::{FleetDescriptor, FleetManager, FleetMember, ScaleError, ScaleResult};

use crate::convert::{descriptor_from_group, group_instance_ids, member_from_instance};

fn fleet_error(operation: &str, e: impl std::error::Error) -> ScaleError {
    ScaleError::Fleet(format!("{operation}: {}", DisplayErrorContext(e)))
}

/// Fleet manager for one AWS account and region.
#[derive(Debug, Clone)]
pub struct AwsFleet {
    autoscaling: aws_sdk_autoscaling::Client,
    ec2: aws_sdk_ec2::Client,
}

impl AwsFleet {
    /// Build clients from the default provider chain, optionally pinning
    /// the region.
    pub async fn connect(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;
        Self::from_conf(&config)
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self {
            autoscaling: aws_sdk_autoscaling::Client::new(config),
            ec2: aws_sdk_ec2::Client::new(config),
        }
    }

    /// Ids of the instances Auto Scaling currently counts as members of
    /// `fleet`. Walks every `DescribeAutoScalingInstances` page.
    async fn member_ids(&self, fleet: &str) -> ScaleResult<Vec<String>> {
        let mut pages = self
            .autoscaling
            .describe_auto_scaling_instances()
            .into_paginator()
            .send();

        let mut ids = Vec::new();
        let mut page_count = 0usize;
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| fleet_error("DescribeAutoScalingInstances", e))?;
            page_count += 1;
            ids.extend(group_instance_ids(
                page.auto_scaling_instances()
                    .iter()
                    .map(|d| (d.auto_scaling_group_name(), d.instance_id())),
                fleet,
            ));
        }

        debug!(fleet, pages = page_count, instances = ids.len(), "listed group instances");
        Ok(ids)
    }
}

#[async_trait]
impl FleetManager for AwsFleet {
    async fn list_running_members(&self, fleet: &str) -> ScaleResult<Vec<FleetMember>> {
        let ids = self.member_ids(fleet).await?;
        if ids.is_empty() {
            debug!(fleet, "fleet has no instances");
            return Ok(Vec::new());
        }

        let mut pages = self
            .ec2
            .describe_instances()
            .set_instance_ids(Some(ids))
            .filters(
                Filter::builder()
                    .name("instance-state-name")
                    .values("running")
                    .build(),
            )
            .into_paginator()
            .send();

        let mut members = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| fleet_error("DescribeInstances", e))?;
            members.extend(
                page.reservations()
                    .iter()
                    .flat_map(|r| r.instances())
                    .filter_map(|instance| member_from_instance(instance, fleet))
                    .filter(FleetMember::is_running),
            );
        }

        debug!(fleet, members = members.len(), "listed running members");
        Ok(members)
    }

    async fn describe_fleet(&self, fleet: &str) -> ScaleResult<FleetDescriptor> {
        let resp = self
            .autoscaling
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(fleet)
            .send()
            .await
            .map_err(|e| fleet_error("DescribeAutoScalingGroups", e))?;

        let group = resp
            .auto_scaling_groups()
            .first()
            .ok_or_else(|| ScaleError::FleetNotFound(fleet.to_string()))?;
        Ok(descriptor_from_group(group, fleet))
    }

    async fn terminate_and_decrement(&self, instance_id: &str) -> ScaleResult<()> {
        self.autoscaling
            .terminate_instance_in_auto_scaling_group()
            .instance_id(instance_id)
            .should_decrement_desired_capacity(true)
            .send()
            .await
            .map_err(|e| fleet_error("TerminateInstanceInAutoScalingGroup", e))?;
        info!(instance = instance_id, "termination requested");
        Ok(())
    }

    async fn set_desired_size(&self, fleet: &str, desired: u32) -> ScaleResult<()> {
        let desired = i32::try_from(desired)
            .map_err(|_| ScaleError::Fleet(format!("desired size {desired} out of range")))?;
        self.autoscaling
            .set_desired_capacity()
            .auto_scaling_group_name(fleet)
            .desired_capacity(desired)
            .send()
            .await
            .map_err(|e| fleet_error("SetDesiredCapacity", e))?;
        Ok(())
    }
}
