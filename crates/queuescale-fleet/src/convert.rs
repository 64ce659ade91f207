//! SDK record → domain type conversions.

use aws_sdk_autoscaling::types::AutoScalingGroup;
use aws_sdk_ec2::types::{Instance, InstanceStateName};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use queuescale_core::{FleetDescriptor, FleetMember, MemberState};

pub(crate) fn member_state(name: &InstanceStateName) -> Option<MemberState> {
    match name {
        InstanceStateName::Pending => Some(MemberState::Pending),
        InstanceStateName::Running => Some(MemberState::Running),
        InstanceStateName::Stopping => Some(MemberState::Stopping),
        InstanceStateName::Stopped => Some(MemberState::Stopped),
        InstanceStateName::ShuttingDown => Some(MemberState::ShuttingDown),
        InstanceStateName::Terminated => Some(MemberState::Terminated),
        _ => None,
    }
}

/// Public IP of the first network interface that has a public association.
pub(crate) fn public_ip(instance: &Instance) -> Option<String> {
    instance
        .network_interfaces()
        .iter()
        .find_map(|iface| iface.association().and_then(|a| a.public_ip()))
        .map(str::to_string)
}

/// Build a `FleetMember`, or `None` for records missing an id, a known
/// state, or a launch time.
pub(crate) fn member_from_instance(instance: &Instance, fleet: &str) -> Option<FleetMember> {
    let Some(instance_id) = instance.instance_id() else {
        warn!(fleet, "instance record without id skipped");
        return None;
    };
    let Some(state) = instance.state().and_then(|s| s.name()).and_then(member_state) else {
        debug!(instance = instance_id, "instance in unknown state skipped");
        return None;
    };
    let Some(launch_time) = instance
        .launch_time()
        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
    else {
        warn!(instance = instance_id, "instance without launch time skipped");
        return None;
    };

    Some(FleetMember {
        instance_id: instance_id.to_string(),
        public_ip: public_ip(instance),
        public_dns: instance
            .public_dns_name()
            .filter(|dns| !dns.is_empty())
            .map(str::to_string),
        launch_time,
        fleet_name: fleet.to_string(),
        state,
    })
}

/// Instance ids whose Auto Scaling record names `fleet` as its group.
///
/// Takes `(group, instance)` pairs straight from the SDK accessors, which
/// are plain or optional strings depending on the model version.
pub(crate) fn group_instance_ids<'a, G, I>(
    records: impl IntoIterator<Item = (G, I)>,
    fleet: &str,
) -> Vec<String>
where
    G: Into<Option<&'a str>>,
    I: Into<Option<&'a str>>,
{
    records
        .into_iter()
        .filter_map(|(group, id)| match (group.into(), id.into()) {
            (Some(group), Some(id)) if group == fleet => Some(id.to_string()),
            _ => None,
        })
        .collect()
}

/// Size fields are optional in some SDK model versions; absent or
/// negative values read as zero.
pub(crate) fn size(value: impl Into<Option<i32>>) -> u32 {
    value
        .into()
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

pub(crate) fn descriptor_from_group(group: &AutoScalingGroup, name: &str) -> FleetDescriptor {
    FleetDescriptor {
        name: name.to_string(),
        size: u32::try_from(group.instances().len()).unwrap_or(u32::MAX),
        min_size: size(group.min_size()),
        max_size: size(group.max_size()),
        desired_size: size(group.desired_capacity()),
    }
}
