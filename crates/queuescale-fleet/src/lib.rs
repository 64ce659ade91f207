//! queuescale-fleet — fleet manager backed by an AWS Auto Scaling group.
//!
//! ```text
//! AwsFleet
//!   ├── list_running_members   EC2 DescribeInstances (paginated),
//!   │                          tag aws:autoscaling:groupName + state running
//!   ├── describe_fleet         DescribeAutoScalingGroups
//!   ├── terminate_and_decrement TerminateInstanceInAutoScalingGroup
//!   │                          (ShouldDecrementDesiredCapacity = true)
//!   └── set_desired_size       SetDesiredCapacity
//! ```
//!
//! Credentials and region come from the standard AWS provider chain unless
//! a region is given explicitly.

pub mod aws;
mod convert;

pub use aws::AwsFleet;
