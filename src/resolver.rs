use crate::badge::{BadgeData, BadgeRequest};
use crate::color::ColorResolver;
use crate::error::Result;
use crate::providers::{BuildStatus, DroneProvider, PypiProvider};
use std::sync::Arc;

/// HTTP caching treatment of a rendered badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Output depends only on the request; clients may keep it indefinitely.
    Immutable,
    /// Output reflects upstream data and must be revalidated every time.
    Revalidate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBadge {
    pub data: BadgeData,
    pub cache_policy: CachePolicy,
}

/// Turns a parsed request into render input, consulting the providers for
/// the dynamic badge kinds.
#[derive(Clone)]
pub struct BadgeResolver {
    pypi: PypiProvider,
    drone: DroneProvider,
    colors: Arc<dyn ColorResolver>,
}

impl BadgeResolver {
    pub fn new(pypi: PypiProvider, drone: DroneProvider, colors: Arc<dyn ColorResolver>) -> Self {
        Self { pypi, drone, colors }
    }

    pub async fn resolve(&self, request: &BadgeRequest) -> Result<ResolvedBadge> {
        match request {
            BadgeRequest::Text { label, value, color } => {
                let color = self.colors.resolve(color)?;
                Ok(ResolvedBadge {
                    data: BadgeData::new(label.as_str(), value.as_str(), color),
                    cache_policy: CachePolicy::Immutable,
                })
            }
            BadgeRequest::PackageIndex {
                project,
                metric,
                color,
            } => {
                // Bad colors are rejected before spending an upstream call.
                let color = self.colors.resolve(color)?;
                let value = self.pypi.resolve(project, *metric).await?;
                Ok(ResolvedBadge {
                    data: BadgeData::new(
                        metric.label(),
                        format!("{}{}", value, metric.value_suffix()),
                        color,
                    ),
                    cache_policy: CachePolicy::Revalidate,
                })
            }
            BadgeRequest::CiStatus {
                owner,
                repo,
                pass_color,
                fail_color,
            } => {
                let pass = self.colors.resolve(pass_color)?;
                let fail = self.colors.resolve(fail_color)?;
                let status = self.drone.resolve(owner, repo).await?;
                let color = match status {
                    BuildStatus::Passing => pass,
                    BuildStatus::Failing => fail,
                };
                Ok(ResolvedBadge {
                    data: BadgeData::new("build", status.as_str(), color),
                    cache_policy: CachePolicy::Revalidate,
                })
            }
        }
    }
}
