use super::{get_ok, upstream_url};
use crate::badge::PackageMetric;
use crate::error::{BadgeError, Result};
use crate::store::CacheStore;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct PackageDocument {
    info: PackageInfo,
}

#[derive(Debug, Deserialize)]
struct PackageInfo {
    version: String,
    downloads: DownloadCounts,
}

/// The index reports -1 for every counter when statistics are disabled.
#[derive(Debug, Deserialize)]
struct DownloadCounts {
    last_day: i64,
    last_week: i64,
    last_month: i64,
}

/// Render a download counter: one decimal with a K/M/B suffix from a
/// thousand upwards, rounding half up.
pub fn format_count(count: i64) -> String {
    const TIERS: [(i64, &str); 3] = [(1_000_000_000, "B"), (1_000_000, "M"), (1_000, "K")];

    for (divisor, suffix) in TIERS {
        if count >= divisor {
            let tenths = (count as i128 * 10 + divisor as i128 / 2) / divisor as i128;
            return format!("{}.{}{}", tenths / 10, tenths % 10, suffix);
        }
    }
    count.to_string()
}

/// Every field a single index lookup yields, already formatted for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageStats {
    pub version: String,
    pub day_downloads: String,
    pub week_downloads: String,
    pub month_downloads: String,
}

impl PackageStats {
    pub fn get(&self, metric: PackageMetric) -> &str {
        match metric {
            PackageMetric::Version => &self.version,
            PackageMetric::DayDownloads => &self.day_downloads,
            PackageMetric::WeekDownloads => &self.week_downloads,
            PackageMetric::MonthDownloads => &self.month_downloads,
        }
    }

    fn cache_fields(&self) -> Vec<(&'static str, String)> {
        PackageMetric::ALL
            .into_iter()
            .map(|metric| (metric.field(), self.get(metric).to_string()))
            .collect()
    }
}

impl From<PackageDocument> for PackageStats {
    fn from(doc: PackageDocument) -> Self {
        let downloads = doc.info.downloads;
        Self {
            version: doc.info.version,
            day_downloads: format_count(downloads.last_day),
            week_downloads: format_count(downloads.last_week),
            month_downloads: format_count(downloads.last_month),
        }
    }
}

/// Package index lookups (`GET <base>/<project>/json`).
#[derive(Clone)]
pub struct PypiProvider {
    client: reqwest::Client,
    base_url: String,
    ttl: Duration,
    store: Arc<dyn CacheStore>,
}

impl PypiProvider {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        ttl: Duration,
        store: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ttl,
            store,
        }
    }

    pub fn cache_key(project: &str) -> String {
        format!("{}_pypi", project)
    }

    pub async fn resolve(&self, project: &str, metric: PackageMetric) -> Result<String> {
        let key = Self::cache_key(project);
        if let Some(value) = self.store.hash_get(&key, metric.field()).await? {
            debug!(project, field = metric.field(), "package index cache hit");
            return Ok(value);
        }

        let stats = self.fetch(project).await?;
        self.store
            .hash_refresh(&key, &stats.cache_fields(), self.ttl)
            .await?;
        Ok(stats.get(metric).to_string())
    }

    /// One upstream lookup, no caching.
    pub async fn fetch(&self, project: &str) -> Result<PackageStats> {
        let url = upstream_url(&self.base_url, &[project, "json"])?;
        info!(project, url = %url, "fetching package index data");

        let response = get_ok(&self.client, &url).await?;
        let document: PackageDocument = response
            .json()
            .await
            .map_err(|e| BadgeError::Upstream(format!("Invalid package document for {}: {}", project, e)))?;
        Ok(document.into())
    }
}
