use crate::color::Rgba;
use crate::error::ParseError;
use std::fmt;
use std::str::FromStr;

/// Shield kinds, named by the path token that selects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShieldKind {
    Text,
    PackageIndex,
    CiStatus,
}

impl ShieldKind {
    pub fn token(&self) -> &'static str {
        match self {
            ShieldKind::Text => "text",
            ShieldKind::PackageIndex => "pypi",
            ShieldKind::CiStatus => "drone",
        }
    }
}

impl FromStr for ShieldKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ShieldKind::Text),
            "pypi" => Ok(ShieldKind::PackageIndex),
            "drone" => Ok(ShieldKind::CiStatus),
            other => Err(ParseError::UnknownShield(other.to_string())),
        }
    }
}

/// Package index figures a badge can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageMetric {
    Version,
    DayDownloads,
    WeekDownloads,
    MonthDownloads,
}

impl PackageMetric {
    pub const ALL: [PackageMetric; 4] = [
        PackageMetric::Version,
        PackageMetric::DayDownloads,
        PackageMetric::WeekDownloads,
        PackageMetric::MonthDownloads,
    ];

    /// Path token, also used as the cache hash field.
    pub fn field(&self) -> &'static str {
        match self {
            PackageMetric::Version => "version",
            PackageMetric::DayDownloads => "day_down",
            PackageMetric::WeekDownloads => "week_down",
            PackageMetric::MonthDownloads => "month_down",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PackageMetric::Version => "version",
            _ => "downloads",
        }
    }

    pub fn value_suffix(&self) -> &'static str {
        match self {
            PackageMetric::Version => "",
            PackageMetric::DayDownloads => " today",
            PackageMetric::WeekDownloads => " this week",
            PackageMetric::MonthDownloads => " this month",
        }
    }
}

impl FromStr for PackageMetric {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|metric| metric.field() == s)
            .ok_or_else(|| ParseError::UnknownMetric(s.to_string()))
    }
}

/// Canonical form of a badge request, whichever grammar it arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadgeRequest {
    Text {
        label: String,
        value: String,
        color: String,
    },
    PackageIndex {
        project: String,
        metric: PackageMetric,
        color: String,
    },
    CiStatus {
        owner: String,
        repo: String,
        pass_color: String,
        fail_color: String,
    },
}

impl BadgeRequest {
    pub fn kind(&self) -> ShieldKind {
        match self {
            BadgeRequest::Text { .. } => ShieldKind::Text,
            BadgeRequest::PackageIndex { .. } => ShieldKind::PackageIndex,
            BadgeRequest::CiStatus { .. } => ShieldKind::CiStatus,
        }
    }

    /// Text badges are derived entirely from the request and never change.
    pub fn is_request_derived(&self) -> bool {
        matches!(self, BadgeRequest::Text { .. })
    }
}

/// Everything the renderer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeData {
    label: String,
    value: String,
    color: Rgba,
}

impl BadgeData {
    pub fn new(label: impl Into<String>, value: impl Into<String>, color: Rgba) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            color,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn color(&self) -> Rgba {
        self.color
    }
}

impl fmt::Display for BadgeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shield_kind_tokens() {
        for kind in [ShieldKind::Text, ShieldKind::PackageIndex, ShieldKind::CiStatus] {
            assert_eq!(kind.token().parse::<ShieldKind>().unwrap(), kind);
        }
        assert_eq!(
            "npm".parse::<ShieldKind>(),
            Err(ParseError::UnknownShield("npm".into()))
        );
    }

    #[test]
    fn test_metric_labels() {
        assert_eq!("version".parse::<PackageMetric>().unwrap().label(), "version");
        let week: PackageMetric = "week_down".parse().unwrap();
        assert_eq!(week.label(), "downloads");
        assert_eq!(week.value_suffix(), " this week");
        assert!(matches!(
            "year_down".parse::<PackageMetric>(),
            Err(ParseError::UnknownMetric(_))
        ));
    }
}
