use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Rating, Role};
use crate::swap::SwapStatus;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    #[default]
    Overview,
    Users,
    Swaps,
    Skills,
    Ratings,
    All,
}

impl ReportKind {
    pub fn includes(&self, section: ReportKind) -> bool {
        *self == ReportKind::All || *self == section
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Users => "users",
            Self::Swaps => "swaps",
            Self::Skills => "skills",
            Self::Ratings => "ratings",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Csv,
}

/// Inclusive creation-time window. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_users: u64,
    pub active_users: u64,
    pub inactive_users: u64,
    pub total_skills: u64,
    pub total_swap_requests: u64,
    pub completed_swaps: u64,
    pub pending_swaps: u64,
    pub rejected_swaps: u64,
    pub total_ratings: u64,
    pub average_rating: f64,
    pub completion_rate: f64,
}

/// completed / total as a percentage, 0 when there are no requests.
pub fn completion_rate(completed: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReportRow {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub location: Option<String>,
    pub is_active: bool,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub total_swap_requests: u64,
    pub completed_swaps: u64,
    pub average_rating: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapReportRow {
    pub id: Uuid,
    pub requester_name: Option<String>,
    pub requester_email: String,
    pub provider_name: Option<String>,
    pub provider_email: String,
    pub offered_skill: String,
    pub wanted_skill: String,
    pub status: SwapStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub ratings: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillReportRow {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub total_users: u64,
    pub total_requests: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<Overview>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserReportRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swaps: Option<Vec<SwapReportRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<SkillReportRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratings: Option<Vec<Rating>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub report_type: ReportKind,
    pub generated_at: DateTime<Utc>,
    pub date_range: DateRange,
    pub data: ReportData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_rate_handles_zero() {
        assert_eq!(completion_rate(0, 0), 0.0);
        assert_eq!(completion_rate(1, 4), 25.0);
        assert_eq!(completion_rate(3, 3), 100.0);
    }

    #[test]
    fn all_includes_every_section() {
        for kind in [ReportKind::Overview, ReportKind::Users, ReportKind::Swaps] {
            assert!(ReportKind::All.includes(kind));
        }
        assert!(ReportKind::Users.includes(ReportKind::Users));
        assert!(!ReportKind::Users.includes(ReportKind::Swaps));
    }

    #[test]
    fn empty_sections_are_omitted() {
        let data = ReportData {
            overview: Some(Overview::default()),
            ..Default::default()
        };
        let v = serde_json::to_value(&data).unwrap();
        assert!(v.get("overview").is_some());
        assert!(v.get("users").is_none());
    }
}
