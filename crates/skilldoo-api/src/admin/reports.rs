//! GET /admin/reports. JSON for every report type; CSV export for the
//! `users` and `swaps` types, other combinations fall back to JSON.

use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use tracing::info;

use skilldoo_types::api::ReportQuery;
use skilldoo_types::report::{
    DateRange, Report, ReportData, ReportFormat, ReportKind, SwapReportRow, UserReportRow,
};

use crate::error::{ApiError, Result};
use crate::extract::Query;
use crate::{AppState, db};

pub async fn generate(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Response> {
    let range = DateRange {
        start_date: parse_bound(query.start_date.as_deref(), false)?,
        end_date: parse_bound(query.end_date.as_deref(), true)?,
    };
    let kind = query.kind;

    let data = db(&state, move |db| {
        let mut data = ReportData::default();
        if kind.includes(ReportKind::Overview) {
            data.overview = Some(db.overview(&range)?);
        }
        if kind.includes(ReportKind::Users) {
            data.users = Some(db.user_report(&range)?);
        }
        if kind.includes(ReportKind::Swaps) {
            data.swaps = Some(db.swap_report(&range)?);
        }
        if kind.includes(ReportKind::Skills) {
            data.skills = Some(db.skill_report()?);
        }
        if kind.includes(ReportKind::Ratings) {
            data.ratings = Some(db.rating_report(&range)?);
        }
        Ok(data)
    })
    .await?;

    let generated_at = Utc::now();
    info!("Generated {} report ({:?})", kind.as_str(), query.format);

    if query.format == ReportFormat::Csv {
        let csv = match (kind, &data) {
            (ReportKind::Users, ReportData { users: Some(rows), .. }) => Some(users_csv(rows)),
            (ReportKind::Swaps, ReportData { swaps: Some(rows), .. }) => Some(swaps_csv(rows)),
            _ => None,
        };
        if let Some(body) = csv {
            let filename = format!(
                "attachment; filename=\"{}_report_{}.csv\"",
                kind.as_str(),
                generated_at.format("%Y-%m-%d")
            );
            return Ok((
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, filename),
                ],
                body,
            )
                .into_response());
        }
    }

    Ok(Json(Report {
        report_type: kind,
        generated_at,
        date_range: range,
        data,
    })
    .into_response())
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates. A bare end date
/// covers that whole day.
fn parse_bound(raw: Option<&str>, end_of_day: bool) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{}'", raw)))?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    let time = time.ok_or_else(|| ApiError::BadRequest(format!("Invalid date '{}'", raw)))?;
    Ok(Some(time.and_utc()))
}

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Quote a field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_line<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields
        .into_iter()
        .map(|f| csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

fn users_csv(rows: &[UserReportRow]) -> String {
    let mut lines = vec![csv_line([
        "ID",
        "Name",
        "Email",
        "Location",
        "Active",
        "Role",
        "Created At",
        "Total Swaps",
        "Completed Swaps",
        "Average Rating",
    ])];
    lines.extend(rows.iter().map(|u| {
        csv_line([
            u.id.to_string(),
            u.name.clone().unwrap_or_default(),
            u.email.clone(),
            u.location.clone().unwrap_or_default(),
            if u.is_active { "Yes" } else { "No" }.to_string(),
            u.role.to_string(),
            timestamp(&u.created_at),
            u.total_swap_requests.to_string(),
            u.completed_swaps.to_string(),
            format!("{:.1}", u.average_rating),
        ])
    }));
    lines.join("\n")
}

fn swaps_csv(rows: &[SwapReportRow]) -> String {
    let mut lines = vec![csv_line([
        "ID",
        "Requester",
        "Provider",
        "Offered Skill",
        "Wanted Skill",
        "Status",
        "Created At",
        "Completed At",
    ])];
    lines.extend(rows.iter().map(|s| {
        csv_line([
            s.id.to_string(),
            s.requester_name.clone().unwrap_or_else(|| s.requester_email.clone()),
            s.provider_name.clone().unwrap_or_else(|| s.provider_email.clone()),
            s.offered_skill.clone(),
            s.wanted_skill.clone(),
            s.status.to_string(),
            timestamp(&s.created_at),
            s.completed_at.as_ref().map(timestamp).unwrap_or_default(),
        ])
    }));
    lines.join("\n")
}
