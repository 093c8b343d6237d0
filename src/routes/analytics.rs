//! Analytics: dashboard, trends and reports
//!
//! All aggregation happens over the requester's accessible submissions
//! (everything for admins, own submissions otherwise).

use bson::Document;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::schemas::submission::PlantConditions;
use crate::db::schemas::{SubmissionDoc, UserDoc, SUBMISSIONS_COLLECTION};
use crate::routes::{authenticate, data_response, failure_response, query_param, BoxBody};
use crate::server::http::to_boxed;
use crate::server::AppState;
use crate::types::Result;

#[derive(Debug, Serialize)]
pub struct DashboardData {
    pub total_submissions: usize,
    pub submissions_by_status: HashMap<String, i64>,
    pub submissions_by_stage: HashMap<String, i64>,
    pub recent_submissions: Vec<SubmissionDoc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TrendsData {
    pub daily_submissions: HashMap<String, i64>,
    pub stage_progression: HashMap<String, Vec<String>>,
    pub period: serde_json::Value,
}

/// GET /analytics/dashboard
pub async fn handle_dashboard(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let user = match authenticate(&req, &state).await {
        Ok(u) => u,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let submissions = match fetch_accessible(&state, &user).await {
        Ok(s) => s,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let mut by_status: HashMap<String, i64> = HashMap::new();
    let mut by_stage: HashMap<String, i64> = HashMap::new();
    for submission in &submissions {
        *by_status.entry(submission.status.clone()).or_default() += 1;
        *by_stage.entry(submission.growth_stage.clone()).or_default() += 1;
    }

    let mut recent = submissions.clone();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(5);

    to_boxed(data_response(
        StatusCode::OK,
        DashboardData {
            total_submissions: submissions.len(),
            submissions_by_status: by_status,
            submissions_by_stage: by_stage,
            recent_submissions: recent,
            last_updated: Utc::now(),
        },
    ))
}

/// GET /analytics/trends?days=N
pub async fn handle_trends(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let user = match authenticate(&req, &state).await {
        Ok(u) => u,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let days = query_param(req.uri().query(), "days")
        .and_then(|d| d.parse::<i64>().ok())
        .filter(|&d| d >= 1)
        .unwrap_or(30);

    let end_date = Utc::now();
    let start_date = end_date - Duration::days(days);

    let submissions = match fetch_accessible(&state, &user).await {
        Ok(s) => s,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let mut daily: HashMap<String, i64> = HashMap::new();
    let mut stage_progression: HashMap<String, Vec<String>> = HashMap::new();

    for submission in submissions
        .iter()
        .filter(|s| s.created_at >= start_date && s.created_at <= end_date)
    {
        let date_key = submission.created_at.format("%Y-%m-%d").to_string();
        *daily.entry(date_key).or_default() += 1;

        if !submission.field_id.is_empty() {
            stage_progression
                .entry(submission.field_id.clone())
                .or_default()
                .push(submission.growth_stage.clone());
        }
    }

    to_boxed(data_response(
        StatusCode::OK,
        TrendsData {
            daily_submissions: daily,
            stage_progression,
            period: serde_json::json!({
                "start_date": start_date.format("%Y-%m-%d").to_string(),
                "end_date": end_date.format("%Y-%m-%d").to_string(),
                "days": days,
            }),
        },
    ))
}

/// GET /analytics/reports?type=summary|detailed|field_analysis
pub async fn handle_reports(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let user = match authenticate(&req, &state).await {
        Ok(u) => u,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let query = req.uri().query();
    let report_type = query_param(query, "type").unwrap_or_else(|| "summary".to_string());
    let start = query_param(query, "start_date").and_then(|d| parse_date(&d));
    let end = query_param(query, "end_date").and_then(|d| parse_date(&d));

    let mut submissions = match fetch_accessible(&state, &user).await {
        Ok(s) => s,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if let Some(start) = start {
        submissions.retain(|s| s.created_at >= start);
    }
    if let Some(end) = end {
        submissions.retain(|s| s.created_at <= end);
    }

    let report = match report_type.as_str() {
        "detailed" => detailed_report(&submissions),
        "field_analysis" => field_analysis_report(&submissions),
        _ => summary_report(&submissions),
    };

    to_boxed(data_response(StatusCode::OK, report))
}

// =============================================================================
// Report generation
// =============================================================================

fn summary_report(submissions: &[SubmissionDoc]) -> serde_json::Value {
    let mut status_counts: HashMap<String, i64> = HashMap::new();
    let mut stage_counts: HashMap<String, i64> = HashMap::new();
    let mut condition_counts: HashMap<String, i64> = HashMap::new();

    for submission in submissions {
        *status_counts.entry(submission.status.clone()).or_default() += 1;
        *stage_counts.entry(submission.growth_stage.clone()).or_default() += 1;
        accumulate_condition_counts(&mut condition_counts, &submission.plant_conditions);
    }

    serde_json::json!({
        "total_submissions": submissions.len(),
        "status_distribution": status_counts,
        "stage_distribution": stage_counts,
        "condition_frequency": condition_counts,
        "generated_at": Utc::now(),
    })
}

fn detailed_report(submissions: &[SubmissionDoc]) -> serde_json::Value {
    serde_json::json!({
        "submissions": submissions,
        "total_count": submissions.len(),
        "generated_at": Utc::now(),
    })
}

fn field_analysis_report(submissions: &[SubmissionDoc]) -> serde_json::Value {
    #[derive(Serialize)]
    struct FieldAnalysis {
        submission_count: i64,
        stages: HashMap<String, i64>,
        conditions: HashMap<String, i64>,
        latest_date: DateTime<Utc>,
    }

    let mut per_field: HashMap<String, FieldAnalysis> = HashMap::new();

    for submission in submissions {
        let entry = per_field
            .entry(submission.field_id.clone())
            .or_insert_with(|| FieldAnalysis {
                submission_count: 0,
                stages: HashMap::new(),
                conditions: HashMap::new(),
                latest_date: submission.date,
            });

        entry.submission_count += 1;
        *entry
            .stages
            .entry(submission.growth_stage.clone())
            .or_default() += 1;
        accumulate_condition_counts(&mut entry.conditions, &submission.plant_conditions);

        if submission.date > entry.latest_date {
            entry.latest_date = submission.date;
        }
    }

    let total_fields = per_field.len();
    serde_json::json!({
        "field_analysis": per_field,
        "total_fields": total_fields,
        "generated_at": Utc::now(),
    })
}

/// Tally checklist flags, selected sub-conditions and severity levels into a
/// frequency map keyed by human-readable labels.
fn accumulate_condition_counts(counts: &mut HashMap<String, i64>, pc: &PlantConditions) {
    let mut bump = |key: String| *counts.entry(key).or_default() += 1;

    if pc.healthy {
        bump("Healthy".to_string());
    }
    if pc.unhealthy {
        bump("Unhealthy".to_string());
    }
    if pc.signs_of_pest_infestation {
        bump("Signs of pest infestation".to_string());
        for (pest, &selected) in &pc.pest_details {
            if selected {
                bump(format!("Pest: {}", pest));
            }
        }
        if !pc.other_pest.is_empty() {
            bump(format!("Pest: Other ({})", pc.other_pest));
        }
    }
    if pc.signs_of_nutrient_deficiency {
        bump("Signs of nutrient deficiency".to_string());
        for (nutrient, &selected) in &pc.nutrient_deficiency_details {
            if selected {
                bump(format!("Nutrient: {}", nutrient));
            }
        }
        if !pc.other_nutrient.is_empty() {
            bump(format!("Nutrient: Other ({})", pc.other_nutrient));
        }
    }
    if pc.water_stress {
        bump("Water stress (drought or flood)".to_string());
        if !pc.water_stress_level.is_empty() {
            bump(format!("Water Stress Level: {}", pc.water_stress_level));
        }
    }
    if pc.lodging {
        bump("Lodging (bent/broken stems)".to_string());
        if !pc.lodging_level.is_empty() {
            bump(format!("Lodging Level: {}", pc.lodging_level));
        }
    }
    if pc.weed_infestation {
        bump("Weed infestation".to_string());
        if !pc.weed_infestation_level.is_empty() {
            bump(format!("Weed Infestation Level: {}", pc.weed_infestation_level));
        }
    }
    if pc.disease_symptoms {
        bump("Disease symptoms".to_string());
        for (disease, &selected) in &pc.disease_details {
            if selected {
                bump(format!("Disease: {}", disease));
            }
        }
        if !pc.other_disease.is_empty() {
            bump(format!("Disease: Other ({})", pc.other_disease));
        }
    }
    if pc.other {
        bump("Other".to_string());
        if !pc.other_condition_text.is_empty() {
            bump(format!("Other Condition: {}", pc.other_condition_text));
        }
    }
}

async fn fetch_accessible(state: &Arc<AppState>, user: &UserDoc) -> Result<Vec<SubmissionDoc>> {
    let mut filter = Document::new();
    if !user.role.is_admin() {
        filter.insert("user_id", &user.id);
    }

    let collection = state
        .mongo
        .collection::<SubmissionDoc>(SUBMISSIONS_COLLECTION)
        .await?;
    collection.find_many(filter).await
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_counts_include_details_and_levels() {
        let mut pc = PlantConditions::default();
        pc.signs_of_pest_infestation = true;
        pc.pest_details.insert("Stem borer".to_string(), true);
        pc.pest_details.insert("Rice bug".to_string(), false);
        pc.other_pest = "unknown beetle".to_string();
        pc.water_stress = true;
        pc.water_stress_level = "severe".to_string();

        let mut counts = HashMap::new();
        accumulate_condition_counts(&mut counts, &pc);

        assert_eq!(counts["Signs of pest infestation"], 1);
        assert_eq!(counts["Pest: Stem borer"], 1);
        assert!(!counts.contains_key("Pest: Rice bug"));
        assert_eq!(counts["Pest: Other (unknown beetle)"], 1);
        assert_eq!(counts["Water Stress Level: severe"], 1);
        assert!(!counts.contains_key("Healthy"));
    }

    #[test]
    fn test_unselected_flags_count_nothing() {
        let mut counts = HashMap::new();
        accumulate_condition_counts(&mut counts, &PlantConditions::default());
        assert!(counts.is_empty());
    }

    #[test]
    fn test_parse_date() {
        let date = parse_date("2024-03-01").unwrap();
        assert_eq!(date.format("%Y-%m-%d %H:%M").to_string(), "2024-03-01 00:00");
        assert!(parse_date("March 1").is_none());
    }
}
