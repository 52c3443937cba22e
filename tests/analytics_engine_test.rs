// Analytics scoring, recommendations, badges and CSV export

use chrono::{Duration, Utc};
use uuid::Uuid;

use rafah_backend::services::analytics::{
    badge_for, build_recommendations, performance_score, report_to_csv, DashboardStats,
    PerformanceReport, ReportPeriod, TopUrlSummary, TrendingAnalysis,
};

fn dashboard(total: i64, active: i64, expired: i64, ctr: f64) -> DashboardStats {
    DashboardStats {
        total_urls: total,
        active_urls: active,
        expired_urls: expired,
        total_clicks: 0,
        period_clicks: 0,
        new_urls: 0,
        click_through_rate: ctr,
        top_urls: Vec::new(),
        period_days: 30,
    }
}

#[test]
fn test_score_is_capped_at_100() {
    assert_eq!(performance_score(10_000, 100_000, 10_000, 100_000, 30), 100.0);
}

#[test]
fn test_score_components() {
    // Productivity saturates at 20 points (10+ links)
    assert_eq!(performance_score(10, 0, 0, 0, 30), 20.0);

    // Click volume saturates at 30 points (300+ clicks)
    assert_eq!(performance_score(0, 300, 0, 0, 30), 30.0);

    // Fully active portfolio earns the 20-point activity component
    assert_eq!(performance_score(1, 0, 1, 0, 30), 2.0 + 20.0);

    // 15 clicks a day saturates the recency component at 30 points
    assert_eq!(performance_score(0, 0, 0, 450, 30), 30.0);
}

#[test]
fn test_score_zero_activity() {
    assert_eq!(performance_score(0, 0, 0, 0, 30), 0.0);
}

#[test]
fn test_low_ctr_recommendation() {
    let recs = build_recommendations(&dashboard(10, 10, 0, 2.0), None);
    assert!(recs.iter().any(|r| r.kind == "improvement" && r.priority == "high"));
}

#[test]
fn test_expired_links_recommendation() {
    let recs = build_recommendations(&dashboard(10, 2, 8, 50.0), None);
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].kind, "maintenance");
}

#[test]
fn test_healthy_dashboard_has_no_recommendations() {
    let recs = build_recommendations(&dashboard(10, 9, 1, 25.0), None);
    assert!(recs.is_empty());
}

#[test]
fn test_badges() {
    assert_eq!(badge_for(1, 0.0).unwrap().kind, "gold");
    assert_eq!(badge_for(2, 0.0).unwrap().kind, "silver");
    assert_eq!(badge_for(3, 0.0).unwrap().kind, "bronze");
    assert_eq!(badge_for(5, 90.0).unwrap().kind, "star");
    assert_eq!(badge_for(5, 70.0).unwrap().kind, "thumbs-up");
    assert!(badge_for(5, 10.0).is_none());
}

#[test]
fn test_csv_export_structure() {
    let now = Utc::now();
    let report = PerformanceReport {
        report_period: ReportPeriod {
            start_date: now - Duration::days(30),
            end_date: now,
            days: 30,
        },
        dashboard_stats: DashboardStats {
            total_urls: 12,
            active_urls: 10,
            expired_urls: 2,
            total_clicks: 340,
            period_clicks: 55,
            new_urls: 3,
            click_through_rate: 4.58,
            top_urls: vec![TopUrlSummary {
                id: Uuid::new_v4(),
                title: Some("Campaign".to_string()),
                short_code: "x7Yq2w".to_string(),
                click_count: 120,
                created_at: now,
            }],
            period_days: 30,
        },
        user_performance: None,
        trending_analysis: TrendingAnalysis {
            trending_urls: Vec::new(),
            active_users: Vec::new(),
            hourly_trends: Vec::new(),
            period_days: 7,
        },
        best_posting_times: Vec::new(),
        recommendations: build_recommendations(&dashboard(12, 10, 2, 4.58), None),
        generated_at: now,
    };

    let bytes = report_to_csv(&report).expect("export should succeed");
    let text = String::from_utf8(bytes).expect("valid UTF-8");

    assert!(text.contains("Rafah performance report"));
    assert!(text.contains("Total links,12"));
    assert!(text.contains("x7Yq2w"));
    // Low CTR means the recommendations section is present
    assert!(text.contains("Recommendations"));
}
