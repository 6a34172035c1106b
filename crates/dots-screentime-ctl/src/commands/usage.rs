use anyhow::Result;
use chrono::NaiveDate;
use dots_screentime_proto::dto::{AppUsageDto, UsageSummaryResponse};
use dots_screentime_proto::ControlClient;
use uuid::Uuid;

use crate::format;

pub async fn today(client: &ControlClient) -> Result<()> {
    let summary = client.today_summary().await?;
    print_summary(&summary);
    Ok(())
}

pub async fn by_date(client: &ControlClient, date: NaiveDate) -> Result<()> {
    let summary = client.usage_by_date(date).await?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &UsageSummaryResponse) {
    println!("Screen Time for {}", summary.date_local);
    println!("═══════════════════════════════════════════════");
    println!();
    println!("Total:        {}", format::duration(summary.total_seconds));
    println!("Day before:   {}", format::duration(summary.total_seconds_yesterday));
    println!("App switches: {}", summary.app_switches);

    print_apps(&summary.top_apps);

    if !summary.category_usage.is_empty() {
        println!();
        println!("By category:");
        for (category, seconds) in &summary.category_usage {
            println!("  {:<16} {}", category, format::duration(*seconds));
        }
    }

    let busiest = summary.hourly_usage.iter().copied().max().unwrap_or(0);
    if busiest > 0 {
        println!();
        println!("By hour:");
        for (hour, seconds) in summary.hourly_usage.iter().enumerate() {
            if *seconds > 0 {
                println!(
                    "  {:02}:00 {:<20} {}",
                    hour,
                    format::bar(*seconds, busiest, 20),
                    format::duration(*seconds)
                );
            }
        }
    }
}

fn print_apps(apps: &[AppUsageDto]) {
    if apps.is_empty() {
        println!();
        println!("No usage recorded");
        return;
    }

    println!();
    println!("Top apps:");
    println!("─────────────────────────────────────────────");
    for (i, app) in apps.iter().enumerate() {
        println!(
            "  {:>2}. {:<24} {:<14} {}",
            i + 1,
            app.display_name,
            app.category,
            format::duration(app.total_seconds)
        );
        println!("      {}", app.app_id);
    }
}

pub async fn week(client: &ControlClient, start: Option<NaiveDate>) -> Result<()> {
    let summary = client.weekly_summary(start).await?;

    println!("Week of {}", summary.week_start_date);
    println!("═══════════════════════════════════════════════");
    println!();
    println!("Total:     {}", format::duration(summary.total_seconds));
    println!("Last week: {}", format::duration(summary.total_seconds_last_week));
    println!("Change:    {:+.1}%", summary.change_percent);
    println!(
        "Focus:     {} completed sessions, {}",
        summary.focus_sessions_completed,
        format::duration(summary.focus_total_seconds)
    );

    let busiest = summary.daily_usage.iter().copied().max().unwrap_or(0);
    println!();
    for (offset, seconds) in summary.daily_usage.iter().enumerate() {
        let day = summary.week_start_date + chrono::Duration::days(offset as i64);
        println!(
            "  {} {:<20} {}",
            day.format("%a %d"),
            format::bar(*seconds, busiest, 20),
            format::duration(*seconds)
        );
    }

    print_apps(&summary.top_apps);
    Ok(())
}

pub async fn app(client: &ControlClient, app_id: Uuid) -> Result<()> {
    let details = client.app_details(app_id).await?;

    println!("{} ({})", details.app.display_name, details.app.process_name);
    println!("Category: {}", details.app.category_or_default());
    if let Some(path) = &details.app.file_path {
        println!("Path:     {}", path);
    }
    println!();
    println!("Today:           {}", format::duration(details.today_seconds));
    println!("Last 7 days:     {}", format::duration(details.week_total_seconds));
    println!("Daily average:   {}", format::duration(details.seven_day_average_seconds));

    match &details.limit_rule {
        Some(rule) if rule.enabled => {
            let limit = rule
                .daily_limit_minutes
                .map(|m| format!("{} minutes", m))
                .unwrap_or_else(|| "none".to_string());
            println!("Limit:           {} ({})", limit, rule.action_on_limit);
            if let (Some(start), Some(end)) = (&rule.curfew_start, &rule.curfew_end) {
                println!("Curfew:          {} - {}", start, end);
            }
        }
        _ => println!("Limit:           none"),
    }

    if !details.top_titles.is_empty() {
        println!();
        println!("Top windows:");
        for title in &details.top_titles {
            println!(
                "  {:<40} {} ({} sessions)",
                title.title,
                format::duration(title.total_seconds),
                title.session_count
            );
        }
    }

    if !details.recent_sessions.is_empty() {
        println!();
        println!("Recent sessions:");
        for session in &details.recent_sessions {
            println!(
                "  {}  {:>8}  {}",
                format::local_time(session.start_time),
                format::duration(session.duration_seconds),
                session.window_title
            );
        }
    }

    Ok(())
}

pub async fn sessions(client: &ControlClient, app_id: Option<Uuid>, count: u32) -> Result<()> {
    let sessions = client.recent_sessions(app_id, count).await?;
    if sessions.is_empty() {
        println!("No sessions recorded");
        return Ok(());
    }

    for session in sessions {
        let end = match session.end_time {
            Some(end) => format::local_time(end),
            None => "running".to_string(),
        };
        println!(
            "{} → {:<16} {:>8}  {:<20} {}{}",
            format::local_time(session.start_time),
            end,
            format::duration(session.duration_seconds),
            session.display_name,
            session.window_title,
            session.site_domain.map(|d| format!(" [{}]", d)).unwrap_or_default()
        );
    }

    Ok(())
}
