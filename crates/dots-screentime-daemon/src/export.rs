use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use dots_screentime_db::queries::{AggregateQueries, AppQueries, RuleQueries, SessionQueries};
use dots_screentime_db::{Database, DbDailyAggregate, DbLimitRule, DbSessionDetail};
use dots_screentime_proto::dto::ExportFormat;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedApp {
    id: String,
    process_name: String,
    display_name: String,
    category: Option<String>,
    file_path: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocument {
    exported_at: DateTime<Utc>,
    sessions: Vec<DbSessionDetail>,
    daily_aggregates: Vec<DbDailyAggregate>,
    apps: Vec<ExportedApp>,
    limit_rules: Vec<DbLimitRule>,
}

/// Write all usage data to `dir` and return the file path.
///
/// `local_now` names the file, `screentime_export_YYYYMMDD_HHMMSS.<ext>`.
pub async fn export_data(
    db: &Database,
    format: ExportFormat,
    dir: &Path,
    now: DateTime<Utc>,
    local_now: NaiveDateTime,
) -> Result<PathBuf> {
    let document = ExportDocument {
        exported_at: now,
        sessions: SessionQueries::list_all(db).await?,
        daily_aggregates: AggregateQueries::list_all(db).await?,
        apps: AppQueries::list_all(db)
            .await?
            .into_iter()
            .map(|app| ExportedApp {
                id: app.id,
                process_name: app.process_name,
                display_name: app.display_name,
                category: app.category,
                file_path: app.file_path,
                created_at: app.created_at,
            })
            .collect(),
        limit_rules: RuleQueries::list_all(db).await?,
    };

    let content = match format {
        ExportFormat::Json => serde_json::to_string_pretty(&document)?,
        ExportFormat::Csv => render_csv(&document),
    };

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create export directory: {:?}", dir))?;

    let file_name = format!(
        "screentime_export_{}.{}",
        local_now.format("%Y%m%d_%H%M%S"),
        format.extension()
    );
    let path = dir.join(file_name);
    tokio::fs::write(&path, content)
        .await
        .with_context(|| format!("Failed to write export file: {:?}", path))?;

    info!(
        "Exported {} sessions as {} to {:?}",
        document.sessions.len(),
        format,
        path
    );
    Ok(path)
}

fn render_csv(document: &ExportDocument) -> String {
    let mut out = String::new();

    section(
        &mut out,
        "Sessions",
        &["id", "app_id", "process_name", "display_name", "category", "window_title",
          "site_domain", "start_time", "end_time", "duration_seconds"],
        document.sessions.iter().map(|s| {
            vec![
                s.id.clone(),
                s.app_id.clone(),
                s.process_name.clone(),
                s.display_name.clone(),
                s.category.clone().unwrap_or_default(),
                s.window_title.clone(),
                s.site_domain.clone().unwrap_or_default(),
                s.start_time.to_rfc3339(),
                s.end_time.to_rfc3339(),
                s.duration_seconds.to_string(),
            ]
        }),
    );

    section(
        &mut out,
        "Daily Aggregates",
        &["date_local", "app_id", "total_seconds"],
        document.daily_aggregates.iter().map(|a| {
            vec![a.date_local.to_string(), a.app_id.clone(), a.total_seconds.to_string()]
        }),
    );

    section(
        &mut out,
        "Apps",
        &["id", "process_name", "display_name", "category", "file_path", "created_at"],
        document.apps.iter().map(|a| {
            vec![
                a.id.clone(),
                a.process_name.clone(),
                a.display_name.clone(),
                a.category.clone().unwrap_or_default(),
                a.file_path.clone().unwrap_or_default(),
                a.created_at.to_rfc3339(),
            ]
        }),
    );

    section(
        &mut out,
        "Limit Rules",
        &["app_id", "daily_limit_minutes", "curfew_start", "curfew_end", "action_on_limit",
          "enabled"],
        document.limit_rules.iter().map(|r| {
            vec![
                r.app_id.clone(),
                r.daily_limit_minutes.map(|m| m.to_string()).unwrap_or_default(),
                r.curfew_start.clone().unwrap_or_default(),
                r.curfew_end.clone().unwrap_or_default(),
                r.action_on_limit.clone(),
                r.enabled.to_string(),
            ]
        }),
    );

    out
}

fn section(
    out: &mut String,
    title: &str,
    header: &[&str],
    rows: impl Iterator<Item = Vec<String>>,
) {
    if !out.is_empty() {
        out.push('\n');
    }
    let _ = writeln!(out, "# {}", title);
    let _ = writeln!(out, "{}", header.join(","));
    for row in rows {
        let line: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
        let _ = writeln!(out, "{}", line.join(","));
    }
}

/// Quote a field when it contains a separator, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_csv_has_every_section() {
        let document = ExportDocument {
            exported_at: Utc::now(),
            sessions: Vec::new(),
            daily_aggregates: Vec::new(),
            apps: Vec::new(),
            limit_rules: Vec::new(),
        };

        let csv = render_csv(&document);
        for heading in ["# Sessions", "# Daily Aggregates", "# Apps", "# Limit Rules"] {
            assert!(csv.contains(heading), "missing {}", heading);
        }
    }
}
