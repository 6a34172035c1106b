use anyhow::{Context, Result};
use dots_screentime_common::ActionOnLimit;
use dots_screentime_proto::dto::LimitRuleDto;
use dots_screentime_proto::ControlClient;
use uuid::Uuid;

use crate::auth;

pub struct RuleArgs {
    pub app_id: Uuid,
    pub daily_limit_minutes: Option<i64>,
    pub curfew_start: Option<String>,
    pub curfew_end: Option<String>,
    pub action: ActionOnLimit,
    pub enabled: bool,
}

pub async fn list(client: &ControlClient) -> Result<()> {
    let rules = client.limit_rules().await?;
    if rules.is_empty() {
        println!("No apps recorded yet");
        return Ok(());
    }

    println!(
        "{:<36}  {:<20} {:>7}  {:<13} {:<11} Enabled",
        "App id", "App", "Limit", "Curfew", "Action"
    );
    for rule in rules {
        let limit =
            rule.daily_limit_minutes.map(|m| format!("{}m", m)).unwrap_or_else(|| "-".to_string());
        let curfew = match (&rule.curfew_start, &rule.curfew_end) {
            (Some(start), Some(end)) => format!("{}-{}", start, end),
            _ => "-".to_string(),
        };
        println!(
            "{:<36}  {:<20} {:>7}  {:<13} {:<11} {}",
            rule.app_id,
            rule.display_name,
            limit,
            curfew,
            rule.action_on_limit,
            if rule.enabled { "yes" } else { "no" }
        );
    }

    Ok(())
}

pub async fn set(client: &ControlClient, args: RuleArgs) -> Result<()> {
    if args.curfew_start.is_some() != args.curfew_end.is_some() {
        anyhow::bail!("Curfew needs both --curfew-start and --curfew-end");
    }

    auth::require_pin(client).await?;

    let rule = LimitRuleDto {
        app_id: args.app_id,
        process_name: String::new(),
        display_name: String::new(),
        daily_limit_minutes: args.daily_limit_minutes,
        curfew_start: args.curfew_start,
        curfew_end: args.curfew_end,
        action_on_limit: args.action,
        enabled: args.enabled,
    };
    client.upsert_limit_rule(&rule).await.context("Failed to save limit rule")?;

    println!("✓ Limit rule saved for {}", args.app_id);
    Ok(())
}

pub async fn extra_time(client: &ControlClient, app_id: Uuid, minutes: i64) -> Result<()> {
    auth::require_pin(client).await?;
    client.add_extra_time(app_id, minutes).await?;
    println!("✓ Granted {} extra minutes for today", minutes);
    Ok(())
}
