use anyhow::Result;
use dots_screentime_common::{FocusListType, FocusMode};
use dots_screentime_proto::dto::StartFocusRequest;
use dots_screentime_proto::ControlClient;
use uuid::Uuid;

use crate::format;

pub async fn start(
    client: &ControlClient,
    minutes: i64,
    apps: Vec<Uuid>,
    list_type: FocusListType,
    mode: FocusMode,
    label: Option<String>,
) -> Result<()> {
    if minutes <= 0 {
        anyhow::bail!("Focus duration must be at least one minute");
    }

    let request = StartFocusRequest {
        duration_minutes: minutes,
        whitelist_app_ids: apps,
        list_type,
        mode,
        label,
    };
    client.start_focus(&request).await?;

    println!("✓ Focus session started for {} minutes ({})", minutes, list_type.as_str());
    Ok(())
}

pub async fn stop(client: &ControlClient) -> Result<()> {
    client.stop_focus().await?;
    println!("Focus session stopped");
    Ok(())
}

pub async fn status(client: &ControlClient) -> Result<()> {
    let status = client.focus_status().await?;
    if !status.is_active {
        println!("No focus session running");
        return Ok(());
    }

    println!("Focus session active");
    if let Some(label) = &status.label {
        println!("  Label:     {}", label);
    }
    if let Some(mode) = status.mode {
        println!("  Mode:      {}", mode.as_str());
    }
    if let Some(list_type) = status.list_type {
        println!("  List:      {} ({} apps)", list_type.as_str(), status.whitelist_app_ids.len());
    }
    if let Some(end) = status.end_time {
        println!("  Ends:      {}", format::local_time(end));
    }
    println!("  Remaining: {}", format::duration(status.remaining_seconds));

    Ok(())
}
