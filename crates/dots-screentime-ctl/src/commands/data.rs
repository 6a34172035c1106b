use anyhow::Result;
use dots_screentime_common::NotificationKind;
use dots_screentime_proto::dto::ExportFormat;
use dots_screentime_proto::ControlClient;

use crate::{auth, format};

pub async fn notifications(client: &ControlClient) -> Result<()> {
    let notifications = client.notifications().await?;
    if notifications.is_empty() {
        println!("No new notifications");
        return Ok(());
    }

    for notification in notifications {
        let marker = match notification.kind {
            NotificationKind::Info => "ℹ️ ",
            NotificationKind::Warning => "⚠️ ",
            NotificationKind::Error => "❌",
        };
        println!(
            "{} {} [{}] {}",
            marker,
            format::local_time(notification.timestamp),
            notification.title,
            notification.message
        );
    }

    Ok(())
}

pub async fn export(client: &ControlClient, format: ExportFormat) -> Result<()> {
    let exported = client.export_data(format).await?;
    println!("✓ Exported to {}", exported.path);
    Ok(())
}

pub async fn clear(client: &ControlClient) -> Result<()> {
    auth::require_pin(client).await?;
    client.clear_data().await?;
    println!("✓ Usage history cleared");
    Ok(())
}
