use anyhow::{Context, Result};
use dots_screentime_proto::ControlClient;

use crate::auth::prompt_pin;

pub async fn verify(client: &ControlClient) -> Result<()> {
    let pin = prompt_pin("Enter parental PIN: ")?;
    if client.verify_pin(pin.trim()).await.context("Failed to verify PIN with daemon")? {
        println!("✓ PIN accepted");
        Ok(())
    } else {
        anyhow::bail!("Incorrect PIN")
    }
}

pub async fn set(client: &ControlClient) -> Result<()> {
    let old_pin = prompt_pin("Current PIN (leave empty if none): ")?;
    let new_pin = prompt_pin("New PIN (leave empty to remove): ")?;
    if !new_pin.trim().is_empty() {
        let confirm = prompt_pin("Repeat new PIN: ")?;
        if confirm.trim() != new_pin.trim() {
            anyhow::bail!("PINs do not match");
        }
    }

    if !client.set_pin(old_pin.trim(), new_pin.trim()).await? {
        anyhow::bail!("Current PIN is incorrect");
    }

    if new_pin.trim().is_empty() {
        println!("✓ PIN removed");
    } else {
        println!("✓ PIN updated");
    }
    Ok(())
}
