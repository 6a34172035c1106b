use anyhow::{Context, Result};
use dots_screentime_proto::ControlClient;

/// Prompt for the parental PIN without echo.
pub fn prompt_pin(prompt: &str) -> Result<String> {
    rpassword::prompt_password(prompt).context("Failed to read PIN")
}

/// Ask for the PIN and check it with the daemon before a protected command.
///
/// The daemon accepts anything while no PIN is configured.
pub async fn require_pin(client: &ControlClient) -> Result<()> {
    let pin = prompt_pin("Enter parental PIN (leave empty if none): ")?;
    if !client.verify_pin(pin.trim()).await.context("Failed to verify PIN with daemon")? {
        anyhow::bail!("Incorrect PIN");
    }
    Ok(())
}
