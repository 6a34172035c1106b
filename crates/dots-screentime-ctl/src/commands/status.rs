use anyhow::Result;
use dots_screentime_proto::ControlClient;

use crate::format;

pub async fn ping(client: &ControlClient) -> Result<()> {
    let ping = client.ping().await?;

    println!("DOTS Screen Time Status");
    println!("=======================");
    println!();
    println!("Running: {}", if ping.running { "yes" } else { "no" });
    println!("Version: {}", ping.version);
    println!("Uptime:  {}", format::duration(ping.uptime_seconds as i64));

    Ok(())
}
