use async_trait::async_trait;
use tracing::debug;

use super::WindowSource;
use crate::error::Result;
use crate::types::WindowInfo;

/// Fallback for sessions with no supported compositor. Reports no windows,
/// so nothing is tracked rather than guessed.
#[derive(Default)]
pub struct GenericAdapter;

impl GenericAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WindowSource for GenericAdapter {
    async fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        debug!("No window source available for this session");
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "Generic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generic_adapter_reports_nothing() {
        let adapter = GenericAdapter::new();
        assert_eq!(adapter.name(), "Generic");
        assert!(adapter.list_windows().await.unwrap().is_empty());
    }
}
