//! Headless browser abstraction for testability

use std::time::Duration;

use async_trait::async_trait;

/// Browser automation used by one pipeline run
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait SessionDriver: Send + Sync {
    /// Open the page every other call operates on
    async fn new_page(&self) -> crate::Result<()>;

    /// Navigate to `url` and wait for the load to settle
    async fn goto(&self, url: &str, timeout: Duration) -> crate::Result<()>;

    /// Type `text` into the element matching `selector`
    async fn type_text(&self, selector: &str, text: &str) -> crate::Result<()>;

    async fn click(&self, selector: &str) -> crate::Result<()>;

    /// Wait for the navigation triggered by the previous action
    async fn wait_for_navigation(&self, timeout: Duration) -> crate::Result<()>;

    /// Wait until an element matching `selector` is present
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> crate::Result<()>;

    /// Whether an element matching `selector` is currently present
    async fn has_element(&self, selector: &str) -> crate::Result<bool>;

    /// Evaluate a JavaScript expression in the page
    async fn evaluate(&self, script: &str) -> crate::Result<serde_json::Value>;

    /// Names of the cookies currently set
    async fn cookies(&self) -> crate::Result<Vec<String>>;

    async fn current_url(&self) -> crate::Result<String>;

    /// Release the page and its browser
    async fn close(&self) -> crate::Result<()>;
}

/// Starts a fresh driver for each run
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait DriverLauncher: Send + Sync {
    async fn launch(&self) -> crate::Result<Box<dyn SessionDriver>>;
}

/// Quote a string as a JavaScript literal
pub fn js_literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
