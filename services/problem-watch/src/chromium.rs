//! Session driver backed by a headless Chrome instance

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::BrowserSettings;
use crate::driver::{js_literal, DriverLauncher, SessionDriver};
use crate::error::WatchError;

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

fn driver_err(context: &str, e: impl std::fmt::Display) -> WatchError {
    WatchError::Driver(format!("{}: {}", context, e))
}

/// Launches one Chrome process per run
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    settings: BrowserSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn browser_config(&self) -> crate::Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.settings.window_width, self.settings.window_height);
        if !self.settings.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &self.settings.executable {
            builder = builder.chrome_executable(executable);
        }
        for arg in &self.settings.args {
            builder = builder.arg(arg.as_str());
        }
        builder
            .build()
            .map_err(|e| WatchError::Driver(format!("Failed to build browser config: {}", e)))
    }
}

#[async_trait]
impl DriverLauncher for ChromiumLauncher {
    async fn launch(&self) -> crate::Result<Box<dyn SessionDriver>> {
        tracing::debug!(headless = self.settings.headless, "Launching browser");
        let (browser, mut handler) = Browser::launch(self.browser_config()?)
            .await
            .map_err(|e| driver_err("Failed to launch browser", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Box::new(ChromiumDriver {
            browser: Mutex::new(Some(browser)),
            page: Mutex::new(None),
            handler_task: Mutex::new(Some(handler_task)),
        }))
    }
}

/// A Chrome browser and the single page a run works in
pub struct ChromiumDriver {
    browser: Mutex<Option<Browser>>,
    page: Mutex<Option<Page>>,
    handler_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ChromiumDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumDriver").finish()
    }
}

impl ChromiumDriver {
    async fn page(&self) -> crate::Result<Page> {
        self.page
            .lock()
            .await
            .clone()
            .ok_or_else(|| WatchError::Driver("No page open".to_string()))
    }
}

#[async_trait]
impl SessionDriver for ChromiumDriver {
    async fn new_page(&self) -> crate::Result<()> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| WatchError::Driver("Browser already closed".to_string()))?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| driver_err("Failed to open page", e))?;
        *self.page.lock().await = Some(page);
        Ok(())
    }

    async fn goto(&self, url: &str, timeout: Duration) -> crate::Result<()> {
        let page = self.page().await?;
        tracing::debug!("Navigating to {}", url);
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(WatchError::Navigation(format!("{}: {}", url, e))),
            Err(_) => Err(WatchError::Timeout(format!(
                "navigation to {} ({} ms)",
                url,
                timeout.as_millis()
            ))),
        }
    }

    async fn type_text(&self, selector: &str, text: &str) -> crate::Result<()> {
        let page = self.page().await?;
        let element = page
            .find_element(selector)
            .await
            .map_err(|e| driver_err(&format!("Element {} not found", selector), e))?;
        element
            .click()
            .await
            .map_err(|e| driver_err(&format!("Focusing {}", selector), e))?
            .type_str(text)
            .await
            .map_err(|e| driver_err(&format!("Typing into {}", selector), e))?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> crate::Result<()> {
        let page = self.page().await?;
        page.find_element(selector)
            .await
            .map_err(|e| driver_err(&format!("Element {} not found", selector), e))?
            .click()
            .await
            .map_err(|e| driver_err(&format!("Clicking {}", selector), e))?;
        Ok(())
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> crate::Result<()> {
        let page = self.page().await?;
        match tokio::time::timeout(timeout, page.wait_for_navigation()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(WatchError::Navigation(e.to_string())),
            Err(_) => Err(WatchError::Timeout(format!(
                "navigation ({} ms)",
                timeout.as_millis()
            ))),
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> crate::Result<()> {
        let wait = async {
            loop {
                if self.has_element(selector).await? {
                    return Ok::<(), WatchError>(());
                }
                tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(timeout, wait).await.map_err(|_| {
            WatchError::Timeout(format!(
                "selector {} ({} ms)",
                selector,
                timeout.as_millis()
            ))
        })?
    }

    async fn has_element(&self, selector: &str) -> crate::Result<bool> {
        let found = self
            .evaluate(&format!(
                "document.querySelector({}) !== null",
                js_literal(selector)
            ))
            .await?;
        Ok(found.as_bool().unwrap_or(false))
    }

    async fn evaluate(&self, script: &str) -> crate::Result<serde_json::Value> {
        let page = self.page().await?;
        page.evaluate(script)
            .await
            .map_err(|e| driver_err("Script evaluation failed", e))?
            .into_value::<serde_json::Value>()
            .map_err(|e| driver_err("Unexpected script result", e))
    }

    async fn cookies(&self) -> crate::Result<Vec<String>> {
        let page = self.page().await?;
        let cookies = page
            .get_cookies()
            .await
            .map_err(|e| driver_err("Reading cookies", e))?;
        Ok(cookies.into_iter().map(|c| c.name).collect())
    }

    async fn current_url(&self) -> crate::Result<String> {
        let page = self.page().await?;
        let url = page
            .url()
            .await
            .map_err(|e| driver_err("Reading page URL", e))?;
        Ok(url.unwrap_or_default())
    }

    async fn close(&self) -> crate::Result<()> {
        self.page.lock().await.take();
        if let Some(mut browser) = self.browser.lock().await.take() {
            if let Err(e) = browser.close().await {
                tracing::warn!("Failed to close browser cleanly: {}", e);
            }
            let _ = browser.wait().await;
        }
        if let Some(task) = self.handler_task.lock().await.take() {
            let _ = task.await;
        }
        tracing::debug!("Browser closed");
        Ok(())
    }
}
