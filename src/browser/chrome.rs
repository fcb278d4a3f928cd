// spider_chrome re-exports chromiumoxide API
use crate::error::{CaptureError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide_fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

const INSTALL_HINT: &str = "Chrome not found. You can:\n\
     - Install Chrome: https://www.google.com/chrome/\n\
     - Ubuntu/Debian: sudo apt install chromium-browser\n\
     - Fedora: sudo dnf install chromium\n\
     - macOS: brew install --cask google-chrome\n\
     - Or specify path: --chrome-path /path/to/chrome\n\
     - Linux sandbox issue? Try: --no-sandbox\n\
     - Or attach to your own browser: --debug-port 9222";

pub struct ChromeDriver {
    browser: Browser,
    temp_dir: Option<PathBuf>,
    /// Prefer the first tab whose URL contains this
    page_hint: Option<String>,
}

/// Connection mode for Chrome browser
#[derive(Debug, Clone)]
pub enum ConnectionMode {
    /// Launch a dedicated Chrome with a throwaway profile
    Sandboxed {
        chrome_path: Option<String>,
        no_sandbox: bool,
        headless: bool,
    },
    /// Attach to the user's Chrome started with `--remote-debugging-port`,
    /// which keeps the logged-in viewer session
    DebugPort(u16),
}

impl ChromeDriver {
    /// The viewer tab: first page matching the hint, else the first
    /// non-`chrome://` page, else the most recent page.
    async fn get_active_page(&self) -> Result<chromiumoxide::page::Page> {
        let pages = self.browser.pages().await?;

        let mut fallback = None;
        for page in pages.iter() {
            if let Ok(Some(url)) = page.url().await {
                if url.starts_with("chrome://") || url.starts_with("devtools://") {
                    continue;
                }
                match &self.page_hint {
                    Some(hint) if url.contains(hint.as_str()) => return Ok(page.clone()),
                    Some(_) => {
                        if fallback.is_none() {
                            fallback = Some(page.clone());
                        }
                    }
                    None => return Ok(page.clone()),
                }
            }
        }
        if let Some(page) = fallback {
            return Ok(page);
        }

        if let Some(page) = pages.last() {
            return Ok(page.clone());
        }

        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| CaptureError::Other(format!("Failed to create page: {}", e)))
    }

    pub async fn new(mode: ConnectionMode) -> Result<Self> {
        let (browser, temp_dir) = match mode {
            ConnectionMode::Sandboxed {
                chrome_path,
                no_sandbox,
                headless,
            } => {
                let unique_id = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_nanos())
                    .unwrap_or_default();
                let temp_dir = std::env::temp_dir().join(format!("parcelshot-chrome-{}", unique_id));
                std::fs::create_dir_all(&temp_dir).map_err(|e| {
                    CaptureError::LaunchFailed(format!("Failed to create temp directory: {}", e))
                })?;

                let mut config = if headless {
                    BrowserConfig::builder()
                } else {
                    BrowserConfig::builder().with_head()
                };
                config = config.user_data_dir(&temp_dir);

                if no_sandbox {
                    config = config.arg("--no-sandbox");
                }

                if let Some(path) = chrome_path {
                    config = config.chrome_executable(path);
                } else {
                    match Self::ensure_chrome_installed().await {
                        Ok(path) => {
                            config = config.chrome_executable(path);
                        }
                        Err(e) => {
                            warn!("Auto-download failed ({}), trying system Chrome...", e);
                        }
                    }
                }

                let config = config
                    .build()
                    .map_err(|e| CaptureError::LaunchFailed(format!("{}. \n\n{}", e, INSTALL_HINT)))?;
                let (browser, mut handler) = Browser::launch(config)
                    .await
                    .map_err(|e| CaptureError::LaunchFailed(format!("{}. \n\n{}", e, INSTALL_HINT)))?;

                tokio::spawn(async move {
                    while (handler.next().await).is_some() {
                        // Handle browser events
                    }
                });

                (browser, Some(temp_dir))
            }
            ConnectionMode::DebugPort(port) => {
                let url = format!("http://localhost:{}", port);
                let (browser, mut handler) = Browser::connect(&url).await.map_err(|e| {
                    CaptureError::ConnectionFailed(format!(
                        "Failed to connect to Chrome on port {}. \
                             Make sure Chrome is running with --remote-debugging-port={}: {}",
                        port, port, e
                    ))
                })?;

                tokio::spawn(async move {
                    while (handler.next().await).is_some() {
                        // Handle browser events
                    }
                });

                (browser, None)
            }
        };

        Ok(Self {
            browser,
            temp_dir,
            page_hint: None,
        })
    }

    /// Prefer tabs whose URL contains `hint` when picking the viewer tab.
    pub fn with_page_hint(mut self, hint: impl Into<String>) -> Self {
        let hint = hint.into();
        self.page_hint = (!hint.is_empty()).then_some(hint);
        self
    }

    /// Navigate to a URL
    pub async fn navigate(&self, url: &str) -> Result<()> {
        use chromiumoxide::cdp::browser_protocol::page::{EventLoadEventFired, NavigateParams};

        let normalized_url = if !url.starts_with("http://")
            && !url.starts_with("https://")
            && !url.starts_with("file://")
            && !url.starts_with("about:")
            && !url.starts_with("data:")
        {
            debug!("Normalizing URL: {} -> https://{}", url, url);
            format!("https://{}", url)
        } else {
            url.to_string()
        };

        info!("Navigating to {}", normalized_url);
        let page = self.get_active_page().await?;

        let params = NavigateParams::builder()
            .url(&normalized_url)
            .build()
            .map_err(|e| {
                CaptureError::NavigationFailed(format!("Invalid URL {}: {}", normalized_url, e))
            })?;

        let response = page.execute(params).await.map_err(|e| {
            if e.to_string().contains("oneshot canceled") {
                CaptureError::NavigationFailed(
                    "Browser connection lost. The browser may have been closed or crashed."
                        .to_string(),
                )
            } else {
                CaptureError::NavigationFailed(format!(
                    "Failed to navigate to {}: {}",
                    normalized_url, e
                ))
            }
        })?;

        if let Some(error_text) = response.result.error_text.clone() {
            return Err(CaptureError::NavigationFailed(format!(
                "Navigation error: {}",
                error_text
            )));
        }

        let load_result = tokio::time::timeout(
            tokio::time::Duration::from_secs(30),
            page.event_listener::<EventLoadEventFired>(),
        )
        .await;

        match load_result {
            Ok(Ok(_)) => debug!("Page load event fired"),
            Ok(Err(e)) => warn!("Could not wait for load event: {}", e),
            Err(_) => {
                return Err(CaptureError::NavigationFailed(format!(
                    "Timed out waiting for {} to load",
                    normalized_url
                )));
            }
        }

        tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
        Ok(())
    }

    /// Execute arbitrary JavaScript in the page context
    pub async fn execute_script(&self, script: &str) -> Result<serde_json::Value> {
        let page = self.get_active_page().await?;

        let result = page
            .evaluate(script)
            .await
            .map_err(|e| CaptureError::Injection(format!("Script execution failed: {}", e)))?;

        Ok(result.into_value().unwrap_or(serde_json::Value::Null))
    }

    /// Execute JavaScript and return a specific type
    pub async fn execute_script_typed<T: serde::de::DeserializeOwned>(
        &self,
        script: &str,
    ) -> Result<T> {
        let page = self.get_active_page().await?;

        let result = page
            .evaluate(script)
            .await
            .map_err(|e| CaptureError::Injection(format!("Script execution failed: {}", e)))?;

        result
            .into_value()
            .map_err(|e| CaptureError::Injection(format!("Failed to deserialize result: {}", e)))
    }

    /// Get access to the current page for advanced operations
    pub async fn current_page(&self) -> Result<chromiumoxide::page::Page> {
        self.get_active_page().await
    }

    /// Close the browser connection
    pub async fn close(mut self) -> Result<()> {
        self.browser
            .close()
            .await
            .map_err(|e| CaptureError::Other(e.to_string()))?;
        Ok(())
    }

    /// Ensure Chrome is installed, downloading if necessary
    async fn ensure_chrome_installed() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| CaptureError::Other("Cannot determine cache directory".to_string()))?
            .join("parcelshot")
            .join("chrome");

        tokio::fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| CaptureError::Other(format!("Failed to create cache dir: {}", e)))?;

        let revision_info_path = cache_dir.join(".downloaded");
        if revision_info_path.exists() {
            if let Some(executable) = Self::find_chrome_in_cache(&cache_dir).await {
                return Ok(executable);
            }
        }

        info!("Downloading Chrome for Testing (first time only, ~150MB)...");
        let fetcher = BrowserFetcher::new(
            BrowserFetcherOptions::builder()
                .with_path(&cache_dir)
                .build()
                .map_err(|e| CaptureError::Other(format!("Fetcher config failed: {}", e)))?,
        );

        let info = fetcher
            .fetch()
            .await
            .map_err(|e| CaptureError::Other(format!("Chrome download failed: {}", e)))?;

        tokio::fs::write(&revision_info_path, "downloaded")
            .await
            .map_err(|e| CaptureError::Other(format!("Failed to write marker: {}", e)))?;

        info!("Chrome downloaded to {}", info.executable_path.display());
        Ok(info.executable_path)
    }

    async fn find_chrome_in_cache(cache_dir: &Path) -> Option<PathBuf> {
        let possible_paths = [
            cache_dir.join("chrome"),
            cache_dir.join("chrome.exe"),
            cache_dir.join("Google Chrome.app/Contents/MacOS/Google Chrome"),
            cache_dir.join("chrome-linux/chrome"),
            cache_dir.join("chrome-mac/Chromium.app/Contents/MacOS/Chromium"),
            cache_dir.join("chrome-win/chrome.exe"),
        ];

        possible_paths.into_iter().find(|path| path.exists())
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        if let Some(temp_dir) = &self.temp_dir {
            if temp_dir.exists() {
                let _ = std::fs::remove_dir_all(temp_dir);
            }
        }
    }
}
