//! Browser automation over the W3C WebDriver protocol
//!
//! [`Browser`] is the seam the rest of the harness talks to. The production
//! implementation, [`WebDriverClient`], drives an external driver
//! (chromedriver, geckodriver or a grid) through `thirtyfour`; tests use
//! [`crate::mock::MockBrowser`].

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use thirtyfour::prelude::{By, WebDriver, WebDriverError, WebElement};
use thirtyfour::error::WebDriverErrorInner;
use thirtyfour::{Cookie, WindowHandle};
use tracing::{debug, info, warn};

use pagewalk_common::config::{BrowserConfig, BrowserKind};

use crate::error::{E2eError, E2eResult};
use crate::locator::{ElementState, Locator};

/// Opaque browser tab (WebDriver window handle)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TabId(pub String);

/// Everything the harness needs from a browser
#[async_trait]
pub trait Browser: Send + Sync {
    async fn navigate(&self, url: &str) -> E2eResult<()>;

    async fn current_url(&self) -> E2eResult<String>;

    async fn refresh(&self) -> E2eResult<()>;

    /// Snapshot every element matching `locator`; empty when nothing matches
    async fn query(&self, locator: &Locator) -> E2eResult<Vec<ElementState>>;

    /// Attribute of the first match
    async fn attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>>;

    async fn click(&self, locator: &Locator) -> E2eResult<()>;

    async fn clear(&self, locator: &Locator) -> E2eResult<()>;

    async fn send_keys(&self, locator: &Locator, text: &str) -> E2eResult<()>;

    /// Pick the option labelled `value` inside a select-like element
    async fn select_option(&self, locator: &Locator, value: &str) -> E2eResult<()>;

    async fn set_cookie(&self, name: &str, value: &str) -> E2eResult<()>;

    async fn delete_cookies(&self) -> E2eResult<()>;

    /// Wipe local and session storage of the current origin
    async fn clear_storage(&self) -> E2eResult<()>;

    /// PNG bytes of the current viewport
    async fn screenshot(&self) -> E2eResult<Vec<u8>>;

    async fn open_tab(&self) -> E2eResult<TabId>;

    async fn switch_to_tab(&self, tab: &TabId) -> E2eResult<()>;

    /// The tab commands currently go to
    async fn current_tab(&self) -> E2eResult<TabId>;

    /// Close the current tab
    async fn close_tab(&self) -> E2eResult<()>;

    async fn tabs(&self) -> E2eResult<Vec<TabId>>;

    /// Throw the browser session away and start a fresh one
    async fn restart(&self) -> E2eResult<()>;

    async fn quit(&self) -> E2eResult<()>;
}

/// WebDriver session held through `thirtyfour`
pub struct WebDriverClient {
    endpoint: String,
    capabilities: Map<String, Value>,
    driver: Mutex<Option<WebDriver>>,
}

impl WebDriverClient {
    /// Connect to `config.webdriver_url` and open a browser session
    pub async fn connect(config: &BrowserConfig) -> E2eResult<Self> {
        let client = Self {
            endpoint: config.webdriver_url.trim_end_matches('/').to_string(),
            capabilities: capabilities(config),
            driver: Mutex::new(None),
        };
        client.new_session().await?;
        Ok(client)
    }

    async fn new_session(&self) -> E2eResult<()> {
        let driver = WebDriver::new(self.endpoint.as_str(), self.capabilities.clone())
            .await
            .map_err(failed("new session"))?;
        info!("Opened WebDriver session at {}", self.endpoint);
        *self.driver.lock() = Some(driver);
        Ok(())
    }

    /// Handle to the live session; cheap to clone and safe to hold across awaits
    fn driver(&self) -> E2eResult<WebDriver> {
        self.driver.lock().clone().ok_or(E2eError::NoSession)
    }

    async fn find_all(&self, locator: &Locator) -> E2eResult<Vec<WebElement>> {
        debug!("webdriver find {}", locator);
        let driver = self.driver()?;
        let (using, value) = locator.to_webdriver();
        let found = if using == "xpath" {
            driver.find_all(By::XPath(value.as_str())).await
        } else {
            driver.find_all(By::Css(value.as_str())).await
        };
        found.map_err(failed("find elements"))
    }

    async fn find_first(&self, locator: &Locator, action: &str) -> E2eResult<WebElement> {
        self.find_all(locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| E2eError::ElementNotInteractable {
                element: locator.to_string(),
                state: format!("no matching element to {}", action),
            })
    }
}

async fn element_state(element: &WebElement) -> Result<ElementState, WebDriverError> {
    Ok(ElementState {
        text: element.text().await?,
        visible: element.is_displayed().await?,
        enabled: element.is_enabled().await?,
        value: element.prop("value").await?,
    })
}

/// W3C capabilities for the configured browser
fn capabilities(config: &BrowserConfig) -> Map<String, Value> {
    let size = format!("--window-size={},{}", config.window_width, config.window_height);
    let download_dir = config.download_dir.to_string_lossy().to_string();
    let caps = match config.kind {
        BrowserKind::Chrome => {
            let mut args = vec![size, "--no-sandbox".to_string(), "--disable-dev-shm-usage".to_string()];
            if config.headless {
                args.push("--headless=new".to_string());
            }
            json!({
                "browserName": "chrome",
                "goog:chromeOptions": {
                    "args": args,
                    "prefs": {
                        "download.default_directory": download_dir,
                        "download.prompt_for_download": false,
                    }
                }
            })
        }
        BrowserKind::Firefox => {
            let mut args = vec![
                format!("--width={}", config.window_width),
                format!("--height={}", config.window_height),
            ];
            if config.headless {
                args.push("-headless".to_string());
            }
            json!({
                "browserName": "firefox",
                "moz:firefoxOptions": {
                    "args": args,
                    "prefs": {
                        "browser.download.folderList": 2,
                        "browser.download.dir": download_dir,
                    }
                }
            })
        }
    };
    match caps {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Map a driver error of `command` onto the harness error
fn failed(command: &'static str) -> impl Fn(WebDriverError) -> E2eError {
    move |e| match &*e {
        WebDriverErrorInner::ElementNotInteractable(_)
        | WebDriverErrorInner::ElementClickIntercepted(_) => {
            E2eError::ElementNotInteractable {
                element: command.to_string(),
                state: e.to_string(),
            }
        }
        _ => E2eError::WebDriver {
            command: command.to_string(),
            message: e.to_string(),
        },
    }
}

#[async_trait]
impl Browser for WebDriverClient {
    async fn navigate(&self, url: &str) -> E2eResult<()> {
        self.driver()?
            .goto(url)
            .await
            .map_err(|e| E2eError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn current_url(&self) -> E2eResult<String> {
        let url = self.driver()?.current_url().await.map_err(failed("get url"))?;
        Ok(url.to_string())
    }

    async fn refresh(&self) -> E2eResult<()> {
        self.driver()?.refresh().await.map_err(failed("refresh"))
    }

    async fn query(&self, locator: &Locator) -> E2eResult<Vec<ElementState>> {
        let mut states = Vec::new();
        for element in self.find_all(locator).await? {
            match element_state(&element).await {
                Ok(state) => states.push(state),
                // the element went away between find and read
                Err(e) if matches!(&*e, WebDriverErrorInner::StaleElementReference(_)) => {}
                Err(e) => return Err(failed("read element")(e)),
            }
        }
        Ok(states)
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        let Some(element) = self.find_all(locator).await?.into_iter().next() else {
            return Ok(None);
        };
        element.attr(name).await.map_err(failed("get attribute"))
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        let element = self.find_first(locator, "click").await?;
        element.click().await.map_err(failed("click"))
    }

    async fn clear(&self, locator: &Locator) -> E2eResult<()> {
        let element = self.find_first(locator, "clear").await?;
        element.clear().await.map_err(failed("clear"))
    }

    async fn send_keys(&self, locator: &Locator, text: &str) -> E2eResult<()> {
        let element = self.find_first(locator, "type into").await?;
        element.send_keys(text).await.map_err(failed("send keys"))
    }

    async fn select_option(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.click(locator).await?;
        let option = Locator::xpath(format!(
            "//*[@role='option' or self::option][normalize-space(.)='{}']",
            value.replace('\'', "")
        ));
        self.click(&option).await
    }

    async fn set_cookie(&self, name: &str, value: &str) -> E2eResult<()> {
        self.driver()?
            .add_cookie(Cookie::new(name, value))
            .await
            .map_err(failed("add cookie"))
    }

    async fn delete_cookies(&self) -> E2eResult<()> {
        self.driver()?
            .delete_all_cookies()
            .await
            .map_err(failed("delete cookies"))
    }

    async fn clear_storage(&self) -> E2eResult<()> {
        self.driver()?
            .execute(
                "window.localStorage.clear(); window.sessionStorage.clear();",
                Vec::new(),
            )
            .await
            .map_err(failed("execute script"))?;
        Ok(())
    }

    async fn screenshot(&self) -> E2eResult<Vec<u8>> {
        self.driver()?
            .screenshot_as_png()
            .await
            .map_err(failed("screenshot"))
    }

    async fn open_tab(&self) -> E2eResult<TabId> {
        let handle = self.driver()?.new_tab().await.map_err(failed("new window"))?;
        Ok(TabId(handle.to_string()))
    }

    async fn switch_to_tab(&self, tab: &TabId) -> E2eResult<()> {
        self.driver()?
            .switch_to_window(WindowHandle::from(tab.0.clone()))
            .await
            .map_err(failed("switch window"))
    }

    async fn current_tab(&self) -> E2eResult<TabId> {
        let handle = self.driver()?.window().await.map_err(failed("window handle"))?;
        Ok(TabId(handle.to_string()))
    }

    async fn close_tab(&self) -> E2eResult<()> {
        self.driver()?.close_window().await.map_err(failed("close window"))
    }

    async fn tabs(&self) -> E2eResult<Vec<TabId>> {
        let handles = self.driver()?.windows().await.map_err(failed("window handles"))?;
        Ok(handles.into_iter().map(|h| TabId(h.to_string())).collect())
    }

    async fn restart(&self) -> E2eResult<()> {
        if let Err(e) = self.quit().await {
            warn!("Failed to close previous browser session: {}", e);
        }
        self.new_session().await
    }

    async fn quit(&self) -> E2eResult<()> {
        let Some(driver) = self.driver.lock().take() else {
            return Ok(());
        };
        driver.quit().await.map_err(failed("delete session"))
    }
}
