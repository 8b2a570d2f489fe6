//! In-memory browser and clock for exercising the harness without a driver
//!
//! [`MockBrowser`] keeps a flat list of elements keyed by [`Locator`].
//! Tests script the console by attaching reactions to clicks, typed input
//! and navigation; [`ManualClock`] makes every wait finish instantly while
//! still accounting for the time it would have taken.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{E2eError, E2eResult};
use crate::locator::{ElementState, Locator};
use crate::wait::Clock;
use crate::webdriver::{Browser, TabId};

/// Clock that only moves when slept on or advanced
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

/// One scripted element
#[derive(Debug, Clone)]
pub struct MockElement {
    pub locator: Locator,
    pub text: String,
    pub visible: bool,
    pub enabled: bool,
    pub value: Option<String>,
    pub attributes: HashMap<String, String>,
}

impl MockElement {
    pub fn new(locator: Locator) -> Self {
        Self {
            locator,
            text: String::new(),
            visible: true,
            enabled: true,
            value: None,
            attributes: HashMap::new(),
        }
    }

    /// Text input with an empty value
    pub fn input(locator: Locator) -> Self {
        Self {
            value: Some(String::new()),
            ..Self::new(locator)
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    fn matches(&self, locator: &Locator) -> bool {
        if &self.locator == locator {
            return true;
        }
        match locator {
            Locator::Text(needle) => self.visible && self.text.contains(needle.as_ref()),
            _ => false,
        }
    }

    fn state(&self) -> ElementState {
        ElementState {
            text: self.text.clone(),
            visible: self.visible,
            enabled: self.enabled,
            value: self.value.clone(),
        }
    }
}

/// Document state shared by every tab of a [`MockBrowser`]
#[derive(Debug, Default)]
pub struct MockDom {
    pub url: String,
    pub cookies: BTreeMap<String, String>,
    elements: Vec<MockElement>,
    /// Elements that show up after the given number of missed polls
    pending: Vec<(MockElement, usize)>,
}

impl MockDom {
    pub fn add(&mut self, element: MockElement) {
        self.elements.push(element);
    }

    /// Add an element that stays invisible to the next `misses` queries for it
    pub fn add_after_polls(&mut self, element: MockElement, misses: usize) {
        self.pending.push((element, misses));
    }

    pub fn remove(&mut self, locator: &Locator) {
        self.elements.retain(|e| &e.locator != locator);
        self.pending.retain(|(e, _)| &e.locator != locator);
    }

    /// Drop every element, as a full page change would
    pub fn clear(&mut self) {
        self.elements.clear();
        self.pending.clear();
    }

    pub fn contains(&self, locator: &Locator) -> bool {
        self.elements.iter().any(|e| e.matches(locator))
    }

    pub fn get(&self, locator: &Locator) -> Option<&MockElement> {
        self.elements.iter().find(|e| e.matches(locator))
    }

    pub fn get_mut(&mut self, locator: &Locator) -> Option<&mut MockElement> {
        self.elements.iter_mut().find(|e| e.matches(locator))
    }

    /// Current value of an input
    pub fn value(&self, locator: &Locator) -> Option<String> {
        self.get(locator).and_then(|e| e.value.clone())
    }

    pub fn set_text(&mut self, locator: &Locator, text: impl Into<String>) {
        if let Some(element) = self.get_mut(locator) {
            element.text = text.into();
        }
    }

    pub fn set_attr(&mut self, locator: &Locator, name: &str, value: impl Into<String>) {
        if let Some(element) = self.get_mut(locator) {
            element.attributes.insert(name.to_string(), value.into());
        }
    }

    fn query(&mut self, locator: &Locator) -> Vec<ElementState> {
        let mut promoted = Vec::new();
        for (index, (element, misses)) in self.pending.iter_mut().enumerate() {
            if element.matches(locator) || &element.locator == locator {
                if *misses == 0 {
                    promoted.push(index);
                } else {
                    *misses -= 1;
                }
            }
        }
        for index in promoted.into_iter().rev() {
            let (element, _) = self.pending.remove(index);
            self.elements.push(element);
        }

        self.elements
            .iter()
            .filter(|e| e.matches(locator))
            .map(MockElement::state)
            .collect()
    }
}

pub type Reaction = Arc<dyn Fn(&mut MockDom) + Send + Sync>;
pub type NavigationReaction = Arc<dyn Fn(&mut MockDom, &str) + Send + Sync>;
/// Reaction to an interaction with any element
pub type ElementReaction = Arc<dyn Fn(&mut MockDom, &Locator) + Send + Sync>;
pub type TabReaction = Arc<dyn Fn(&mut MockDom, &TabId) + Send + Sync>;

#[derive(Default)]
struct Scripts {
    on_click: HashMap<Locator, Vec<Reaction>>,
    on_keys: HashMap<Locator, Vec<Reaction>>,
    on_any_click: Vec<ElementReaction>,
    on_any_keys: Vec<ElementReaction>,
    on_navigate: Vec<NavigationReaction>,
    on_tab_switch: Vec<TabReaction>,
    unreachable: Vec<String>,
}

#[derive(Debug, Default)]
struct Journal {
    clicks: Vec<Locator>,
    navigations: Vec<String>,
    restarts: usize,
    screenshots: usize,
}

#[derive(Debug)]
struct Tabs {
    open: Vec<TabId>,
    current: usize,
    next_id: usize,
}

impl Default for Tabs {
    fn default() -> Self {
        Self {
            open: vec![TabId("tab-0".to_string())],
            current: 0,
            next_id: 1,
        }
    }
}

/// Scriptable in-memory [`Browser`]
#[derive(Default)]
pub struct MockBrowser {
    dom: Mutex<MockDom>,
    scripts: Mutex<Scripts>,
    journal: Mutex<Journal>,
    tabs: Mutex<Tabs>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect or mutate the document
    pub fn dom<R>(&self, f: impl FnOnce(&mut MockDom) -> R) -> R {
        f(&mut self.dom.lock())
    }

    pub fn on_click(&self, locator: Locator, reaction: impl Fn(&mut MockDom) + Send + Sync + 'static) {
        self.scripts
            .lock()
            .on_click
            .entry(locator)
            .or_default()
            .push(Arc::new(reaction));
    }

    pub fn on_keys(&self, locator: Locator, reaction: impl Fn(&mut MockDom) + Send + Sync + 'static) {
        self.scripts
            .lock()
            .on_keys
            .entry(locator)
            .or_default()
            .push(Arc::new(reaction));
    }

    /// Runs after the per-locator reactions of every click
    pub fn on_any_click(&self, reaction: impl Fn(&mut MockDom, &Locator) + Send + Sync + 'static) {
        self.scripts.lock().on_any_click.push(Arc::new(reaction));
    }

    /// Runs after the per-locator reactions of every `send_keys`/`select_option`
    pub fn on_any_keys(&self, reaction: impl Fn(&mut MockDom, &Locator) + Send + Sync + 'static) {
        self.scripts.lock().on_any_keys.push(Arc::new(reaction));
    }

    pub fn on_navigate(&self, reaction: impl Fn(&mut MockDom, &str) + Send + Sync + 'static) {
        self.scripts.lock().on_navigate.push(Arc::new(reaction));
    }

    pub fn on_tab_switch(&self, reaction: impl Fn(&mut MockDom, &TabId) + Send + Sync + 'static) {
        self.scripts.lock().on_tab_switch.push(Arc::new(reaction));
    }

    /// Make navigation to any url starting with `prefix` fail
    pub fn unreachable(&self, prefix: impl Into<String>) {
        self.scripts.lock().unreachable.push(prefix.into());
    }

    pub fn clicks(&self) -> Vec<Locator> {
        self.journal.lock().clicks.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.journal.lock().navigations.clone()
    }

    pub fn restarts(&self) -> usize {
        self.journal.lock().restarts
    }

    pub fn screenshots_taken(&self) -> usize {
        self.journal.lock().screenshots
    }

    fn interactable(&self, locator: &Locator) -> E2eResult<()> {
        let dom = self.dom.lock();
        match dom.get(locator) {
            Some(e) if e.visible && e.enabled => Ok(()),
            Some(e) => Err(E2eError::ElementNotInteractable {
                element: locator.to_string(),
                state: format!("visible: {}, enabled: {}", e.visible, e.enabled),
            }),
            None => Err(E2eError::ElementNotInteractable {
                element: locator.to_string(),
                state: "no matching element".to_string(),
            }),
        }
    }

    fn run(&self, reactions: Option<Vec<Reaction>>) {
        for reaction in reactions.unwrap_or_default() {
            reaction(&mut self.dom.lock());
        }
    }

    fn react_to_click(&self, locator: &Locator) {
        let (reactions, any) = {
            let scripts = self.scripts.lock();
            (scripts.on_click.get(locator).cloned(), scripts.on_any_click.clone())
        };
        self.run(reactions);
        for reaction in any {
            reaction(&mut self.dom.lock(), locator);
        }
    }

    fn react_to_keys(&self, locator: &Locator) {
        let (reactions, any) = {
            let scripts = self.scripts.lock();
            (scripts.on_keys.get(locator).cloned(), scripts.on_any_keys.clone())
        };
        self.run(reactions);
        for reaction in any {
            reaction(&mut self.dom.lock(), locator);
        }
    }
}

#[async_trait]
impl Browser for MockBrowser {
    async fn navigate(&self, url: &str) -> E2eResult<()> {
        let (blocked, reactions) = {
            let scripts = self.scripts.lock();
            (
                scripts.unreachable.iter().any(|p| url.starts_with(p.as_str())),
                scripts.on_navigate.clone(),
            )
        };
        if blocked {
            return Err(E2eError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_REFUSED".to_string(),
            });
        }
        self.journal.lock().navigations.push(url.to_string());
        let mut dom = self.dom.lock();
        dom.url = url.to_string();
        for reaction in reactions {
            reaction(&mut dom, url);
        }
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        Ok(self.dom.lock().url.clone())
    }

    async fn refresh(&self) -> E2eResult<()> {
        let url = self.dom.lock().url.clone();
        self.navigate(&url).await
    }

    async fn query(&self, locator: &Locator) -> E2eResult<Vec<ElementState>> {
        Ok(self.dom.lock().query(locator))
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        let mut dom = self.dom.lock();
        // reading an attribute is a poll too, so pending elements may appear
        dom.query(locator);
        Ok(dom.get(locator).and_then(|e| e.attributes.get(name).cloned()))
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        self.interactable(locator)?;
        self.journal.lock().clicks.push(locator.clone());
        self.react_to_click(locator);
        Ok(())
    }

    async fn clear(&self, locator: &Locator) -> E2eResult<()> {
        self.interactable(locator)?;
        if let Some(element) = self.dom.lock().get_mut(locator) {
            element.value = Some(String::new());
        }
        Ok(())
    }

    async fn send_keys(&self, locator: &Locator, text: &str) -> E2eResult<()> {
        {
            let mut dom = self.dom.lock();
            let element = dom.get_mut(locator).ok_or_else(|| E2eError::ElementNotInteractable {
                element: locator.to_string(),
                state: "no matching element".to_string(),
            })?;
            element.value.get_or_insert_with(String::new).push_str(text);
        }
        self.react_to_keys(locator);
        Ok(())
    }

    async fn select_option(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.interactable(locator)?;
        if let Some(element) = self.dom.lock().get_mut(locator) {
            element.value = Some(value.to_string());
        }
        self.react_to_keys(locator);
        Ok(())
    }

    async fn set_cookie(&self, name: &str, value: &str) -> E2eResult<()> {
        self.dom.lock().cookies.insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn delete_cookies(&self) -> E2eResult<()> {
        self.dom.lock().cookies.clear();
        Ok(())
    }

    async fn clear_storage(&self) -> E2eResult<()> {
        Ok(())
    }

    async fn screenshot(&self) -> E2eResult<Vec<u8>> {
        self.journal.lock().screenshots += 1;
        // PNG signature, enough for a file to be recognisable
        Ok(vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
    }

    async fn open_tab(&self) -> E2eResult<TabId> {
        let mut tabs = self.tabs.lock();
        let tab = TabId(format!("tab-{}", tabs.next_id));
        tabs.next_id += 1;
        tabs.open.push(tab.clone());
        Ok(tab)
    }

    async fn switch_to_tab(&self, tab: &TabId) -> E2eResult<()> {
        {
            let mut tabs = self.tabs.lock();
            let index = tabs
                .open
                .iter()
                .position(|t| t == tab)
                .ok_or_else(|| E2eError::WebDriver {
                    command: "switch window".to_string(),
                    message: format!("no such window: {}", tab.0),
                })?;
            tabs.current = index;
        }
        let reactions = self.scripts.lock().on_tab_switch.clone();
        for reaction in reactions {
            reaction(&mut self.dom.lock(), tab);
        }
        Ok(())
    }

    async fn current_tab(&self) -> E2eResult<TabId> {
        let tabs = self.tabs.lock();
        Ok(tabs.open[tabs.current].clone())
    }

    async fn close_tab(&self) -> E2eResult<()> {
        let mut tabs = self.tabs.lock();
        if tabs.open.len() <= 1 {
            return Err(E2eError::WebDriver {
                command: "close window".to_string(),
                message: "refusing to close the last tab".to_string(),
            });
        }
        let current = tabs.current;
        tabs.open.remove(current);
        tabs.current = 0;
        Ok(())
    }

    async fn tabs(&self) -> E2eResult<Vec<TabId>> {
        Ok(self.tabs.lock().open.clone())
    }

    async fn restart(&self) -> E2eResult<()> {
        self.journal.lock().restarts += 1;
        *self.tabs.lock() = Tabs::default();
        let mut dom = self.dom.lock();
        dom.cookies.clear();
        dom.url = "about:blank".to_string();
        Ok(())
    }

    async fn quit(&self) -> E2eResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_click_runs_reactions() {
        let browser = MockBrowser::new();
        browser.dom(|dom| dom.add(MockElement::new(Locator::id("go"))));
        browser.on_click(Locator::id("go"), |dom| {
            dom.add(MockElement::new(Locator::id("done")).text("Done"));
        });

        browser.click(&Locator::id("go")).await.unwrap();
        assert!(browser.dom(|dom| dom.contains(&Locator::id("done"))));
        assert_eq!(browser.clicks(), vec![Locator::id("go")]);
    }

    #[tokio::test]
    async fn test_click_on_hidden_element_fails() {
        let browser = MockBrowser::new();
        browser.dom(|dom| dom.add(MockElement::new(Locator::id("go")).hidden()));
        let err = browser.click(&Locator::id("go")).await.unwrap_err();
        assert!(matches!(err, E2eError::ElementNotInteractable { .. }));
    }

    #[tokio::test]
    async fn test_text_locator_matches_visible_text() {
        let browser = MockBrowser::new();
        browser.dom(|dom| {
            dom.add(MockElement::new(Locator::id("a")).text("hello world"));
            dom.add(MockElement::new(Locator::id("b")).text("hello again").hidden());
        });
        let states = browser.query(&Locator::text("hello")).await.unwrap();
        assert_eq!(states.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_elements_appear_after_misses() {
        let browser = MockBrowser::new();
        browser.dom(|dom| dom.add_after_polls(MockElement::new(Locator::id("late")), 2));
        assert!(browser.query(&Locator::id("late")).await.unwrap().is_empty());
        assert!(browser.query(&Locator::id("late")).await.unwrap().is_empty());
        assert_eq!(browser.query(&Locator::id("late")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_any_click_sees_locator() {
        let browser = MockBrowser::new();
        browser.dom(|dom| dom.add(MockElement::new(Locator::keyed("row", "a"))));
        browser.on_any_click(|dom, locator| {
            dom.add(MockElement::new(Locator::id("clicked")).text(locator.to_string()));
        });
        browser.click(&Locator::keyed("row", "a")).await.unwrap();
        assert!(browser.dom(|dom| dom.contains(&Locator::id("clicked"))));
    }

    #[tokio::test]
    async fn test_tabs() {
        let browser = MockBrowser::new();
        let second = browser.open_tab().await.unwrap();
        assert_eq!(browser.tabs().await.unwrap().len(), 2);
        browser.switch_to_tab(&second).await.unwrap();
        browser.close_tab().await.unwrap();
        assert_eq!(browser.tabs().await.unwrap().len(), 1);
        assert!(browser.switch_to_tab(&second).await.is_err());
        assert!(browser.close_tab().await.is_err());
    }
}
