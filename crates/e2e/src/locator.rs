//! Logical element identities and the conditions asserted against them

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

/// How to find an element.
///
/// Page objects name elements by their `data-testid`; raw CSS/XPath is left
/// for declarative specs and one-off lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    TestId(Cow<'static, str>),
    Css(Cow<'static, str>),
    XPath(Cow<'static, str>),
    /// Any element whose own text contains the value
    Text(Cow<'static, str>),
}

impl Locator {
    /// Test id locator usable in `const` items
    pub const fn id(id: &'static str) -> Self {
        Locator::TestId(Cow::Borrowed(id))
    }

    pub fn test_id(id: impl Into<String>) -> Self {
        Locator::TestId(Cow::Owned(id.into()))
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(Cow::Owned(selector.into()))
    }

    pub fn xpath(path: impl Into<String>) -> Self {
        Locator::XPath(Cow::Owned(path.into()))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Locator::Text(Cow::Owned(text.into()))
    }

    /// Row or item keyed by a resource name, e.g. `storage-row-<name>`
    pub fn keyed(family: &str, key: &str) -> Self {
        Locator::test_id(format!("{}-{}", family, key))
    }

    /// W3C WebDriver `(using, value)` pair
    pub fn to_webdriver(&self) -> (&'static str, String) {
        match self {
            Locator::TestId(id) => ("css selector", format!("[data-testid=\"{}\"]", escape_quotes(id))),
            Locator::Css(css) => ("css selector", css.to_string()),
            Locator::XPath(path) => ("xpath", path.to_string()),
            Locator::Text(text) => (
                "xpath",
                format!("//*[text()[contains(., {})]]", xpath_literal(text)),
            ),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::TestId(id) => write!(f, "#{}", id),
            Locator::Css(css) => write!(f, "css({})", css),
            Locator::XPath(path) => write!(f, "xpath({})", path),
            Locator::Text(text) => write!(f, "text({:?})", text),
        }
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// XPath 1.0 has no escapes; mixed quotes need `concat()`.
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// Snapshot of one matched element, taken during a poll
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    pub text: String,
    pub visible: bool,
    pub enabled: bool,
    /// Current `value` property for inputs
    pub value: Option<String>,
}

impl ElementState {
    pub fn visible(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visible: true,
            enabled: true,
            value: None,
        }
    }

    pub fn is_interactable(&self) -> bool {
        self.visible && self.enabled
    }
}

/// Render a poll result for diagnostics
pub fn describe_states(states: &[ElementState]) -> String {
    match states {
        [] => "no matching element".to_string(),
        [single] => describe_state(single),
        many => format!(
            "{} matches, first: {}",
            many.len(),
            describe_state(&many[0])
        ),
    }
}

fn describe_state(state: &ElementState) -> String {
    let mut text = state.text.replace('\n', " ");
    if text.len() > 80 {
        let mut cut = 80;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push('…');
    }
    format!(
        "{{visible: {}, enabled: {}, text: {:?}{}}}",
        state.visible,
        state.enabled,
        text,
        state
            .value
            .as_ref()
            .map(|v| format!(", value: {:?}", v))
            .unwrap_or_default()
    )
}

/// A property an element (or the set of matches) must have
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// At least one match is displayed
    Visible,
    /// No match is displayed (absent elements count as hidden)
    Hidden,
    Exists,
    Absent,
    Enabled,
    Disabled,
    /// Trimmed text equals the value
    HasText(String),
    ContainsText(String),
    HasValue(String),
    AttributeEquals { name: String, value: String },
    Count(usize),
}

impl Condition {
    /// Whether the condition holds for the polled matches.
    ///
    /// Attribute conditions are evaluated separately since they need an extra
    /// driver round trip; here they only require an element to exist.
    pub fn holds(&self, states: &[ElementState]) -> bool {
        let first = states.first();
        match self {
            Condition::Visible => states.iter().any(|s| s.visible),
            Condition::Hidden => states.iter().all(|s| !s.visible),
            Condition::Exists => !states.is_empty(),
            Condition::Absent => states.is_empty(),
            Condition::Enabled => first.map(|s| s.enabled).unwrap_or(false),
            Condition::Disabled => first.map(|s| !s.enabled).unwrap_or(false),
            Condition::HasText(text) => first.map(|s| s.text.trim() == text).unwrap_or(false),
            Condition::ContainsText(text) => states.iter().any(|s| s.text.contains(text.as_str())),
            Condition::HasValue(value) => first
                .and_then(|s| s.value.as_deref())
                .map(|v| v == value)
                .unwrap_or(false),
            Condition::AttributeEquals { .. } => first.is_some(),
            Condition::Count(n) => states.len() == *n,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Visible => f.write_str("visible"),
            Condition::Hidden => f.write_str("hidden"),
            Condition::Exists => f.write_str("exists"),
            Condition::Absent => f.write_str("absent"),
            Condition::Enabled => f.write_str("enabled"),
            Condition::Disabled => f.write_str("disabled"),
            Condition::HasText(t) => write!(f, "text == {:?}", t),
            Condition::ContainsText(t) => write!(f, "text contains {:?}", t),
            Condition::HasValue(v) => write!(f, "value == {:?}", v),
            Condition::AttributeEquals { name, value } => write!(f, "@{} == {:?}", name, value),
            Condition::Count(n) => write!(f, "count == {}", n),
        }
    }
}

/// Declarative expectation consumed by `ensure`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectationSpec {
    pub locator: Locator,
    pub conditions: Vec<Condition>,
    #[serde(default, with = "opt_millis")]
    pub timeout: Option<Duration>,
}

impl ExpectationSpec {
    pub fn new(locator: Locator, conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self {
            locator,
            conditions: conditions.into_iter().collect(),
            timeout: None,
        }
    }

    pub fn within(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn description(&self) -> String {
        let conditions: Vec<String> = self.conditions.iter().map(|c| c.to_string()).collect();
        format!("{} to be [{}]", self.locator, conditions.join(", "))
    }
}

mod opt_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        value.map(|d| d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Locator::id("login-submit"), "css selector", "[data-testid=\"login-submit\"]" ; "test id")]
    #[test_case(Locator::css("button.primary"), "css selector", "button.primary" ; "css")]
    #[test_case(Locator::xpath("//div"), "xpath", "//div" ; "xpath")]
    #[test_case(Locator::text("Run"), "xpath", "//*[text()[contains(., 'Run')]]" ; "text")]
    fn test_webdriver_strategy(locator: Locator, using: &str, value: &str) {
        let (u, v) = locator.to_webdriver();
        assert_eq!(u, using);
        assert_eq!(v, value);
    }

    #[test]
    fn test_xpath_literal_with_both_quotes() {
        let literal = xpath_literal(r#"it's "x""#);
        assert_eq!(literal, r#"concat('it', "'", 's "x"')"#);
    }

    #[test]
    fn test_conditions_on_empty_matches() {
        let none: Vec<ElementState> = vec![];
        assert!(Condition::Absent.holds(&none));
        assert!(Condition::Hidden.holds(&none));
        assert!(!Condition::Visible.holds(&none));
        assert!(!Condition::Enabled.holds(&none));
        assert!(Condition::Count(0).holds(&none));
    }

    #[test]
    fn test_text_conditions() {
        let states = vec![ElementState::visible("  Storage created \n")];
        assert!(Condition::HasText("Storage created".into()).holds(&states));
        assert!(Condition::ContainsText("created".into()).holds(&states));
        assert!(!Condition::ContainsText("deleted".into()).holds(&states));
    }

    #[test]
    fn test_describe_states_truncates_long_text() {
        let long = "x".repeat(200);
        let rendered = describe_states(&[ElementState::visible(long)]);
        assert!(rendered.len() < 160);
        assert!(rendered.contains("visible: true"));
    }

    #[test]
    fn test_spec_yaml_shape() {
        let spec: ExpectationSpec = serde_yaml::from_str(
            r#"
locator: { test_id: storage-row-data }
conditions: [visible, { contains_text: data }]
timeout: 1500
"#,
        )
        .unwrap();
        assert_eq!(spec.locator, Locator::id("storage-row-data"));
        assert_eq!(spec.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(spec.conditions.len(), 2);
    }
}
