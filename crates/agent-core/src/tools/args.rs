//! Argument objects for each browser tool.
//!
//! Doc comments double as the parameter descriptions the model sees.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_SCROLL_AMOUNT: u32 = 500;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ClickArgs {
    /// The index number of the element to click (shown in the element map)
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    #[schemars(with = "Option<u32>")]
    pub element_index: Option<u32>,

    /// Viewport x coordinate; only used together with `y` when no index is given
    #[serde(default)]
    pub x: Option<f64>,

    /// Viewport y coordinate; only used together with `x` when no index is given
    #[serde(default)]
    pub y: Option<f64>,

    /// Brief explanation of why you're clicking this element
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TypeTextArgs {
    /// The index number of the input element
    #[serde(deserialize_with = "lenient_u32")]
    #[schemars(with = "u32")]
    pub element_index: u32,

    /// The text to type into the element
    pub text: String,

    /// Brief explanation of why you're typing this text
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ScrollArgs {
    /// Direction to scroll: up or down (required)
    pub direction: String,

    /// Amount to scroll in pixels (default 500)
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    #[schemars(with = "Option<u32>")]
    pub amount: Option<u32>,

    /// Element ID of scrollable container (modal/popup/sidebar). If you know the container
    /// index, provide it here. If unsure, set auto_detect=true instead.
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    #[schemars(with = "Option<u32>")]
    pub element_id: Option<u32>,

    /// Set to true to auto-detect and scroll the most likely modal/scrollable container.
    /// Recommended after clicking buttons that open popups.
    #[serde(default)]
    pub auto_detect: Option<bool>,

    /// Why you are scrolling and whether you are scrolling page or a container
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl ScrollArgs {
    pub fn amount(&self) -> u32 {
        match self.amount {
            Some(0) | None => DEFAULT_SCROLL_AMOUNT,
            Some(amount) => amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NavigateArgs {
    /// The URL to navigate to
    pub url: String,

    /// Brief explanation of why you're navigating to this URL
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WaitArgs {
    /// What you're waiting for
    #[serde(default)]
    pub reason: String,

    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GetPageStateArgs {
    /// Set to true to skip the screenshot and only return the element map
    #[serde(default)]
    pub exclude_screenshot: Option<bool>,

    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NewTabArgs {
    /// The URL to open in the new tab
    pub url: String,

    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SwitchTabArgs {
    /// The ID of the tab to switch to
    pub tab_id: String,

    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CloseTabArgs {
    /// The ID of the tab to close
    pub tab_id: String,

    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListTabsArgs {
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DownloadFileArgs {
    /// The URL of the file to download
    pub url: String,

    /// Optional: custom filename for the downloaded file
    #[serde(default)]
    pub filename: Option<String>,

    /// If true, use the page's cookies and auth context for the download
    #[serde(default)]
    pub use_page_auth: Option<bool>,

    /// Brief explanation of why you're downloading this file
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct HumanTakeoverArgs {
    /// Why human intervention is needed
    pub reason: String,

    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DoneArgs {
    /// Whether the task was completed successfully
    pub success: bool,

    /// Summary of what was accomplished
    pub summary: String,

    /// Any data that was extracted during the task
    #[serde(default)]
    pub data: Option<Map<String, Value>>,

    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Models often send indices as `3.0`; accept any non-negative integral number.
fn index_from_value(value: &Value) -> Option<u32> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(v) = number.as_u64() {
        return u32::try_from(v).ok();
    }
    number
        .as_f64()
        .filter(|v| v.fract() == 0.0 && *v >= 0.0 && *v <= f64::from(u32::MAX))
        .map(|v| v as u32)
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    index_from_value(&value).ok_or_else(|| {
        serde::de::Error::custom(format!("expected a non-negative integer, got {value}"))
    })
}

fn lenient_opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    index_from_value(&value).map(Some).ok_or_else(|| {
        serde::de::Error::custom(format!("expected a non-negative integer, got {value}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn indices_accept_integral_floats() {
        let args: TypeTextArgs =
            serde_json::from_value(json!({ "element_index": 4.0, "text": "hi" })).expect("args");
        assert_eq!(args.element_index, 4);

        let err = serde_json::from_value::<TypeTextArgs>(json!({ "element_index": 1.5, "text": "x" }))
            .expect_err("fractional index");
        assert!(err.to_string().contains("non-negative integer"));

        assert!(serde_json::from_value::<TypeTextArgs>(json!({ "element_index": -1, "text": "x" }))
            .is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_json::from_value::<NavigateArgs>(json!({ "url": "a", "new_tab": true }))
            .expect_err("unknown field");
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn scroll_amount_defaults() {
        let args: ScrollArgs = serde_json::from_value(json!({ "direction": "down" })).expect("args");
        assert_eq!(args.amount(), DEFAULT_SCROLL_AMOUNT);
        let args: ScrollArgs =
            serde_json::from_value(json!({ "direction": "up", "amount": 0, "element_id": null }))
                .expect("args");
        assert_eq!(args.amount(), DEFAULT_SCROLL_AMOUNT);
        assert_eq!(args.element_id, None);
    }

    #[test]
    fn done_data_must_be_an_object() {
        let args: DoneArgs = serde_json::from_value(json!({
            "success": true,
            "summary": "ok",
            "data": { "items": [1, 2] }
        }))
        .expect("args");
        assert_eq!(args.data.expect("data")["items"], json!([1, 2]));

        assert!(serde_json::from_value::<DoneArgs>(json!({
            "success": true,
            "summary": "ok",
            "data": [1, 2]
        }))
        .is_err());
    }
}
