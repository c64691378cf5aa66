//! Browser tools exposed to the conversational runtime.
//!
//! Raw `(name, args)` pairs are validated into a [`ToolCall`] before anything touches
//! the browser; [`BrowserToolset`] executes them and always answers with a JSON object.

pub mod args;
pub mod browser;
pub mod download;

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::agent_loop::runtime::ToolDeclaration;
use crate::errors::ArgumentError;

pub use args::*;
pub use browser::{BrowserToolset, ScreenshotMode, ToolsetConfig};
pub use download::{DownloadError, DownloadInfo, Downloader};

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    Click(ClickArgs),
    TypeText(TypeTextArgs),
    Scroll(ScrollArgs),
    Navigate(NavigateArgs),
    Wait(WaitArgs),
    GetPageState(GetPageStateArgs),
    NewTab(NewTabArgs),
    SwitchTab(SwitchTabArgs),
    CloseTab(CloseTabArgs),
    ListTabs(ListTabsArgs),
    DownloadFile(DownloadFileArgs),
    RequestHumanTakeover(HumanTakeoverArgs),
    Done(DoneArgs),
}

fn decode<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, ArgumentError> {
    let args = if args.is_null() { json!({}) } else { args.clone() };
    serde_json::from_value(args).map_err(|err| ArgumentError::invalid(tool, err.to_string()))
}

impl ToolCall {
    pub fn parse(name: &str, args: &Value) -> Result<Self, ArgumentError> {
        let call = match name {
            "click" => {
                let click: ClickArgs = decode(name, args)?;
                let has_point = click.x.is_some() && click.y.is_some();
                if click.element_index.is_none() && !has_point {
                    return Err(ArgumentError::invalid(
                        name,
                        "element_index or both x and y are required",
                    ));
                }
                ToolCall::Click(click)
            }
            "type_text" => ToolCall::TypeText(decode(name, args)?),
            "scroll" => ToolCall::Scroll(decode(name, args)?),
            "navigate" => ToolCall::Navigate(decode(name, args)?),
            "wait" => ToolCall::Wait(decode(name, args)?),
            "get_page_state" => ToolCall::GetPageState(decode(name, args)?),
            "new_tab" => ToolCall::NewTab(decode(name, args)?),
            "switch_tab" => ToolCall::SwitchTab(decode(name, args)?),
            "close_tab" => ToolCall::CloseTab(decode(name, args)?),
            "list_tabs" => ToolCall::ListTabs(decode(name, args)?),
            "download_file" => ToolCall::DownloadFile(decode(name, args)?),
            "request_human_takeover" => ToolCall::RequestHumanTakeover(decode(name, args)?),
            "done" => ToolCall::Done(decode(name, args)?),
            other => return Err(ArgumentError::UnknownTool(other.to_string())),
        };
        Ok(call)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::Click(_) => "click",
            ToolCall::TypeText(_) => "type_text",
            ToolCall::Scroll(_) => "scroll",
            ToolCall::Navigate(_) => "navigate",
            ToolCall::Wait(_) => "wait",
            ToolCall::GetPageState(_) => "get_page_state",
            ToolCall::NewTab(_) => "new_tab",
            ToolCall::SwitchTab(_) => "switch_tab",
            ToolCall::CloseTab(_) => "close_tab",
            ToolCall::ListTabs(_) => "list_tabs",
            ToolCall::DownloadFile(_) => "download_file",
            ToolCall::RequestHumanTakeover(_) => "request_human_takeover",
            ToolCall::Done(_) => "done",
        }
    }

    pub fn reasoning(&self) -> Option<&str> {
        let reasoning = match self {
            ToolCall::Click(a) => &a.reasoning,
            ToolCall::TypeText(a) => &a.reasoning,
            ToolCall::Scroll(a) => &a.reasoning,
            ToolCall::Navigate(a) => &a.reasoning,
            ToolCall::Wait(a) => &a.reasoning,
            ToolCall::GetPageState(a) => &a.reasoning,
            ToolCall::NewTab(a) => &a.reasoning,
            ToolCall::SwitchTab(a) => &a.reasoning,
            ToolCall::CloseTab(a) => &a.reasoning,
            ToolCall::ListTabs(a) => &a.reasoning,
            ToolCall::DownloadFile(a) => &a.reasoning,
            ToolCall::RequestHumanTakeover(a) => &a.reasoning,
            ToolCall::Done(a) => &a.reasoning,
        };
        reasoning.as_deref()
    }
}

fn declare<T: JsonSchema>(name: &str, description: &str) -> ToolDeclaration {
    let parameters = serde_json::to_value(schema_for!(T))
        .unwrap_or_else(|_| json!({ "type": "object" }));
    ToolDeclaration {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

/// Declarations for every tool, in the order they are offered to the model.
pub fn declarations() -> Vec<ToolDeclaration> {
    vec![
        declare::<ClickArgs>(
            "click",
            "Click on an element by its index number shown in the annotated screenshot and element map.",
        ),
        declare::<TypeTextArgs>(
            "type_text",
            "Type text into an input field. First clicks the element to focus it, then types the text.",
        ),
        declare::<ScrollArgs>(
            "scroll",
            "Scroll the page or a scrollable container. After clicking a button that opened a modal/popup, use EITHER: (1) element_id if you know the scrollable container's index, OR (2) auto_detect=true to automatically find and scroll the modal. Without either option, this scrolls the main page which won't work for modal content.",
        ),
        declare::<NavigateArgs>("navigate", "Navigate to a specific URL."),
        declare::<WaitArgs>(
            "wait",
            "Wait for the page to stabilize after an action or for dynamic content to load.",
        ),
        declare::<GetPageStateArgs>(
            "get_page_state",
            "Get the current page state including URL, title, and interactive elements. Call this to see what's on the page.",
        ),
        declare::<NewTabArgs>(
            "new_tab",
            "Open a new browser tab with the specified URL. Returns the tab ID for later reference.",
        ),
        declare::<SwitchTabArgs>(
            "switch_tab",
            "Switch to a different browser tab by its ID. Use list_tabs to see available tabs.",
        ),
        declare::<CloseTabArgs>("close_tab", "Close a browser tab by its ID."),
        declare::<ListTabsArgs>(
            "list_tabs",
            "List all open browser tabs with their IDs, URLs, and titles.",
        ),
        declare::<DownloadFileArgs>(
            "download_file",
            "Download a file from a URL. Use use_page_auth=true to use the browser's cookies and authentication context for authenticated downloads.",
        ),
        declare::<HumanTakeoverArgs>(
            "request_human_takeover",
            "Request a human to take over for tasks like login, CAPTCHA, or other actions requiring human intervention.",
        ),
        declare::<DoneArgs>(
            "done",
            "Indicate that the task is complete. Set success=true if the task was accomplished, false otherwise.",
        ),
    ]
}
