//! Command parameter types exposed by the CDP adapter interface.

use serde::{Deserialize, Serialize};

/// `type` field of `Input.dispatchMouseEvent`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseEventKind {
    #[serde(rename = "mouseMoved")]
    Moved,
    #[serde(rename = "mousePressed")]
    Pressed,
    #[serde(rename = "mouseReleased")]
    Released,
    #[serde(rename = "mouseWheel")]
    Wheel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    None,
    Left,
}

/// Parameters for `Input.dispatchMouseEvent`, coordinates in CSS pixels relative to the
/// viewport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseEvent {
    #[serde(rename = "type")]
    pub kind: MouseEventKind,
    pub x: f64,
    pub y: f64,
    pub button: MouseButton,
    pub buttons: u32,
    pub click_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_y: Option<f64>,
    pub pointer_type: String,
}

impl MouseEvent {
    fn base(kind: MouseEventKind, x: f64, y: f64) -> Self {
        Self {
            kind,
            x,
            y,
            button: MouseButton::None,
            buttons: 0,
            click_count: 0,
            delta_x: None,
            delta_y: None,
            pointer_type: "mouse".to_string(),
        }
    }

    pub fn moved(x: f64, y: f64) -> Self {
        Self::base(MouseEventKind::Moved, x, y)
    }

    pub fn pressed(x: f64, y: f64) -> Self {
        Self {
            button: MouseButton::Left,
            buttons: 1,
            click_count: 1,
            ..Self::base(MouseEventKind::Pressed, x, y)
        }
    }

    pub fn released(x: f64, y: f64) -> Self {
        Self {
            button: MouseButton::Left,
            buttons: 0,
            click_count: 1,
            ..Self::base(MouseEventKind::Released, x, y)
        }
    }

    pub fn wheel(x: f64, y: f64, delta_x: f64, delta_y: f64) -> Self {
        Self {
            delta_x: Some(delta_x),
            delta_y: Some(delta_y),
            ..Self::base(MouseEventKind::Wheel, x, y)
        }
    }
}

/// Parameters for `Emulation.setDeviceMetricsOverride`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetrics {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub mobile: bool,
}

impl DeviceMetrics {
    pub fn desktop(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            device_scale_factor: 1.0,
            mobile: false,
        }
    }
}

/// Live url/title of a page, queried on demand.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub url: String,
    pub title: String,
}
