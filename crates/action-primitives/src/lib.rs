//! Index-driven browser actions
//!
//! - Tab registry owning every page handle, with last-tab protection
//! - click / type_text / scroll / navigate addressed by snapshot index
//! - MutationObserver-based stability waiting
//! - In-page highlight cues and the annotation overlay

pub mod annotation;
pub mod errors;
pub mod highlight;
mod primitives;
pub mod tabs;
pub mod types;
mod waiting;

#[cfg(test)]
mod test_support;

pub use annotation::AnnotationConfig;
pub use errors::*;
pub use highlight::Highlighter;
pub use primitives::*;
pub use tabs::TabRegistry;
pub use types::*;
pub use waiting::*;
