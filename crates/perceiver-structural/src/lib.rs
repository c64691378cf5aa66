//! Structural perception: indexed snapshots of a page's interactive elements and the
//! scrollable-overlay detector built on top of them.

pub mod errors;
pub mod extract;
pub mod modal;
pub mod model;

pub use errors::PerceiverError;
pub use extract::{extract_element_map, index_selector, INDEX_ATTRIBUTE};
pub use modal::{find_scrollable_modal, select_modal, ModalCandidate};
pub use model::{truncate, BoundingBox, Element, ElementMap};
