pub mod about;
pub mod annotator;
pub mod comparator;
pub mod config;
pub mod fallback;
pub mod iupac_code;
pub mod magnifier;
pub mod palette;
pub mod prober;
pub mod resolver;
pub mod selection;
pub mod service;
pub mod slot;
pub mod svg_doc;
pub mod toggle;
pub mod viewport;
pub mod widget;

#[cfg(test)]
mod test_support;

pub use config::WidgetConfig;
pub use service::{HttpImageService, ImageService};
pub use ssview_protocol as protocol;
pub use widget::{Container, Download, Widget, mount};
