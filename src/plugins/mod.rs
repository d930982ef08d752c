pub mod adapters;
pub mod manager;
pub mod notifiers;
pub mod traits;

pub use adapters::AdapterKind;
pub use manager::{AdapterBinding, AdapterRegistry};
pub use traits::{NotifierPlugin, SiteAdapter};
