//! The configuration manager: owns every loaded root, answers queries,
//! routes mutations, and dispatches change notifications.
//!
//! Construction is explicit: [`ConfigurationManager::open`] takes the module
//! registry and performs the whole load — override resolution, locale
//! filtering, directive application, and the per-module namespace merge.
//! There is no global instance.

pub mod loader;
pub mod manager;
pub mod merge;
pub mod writer;

pub use loader::ConfigurationReader;
pub use manager::{
    ChangeNotice, ConfigurationManager, ManagerOptions, PropertyRef, SubscriptionId,
};
pub use merge::merge_module_roots;
pub use writer::{ConfigurationWriter, SavePolicy};
