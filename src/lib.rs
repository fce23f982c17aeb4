//! # layertree
//!
//! A hierarchical configuration registry.
//!
//! Settings live in a tree of named nodes assembled from ordered layers
//! (defaults, policy, user edits). Clients read and edit the tree through
//! [`Access`] handles obtained from a [`Registry`]:
//!
//! - **Layered data** - every node remembers the layer that wrote it, and
//!   lower layers may finalize a subtree or make an element mandatory
//! - **Buffered edits** - changes made through an update root stay in its
//!   private overlay until [`Access::commit_changes`]
//! - **Locale fallback** - localized properties resolve to the best value
//!   for the root's locale
//! - **Change notification** - listeners are told about local edits, about
//!   commits made through other roots and about applied layers, always
//!   after the registry lock has been released
//!
//! ## Example
//! ```ignore
//! let registry = RegistryBuilder::new(RegistryConfig::new()?)
//!     .component("org.app", app_tree)
//!     .build()?;
//! let settings = registry.create_update_access("/org.app/Settings")?;
//! settings.set_property_value("Count", 7)?;
//! settings.commit_changes()?;
//! ```

mod access;
mod broadcaster;
mod config;
mod constants;
mod errors;
mod modifications;
mod node;
mod path;
mod registry;

pub use access::*;
pub use broadcaster::*;
pub use self::config::*;
pub use constants::ALL_LOCALES;
pub use errors::*;
pub use modifications::*;
pub use node::*;
pub use path::canonicalize as canonicalize_locale;
pub use path::fallback_strings;
pub use path::is_valid_name;
pub use registry::*;


//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
