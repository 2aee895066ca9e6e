//! Type definitions for privtree storage.

mod grants;
mod groups;
mod ids;
mod nodes;
mod principals;
mod privileges;
mod resource_groups;
mod users;

// Re-export all types from submodules
pub use grants::*;
pub use groups::*;
pub use ids::*;
pub use nodes::*;
pub use principals::*;
pub use privileges::*;
pub use resource_groups::*;
pub use users::*;
