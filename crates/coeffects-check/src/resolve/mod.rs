//! Checking passes.
//!
//! ```text
//! Manifest → Declaration Table → Override Check → Call-Site Check → Reflection
//! ```

pub mod annotations;
pub mod calls;
pub mod contexts;
pub mod hierarchy;
pub mod overrides;
pub mod pipeline;
pub mod table;
