//! Toolchain registry and availability probing.
//!
//! # Architecture
//!
//! ```text
//! language id / filename
//!     │
//!     └── ToolchainRegistry ──► LanguageProfile
//!                                   │
//!                                   ├── compile: CommandTemplate? ──► Invocation (argv)
//!                                   ├── run:     CommandTemplate  ──► Invocation (argv)
//!                                   │
//!                                   └── required binaries ──► AvailabilityProber (which)
//! ```

mod probe;
mod registry;
mod template;

pub use probe::AvailabilityProber;
pub use registry::{LanguageProfile, ToolchainRegistry};
pub use template::{CommandTemplate, Invocation, Program, Substitution, TemplateArg};
