//! Glob matching for gitscribe.
//!
//! Patterns are translated into anchored regular expressions and matched
//! against `/`-separated paths. Two flavours are supported:
//!
//! - **gitignore** (the default): `*` and `?` never cross a separator and `**`
//!   has its positional meaning (`**/x`, `x/**`, `x/**/y`).
//! - **editorconfig**: brace alternation, `*` crossing separators and a looser
//!   `**`, each switchable through [`GlobOptions`].
//!
//! Matching never fails. A pattern that cannot be compiled matches nothing.

pub mod pattern;
pub mod walk;

pub use pattern::{matches, translate, GlobOptions, Pattern};
pub use walk::{filter, find, match_file_with_glob};
