//! Syntax-tree fact collection.
//!
//! A parsed file is reduced to [`CollectedFacts`] in one traversal:
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────────┐     ┌────────────────┐
//! │ SourceFile      │────▶│ UnifiedTreeCollector │────▶│ CollectedFacts │
//! │ (text + tree)   │     │ (one cursor walk)    │     │ (owned data)   │
//! └─────────────────┘     └──────────────────────┘     └────────────────┘
//!                                                              │
//!                                                              ▼
//!                                                      ┌────────────────┐
//!                                                      │ Detectors      │
//!                                                      └────────────────┘
//! ```
//!
//! The tree is dropped once collection finishes.

mod collector;
mod facts;

pub use collector::UnifiedTreeCollector;
pub use facts::{
    is_constant_name, AssignmentFact, BindingScope, CallFact, ClassFact, CollectedFacts,
    FunctionFact, ImportFact, LiteralContext, LiteralFact, LiteralValue, Location, Suppression,
    SuppressionScope,
};
