//! The record expression language: conditions, derivations and modifiers.
//!
//! All three are closed tagged unions read straight out of a network
//! definition. Conditions test a record, derivations compute one observable
//! from others, and modifiers produce an alternative copy of a whole record.

pub mod condition;
pub mod derivation;
pub mod modifier;
pub mod phonetic;

pub use condition::{Condition, PresenceMode};
pub use derivation::{DeriveContext, Derivation, DerivationKind};
pub use modifier::{Modifier, ModifierRule};
pub use phonetic::PhoneticEncoder;
