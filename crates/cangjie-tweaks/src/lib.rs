//! Rule-driven refactorings.
//!
//! A tweak is a refactoring plug-in with a `prepare`/`apply` contract:
//! `prepare` is side-effect free and validates applicability (recording a
//! numeric `ErrorCode` in the extra options when it fails), `apply`
//! computes [`TextEdit`] batches by file URI. The registry enumerates the
//! built-in tweaks for `textDocument/codeAction`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod edits;
mod engine;
mod extract_function;
mod extract_variable;
mod introduce_constant;
mod utils;

pub use edits::{TextEdit, apply_text_edits};
pub use engine::{
    Effect, Tweak, TweakRef, TweakRule, TweakRuleEngine, TweakSelection, common_check,
    prepare_tweak, prepare_tweaks, registry,
};
pub use extract_function::ExtractFunction;
pub use extract_variable::ExtractVariable;
pub use introduce_constant::IntroduceConstant;
