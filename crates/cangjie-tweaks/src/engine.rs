//! The tweak contract, rule engine and registry.

use crate::edits::TextEdit;
use cangjie_ast::Range;
use cangjie_project::ArkAst;
use cangjie_selection::{Selection, SelectionTree};
use std::collections::BTreeMap;

/// The input every tweak sees: the active file's snapshot, its source
/// text, the selected range and the selection tree built over it.
pub struct TweakSelection<'a> {
    /// The active file's compiled snapshot.
    pub ast: &'a ArkAst,
    /// The file's full source text (edits are computed against it).
    pub source: &'a str,
    /// Selected range, inclusive endpoints.
    pub range: Range,
    /// Selection tree over the containing top-level decl.
    pub tree: SelectionTree,
    /// Options passed by the client (e.g. `suggestName`).
    pub extra_options: BTreeMap<String, String>,
}

/// What an applied tweak produces.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Effect {
    /// A message for the client to show, if any.
    pub show_message: Option<String>,
    /// Edits grouped by file URI, in source order per file.
    pub edits_by_uri: BTreeMap<String, Vec<TextEdit>>,
    /// Whether the client should format the changed ranges.
    pub format: bool,
}

impl Effect {
    /// An effect that only shows a message.
    pub fn message(text: impl Into<String>) -> Self {
        Self { show_message: Some(text.into()), ..Effect::default() }
    }

    /// Add one file's edits.
    pub fn with_edits(mut self, uri: impl Into<String>, edits: Vec<TextEdit>) -> Self {
        self.edits_by_uri.insert(uri.into(), edits);
        self.format = true;
        self
    }
}

/// A refactoring plug-in.
pub trait Tweak: Send + Sync {
    /// Stable id, also the `applyTweak` argument.
    fn id(&self) -> &'static str;

    /// Single-line title for the UI.
    fn title(&self) -> String;

    /// Code-action kind (`refactor.extract`, ...).
    fn kind(&self) -> &'static str;

    /// Side-effect-free validity check. On failure the implementation
    /// records a numeric reason under `"ErrorCode"` in `extra`.
    fn prepare(&self, sel: &TweakSelection<'_>, extra: &mut BTreeMap<String, String>) -> bool;

    /// Compute the edits. `None` means the tweak turned out inapplicable
    /// at apply time.
    fn apply(&self, sel: &TweakSelection<'_>) -> Option<Effect>;
}

/// A prepared tweak reference, as listed in a code-action response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweakRef {
    /// Tweak id to pass back for apply.
    pub id: String,
    /// UI title.
    pub title: String,
    /// Code-action kind.
    pub kind: String,
    /// Extra options (error codes from failed prepares are surfaced the
    /// same way).
    pub extra_options: BTreeMap<String, String>,
}

/// One validity rule: `(selection, extra) -> pass?`.
pub trait TweakRule {
    /// Check the rule, recording an error code on failure.
    fn check(&self, sel: &TweakSelection<'_>, extra: &mut BTreeMap<String, String>) -> bool;
}

/// Runs rules in order, short-circuiting on the first failure.
#[derive(Default)]
pub struct TweakRuleEngine {
    rules: Vec<Box<dyn TweakRule>>,
}

impl TweakRuleEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule.
    pub fn add_rule(&mut self, rule: Box<dyn TweakRule>) {
        self.rules.push(rule);
    }

    /// True when every rule passes.
    pub fn check_rules(
        &self,
        sel: &TweakSelection<'_>,
        extra: &mut BTreeMap<String, String>,
    ) -> bool {
        self.rules.iter().all(|rule| rule.check(sel, extra))
    }
}

/// The common prefix rule: a non-empty range, a built tree, and at least
/// one `Complete` node somewhere in it.
pub fn common_check(sel: &TweakSelection<'_>, extra: &mut BTreeMap<String, String>) -> bool {
    if sel.range.start == sel.range.end {
        extra.insert("ErrorCode".to_string(), "1".to_string());
        return false;
    }
    let Some(_root) = sel.tree.root() else {
        extra.insert("ErrorCode".to_string(), "2".to_string());
        return false;
    };
    let mut has_complete = false;
    sel.tree.walk_all(&mut |node| {
        if node.selected == Selection::Complete {
            has_complete = true;
            return cangjie_ast::WalkAction::Stop;
        }
        cangjie_ast::WalkAction::WalkChildren
    });
    if !has_complete {
        extra.insert("ErrorCode".to_string(), "3".to_string());
        return false;
    }
    true
}

/// All built-in tweaks.
pub fn registry() -> Vec<Box<dyn Tweak>> {
    vec![
        Box::new(crate::extract_function::ExtractFunction),
        Box::new(crate::extract_variable::ExtractVariable),
        Box::new(crate::introduce_constant::IntroduceConstant),
    ]
}

/// Prepare every registered tweak against `sel`, returning a reference per
/// tweak with its outcome options. Tweaks that fail prepare are still
/// listed with their `ErrorCode` so the client can grey them out.
pub fn prepare_tweaks(sel: &TweakSelection<'_>) -> Vec<TweakRef> {
    registry()
        .into_iter()
        .map(|tweak| {
            let mut extra = BTreeMap::new();
            let ok = tweak.prepare(sel, &mut extra);
            if ok {
                extra.remove("ErrorCode");
            }
            TweakRef {
                id: tweak.id().to_string(),
                title: tweak.title(),
                kind: tweak.kind().to_string(),
                extra_options: extra,
            }
        })
        .collect()
}

/// Prepare the tweak with `id`; `None` when it is unknown or its prepare
/// rejects the selection.
pub fn prepare_tweak(id: &str, sel: &TweakSelection<'_>) -> Option<Box<dyn Tweak>> {
    let tweak = registry().into_iter().find(|t| t.id() == id)?;
    let mut extra = BTreeMap::new();
    tweak.prepare(sel, &mut extra).then_some(tweak)
}
