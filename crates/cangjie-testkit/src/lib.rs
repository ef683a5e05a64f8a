//! Test helpers shared across the workspace.
//!
//! The workspace lints deny `unwrap`/`expect`/`panic!` in every crate, so
//! fixtures extract values through the expectation helpers below instead.
//! All three funnel through one `#[track_caller]` failure path, which
//! keeps the reported location at the asserting test line and gives every
//! failure the same greppable `expectation failed` prefix.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::panic)]

mod fixture;

pub use fixture::FixtureBuilder;

#[track_caller]
fn expectation_failed(wanted: &str, got: String) -> ! {
    panic!("expectation failed: wanted {wanted}, got {got}")
}

/// Unwrap an `Ok`, failing the test with the error's debug form.
///
/// The usual call sites are fixture setup steps (tempdirs, file writes,
/// parses) whose failure means the test environment is broken, not the
/// code under test.
#[track_caller]
pub fn must<T, E: std::fmt::Debug>(step: Result<T, E>) -> T {
    match step {
        Ok(value) => value,
        Err(e) => expectation_failed("Ok(..)", format!("Err({e:?})")),
    }
}

/// Unwrap a `Some`, failing the test when the query came back empty.
///
/// Use for lookups the fixture guarantees to succeed — a symbol that was
/// just indexed, a node that was just parsed. An unexpected `None` here
/// is a regression in the discovery path, and must fail loudly rather
/// than skip the assertions that follow.
#[track_caller]
pub fn must_some<T>(query: Option<T>) -> T {
    match query {
        Some(value) => value,
        None => expectation_failed("Some(..)", "None".to_string()),
    }
}

/// Unwrap an `Err`, failing the test when the operation unexpectedly
/// succeeded. The counterpart to [`must`] for rejection paths (stale
/// shards, cyclic imports, invalid selections).
#[track_caller]
pub fn must_err<T: std::fmt::Debug, E>(step: Result<T, E>) -> E {
    match step {
        Err(e) => e,
        Ok(value) => expectation_failed("Err(..)", format!("Ok({value:?})")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn must_passes_values_through() {
        assert_eq!(must(Ok::<_, String>(7)), 7);
        assert_eq!(must_some(Some("x")), "x");
        assert_eq!(must_err(Err::<i32, _>("nope")), "nope");
    }

    #[test]
    #[should_panic(expected = "expectation failed: wanted Some(..)")]
    fn empty_query_fails_loudly() {
        must_some::<i32>(None);
    }

    #[test]
    #[should_panic(expected = "expectation failed: wanted Ok(..)")]
    fn errored_step_fails_loudly() {
        must(Err::<i32, _>("io"));
    }
}
