//! Command-line option parsing.
//!
//! Supports short options (`-x[=]?val`), long options (`--name[=val]?`)
//! and the minimal help/version/verbose/test flag set. Unknown options are
//! reported, not ignored.

use rustc_hash::FxHashMap;

/// Parsed server options.
#[derive(Debug, Clone, Default)]
pub struct Options {
    values: FxHashMap<String, String>,
}

impl Options {
    /// Parse `args` (without the program name).
    ///
    /// # Errors
    ///
    /// Returns the offending argument on malformed input.
    pub fn parse<I, S>(args: I) -> Result<Options, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = FxHashMap::default();
        let mut iter = args.into_iter().peekable();
        while let Some(arg) = iter.next() {
            let arg = arg.as_ref();
            if let Some(rest) = arg.strip_prefix("--") {
                if rest.is_empty() {
                    return Err(arg.to_string());
                }
                match rest.split_once('=') {
                    Some((name, value)) => values.insert(name.to_string(), value.to_string()),
                    None => values.insert(rest.to_string(), String::new()),
                };
            } else if let Some(rest) = arg.strip_prefix('-') {
                if rest.is_empty() {
                    return Err(arg.to_string());
                }
                let (name, inline) = rest.split_at(1);
                let inline = inline.strip_prefix('=').unwrap_or(inline);
                if inline.is_empty() {
                    // `-x val` form: the value is the next argument unless
                    // it looks like another option.
                    let value = match iter.peek() {
                        Some(next) if !next.as_ref().starts_with('-') => {
                            iter.next().map(|s| s.as_ref().to_string()).unwrap_or_default()
                        }
                        _ => String::new(),
                    };
                    values.insert(name.to_string(), value);
                } else {
                    values.insert(name.to_string(), inline.to_string());
                }
            } else {
                return Err(arg.to_string());
            }
        }
        Ok(Options { values })
    }

    /// True when `name` was passed (with or without a value).
    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// The value of `name`, when one was given.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// `--help`.
    pub fn help(&self) -> bool {
        self.is_set("help") || self.is_set("h")
    }

    /// `--version`.
    pub fn version(&self) -> bool {
        self.is_set("version") || self.is_set("V")
    }

    /// `--verbose` raises the log filter.
    pub fn verbose(&self) -> bool {
        self.is_set("verbose") || self.is_set("v")
    }

    /// `--test` disables on-disk cache writes.
    pub fn test_mode(&self) -> bool {
        self.is_set("test")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cangjie_testkit::{must, must_err};
    use pretty_assertions::assert_eq;

    #[test]
    fn long_options_with_and_without_values() {
        let opts = must(Options::parse(["--verbose", "--root=/proj"]));
        assert!(opts.verbose());
        assert_eq!(opts.value("root"), Some("/proj"));
    }

    #[test]
    fn short_options_all_forms() {
        let opts = must(Options::parse(["-p=9000"]));
        assert_eq!(opts.value("p"), Some("9000"));
        let opts = must(Options::parse(["-p9000"]));
        assert_eq!(opts.value("p"), Some("9000"));
        let opts = must(Options::parse(["-p", "9000"]));
        assert_eq!(opts.value("p"), Some("9000"));
    }

    #[test]
    fn positional_arguments_are_rejected() {
        let err = must_err(Options::parse(["stray"]));
        assert_eq!(err, "stray");
    }

    #[test]
    fn test_flag_disables_cache() {
        let opts = must(Options::parse(["--test"]));
        assert!(opts.test_mode());
    }
}
