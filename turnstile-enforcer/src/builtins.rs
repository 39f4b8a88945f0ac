//! Built-in matching functions installed into every enforcer environment.
//!
//! Every built-in is total: malformed patterns, bad IP literals, and
//! non-string arguments yield `false` (or an empty string for the `get`
//! variants) instead of an evaluation error, so one bad policy value never
//! aborts a decision.

use ipnetwork::IpNetwork;
use once_cell::sync::Lazy;
use regex::Regex;
use turnstile_matcher::{Environment, Value};

/// Names installed by [`install`]. Role-mapping stubs registered under one
/// of these names are shadowed; the built-in wins.
pub(crate) const NAMES: &[&str] = &[
    "regexMatch",
    "keyMatch",
    "keyGet",
    "keyMatch2",
    "keyGet2",
    "keyMatch3",
    "keyMatch4",
    "ipMatch",
    "globMatch",
];

/// Installs every built-in, overwriting any colliding entries.
pub(crate) fn install(env: &mut Environment) {
    env.insert(
        "regexMatch".to_owned(),
        Value::function(|args| Ok(Value::Bool(two_strs(args).is_some_and(|(a, b)| regex_match(a, b))))),
    );
    env.insert(
        "keyMatch".to_owned(),
        Value::function(|args| Ok(Value::Bool(two_strs(args).is_some_and(|(a, b)| key_match(a, b))))),
    );
    env.insert(
        "keyGet".to_owned(),
        Value::function(|args| {
            Ok(Value::Str(
                two_strs(args).map_or_else(String::new, |(a, b)| key_get(a, b)),
            ))
        }),
    );
    env.insert(
        "keyMatch2".to_owned(),
        Value::function(|args| Ok(Value::Bool(two_strs(args).is_some_and(|(a, b)| key_match2(a, b))))),
    );
    env.insert(
        "keyGet2".to_owned(),
        Value::function(|args| {
            Ok(Value::Str(
                three_strs(args).map_or_else(String::new, |(a, b, c)| key_get2(a, b, c)),
            ))
        }),
    );
    env.insert(
        "keyMatch3".to_owned(),
        Value::function(|args| Ok(Value::Bool(two_strs(args).is_some_and(|(a, b)| key_match3(a, b))))),
    );
    env.insert(
        "keyMatch4".to_owned(),
        Value::function(|args| Ok(Value::Bool(two_strs(args).is_some_and(|(a, b)| key_match4(a, b))))),
    );
    env.insert(
        "ipMatch".to_owned(),
        Value::function(|args| Ok(Value::Bool(two_strs(args).is_some_and(|(a, b)| ip_match(a, b))))),
    );
    env.insert(
        "globMatch".to_owned(),
        Value::function(|args| Ok(Value::Bool(two_strs(args).is_some_and(|(a, b)| glob_match(a, b))))),
    );
}

fn two_strs(args: &[Value]) -> Option<(&str, &str)> {
    match args {
        [Value::Str(a), Value::Str(b)] => Some((a, b)),
        _ => None,
    }
}

fn three_strs(args: &[Value]) -> Option<(&str, &str, &str)> {
    match args {
        [Value::Str(a), Value::Str(b), Value::Str(c)] => Some((a, b, c)),
        _ => None,
    }
}

/// Anchored regular-expression match: `key1` must match `^key2$`.
fn regex_match(key1: &str, key2: &str) -> bool {
    Regex::new(&format!("^{key2}$")).is_ok_and(|re| re.is_match(key1))
}

/// Glob on `*`: everything up to the star must match as a literal prefix,
/// the tail is arbitrary. Without a star the keys must be equal.
fn key_match(key1: &str, key2: &str) -> bool {
    match key2.find('*') {
        None => key1 == key2,
        Some(i) => {
            let prefix = &key2[..i];
            if key1.len() > i {
                key1.get(..i) == Some(prefix)
            } else {
                key1 == prefix
            }
        }
    }
}

/// Returns the part of `key1` the `*` in `key2` matched, or `""`.
fn key_get(key1: &str, key2: &str) -> String {
    let Some(i) = key2.find('*') else {
        return String::new();
    };
    if key1.len() > i && key1.get(..i) == Some(&key2[..i]) {
        return key1[i..].to_owned();
    }
    String::new()
}

static NAMED_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(":[^/]+").expect("named segment pattern"));
static BRACED_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^/]+\}").expect("braced segment pattern"));
static BRACED_CAPTURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^/]+)\}").expect("braced capture pattern"));

/// URL path match with `:named` segments and `/*` wildcards:
/// `/foo/:id` matches `/foo/42`, `/foo/*` matches `/foo/bar/baz`.
fn key_match2(key1: &str, key2: &str) -> bool {
    let pattern = key2.replace("/*", "/.*");
    let pattern = NAMED_SEGMENT.replace_all(&pattern, "[^/]+");
    regex_match(key1, &pattern)
}

/// Extracts the `:path_var` segment of `key2` from `key1`, or `""`.
fn key_get2(key1: &str, key2: &str, path_var: &str) -> String {
    let pattern = key2.replace("/*", "/.*");
    let names: Vec<String> = NAMED_SEGMENT
        .find_iter(&pattern)
        .map(|m| m.as_str()[1..].to_owned())
        .collect();
    let pattern = NAMED_SEGMENT.replace_all(&pattern, "([^/]+)");
    let Ok(re) = Regex::new(&format!("^{pattern}$")) else {
        return String::new();
    };
    let Some(captures) = re.captures(key1) else {
        return String::new();
    };
    for (i, name) in names.iter().enumerate() {
        if name == path_var {
            return captures
                .get(i + 1)
                .map(|m| m.as_str().to_owned())
                .unwrap_or_default();
        }
    }
    String::new()
}

/// Like [`key_match2`] but with `{named}` placeholder syntax.
fn key_match3(key1: &str, key2: &str) -> bool {
    let pattern = key2.replace("/*", "/.*");
    let pattern = BRACED_SEGMENT.replace_all(&pattern, "[^/]+");
    regex_match(key1, &pattern)
}

/// Like [`key_match3`] but repeated placeholders must bind the same value:
/// `/{id}/books/{id}` matches `/1/books/1` and rejects `/1/books/2`.
fn key_match4(key1: &str, key2: &str) -> bool {
    let pattern = key2.replace("/*", "/.*");
    let mut tokens: Vec<String> = Vec::new();
    let pattern = BRACED_CAPTURE.replace_all(&pattern, |caps: &regex::Captures<'_>| {
        tokens.push(caps[1].to_owned());
        "([^/]+)".to_owned()
    });
    let Ok(re) = Regex::new(&format!("^{pattern}$")) else {
        return false;
    };
    let Some(captures) = re.captures(key1) else {
        return false;
    };

    let mut bound: Vec<(&str, &str)> = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        let Some(value) = captures.get(i + 1).map(|m| m.as_str()) else {
            return false;
        };
        match bound.iter().find(|(name, _)| name == token) {
            Some((_, first)) if *first != value => return false,
            Some(_) => {}
            None => bound.push((token, value)),
        }
    }
    true
}

/// IP equality or CIDR containment: `ip_match("192.168.2.1",
/// "192.168.2.0/24")` is true.
fn ip_match(key1: &str, key2: &str) -> bool {
    let Ok(ip) = key1.parse::<std::net::IpAddr>() else {
        return false;
    };
    if key2.contains('/') {
        return key2
            .parse::<IpNetwork>()
            .is_ok_and(|network| network.contains(ip));
    }
    key2.parse::<std::net::IpAddr>().is_ok_and(|other| other == ip)
}

/// Glob where `*` spans a single path segment and `**` spans any depth.
fn glob_match(key1: &str, pattern: &str) -> bool {
    let mut escaped = regex::escape(pattern);
    escaped = escaped.replace(r"\*\*", ".*");
    escaped = escaped.replace(r"\*", "[^/]*");
    Regex::new(&format!("^{escaped}$")).is_ok_and(|re| re.is_match(key1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_match_is_anchored() {
        assert!(regex_match("/alice_data/foo", "/alice_data/.*"));
        assert!(!regex_match("/bob_data/foo", "/alice_data/.*"));
        assert!(!regex_match("prefix/alice_data/foo", "/alice_data/.*"));
        // A malformed pattern is a non-match, not an error.
        assert!(!regex_match("x", "("));
    }

    #[test]
    fn key_match_handles_the_star() {
        assert!(key_match("/foo/bar", "/foo/*"));
        assert!(key_match("/foo/", "/foo/*"));
        assert!(key_match("/foo", "/foo"));
        assert!(!key_match("/foo/bar", "/bar/*"));
        assert!(!key_match("/foo", "/bar"));
    }

    #[test]
    fn key_get_returns_the_starred_tail() {
        assert_eq!(key_get("/foo/bar", "/foo/*"), "bar");
        assert_eq!(key_get("/foo/bar/baz", "/foo/*"), "bar/baz");
        assert_eq!(key_get("/bar/foo", "/foo/*"), "");
        assert_eq!(key_get("/foo", "/foo"), "");
    }

    #[test]
    fn key_match2_supports_named_segments_and_wildcards() {
        assert!(key_match2("/alice_data/1/using/2", "/alice_data/:a/using/:b"));
        assert!(!key_match2("/alice_data/1/using", "/alice_data/:a/using/:b"));
        assert!(key_match2("/foo/bar/baz", "/foo/*"));
        assert!(key_match2("/resource1", "/:resource"));
        assert!(!key_match2("/a/b", "/:resource"));
    }

    #[test]
    fn key_get2_extracts_a_named_segment() {
        assert_eq!(key_get2("/foo/42", "/foo/:id", "id"), "42");
        assert_eq!(key_get2("/foo/42/bar/7", "/foo/:a/bar/:b", "b"), "7");
        assert_eq!(key_get2("/foo/42", "/foo/:id", "other"), "");
        assert_eq!(key_get2("/bar/42", "/foo/:id", "id"), "");
    }

    #[test]
    fn key_match3_uses_braced_placeholders() {
        assert!(key_match3("/foo/42", "/foo/{id}"));
        assert!(key_match3("/parent/1/child/2", "/parent/{p}/child/{c}"));
        assert!(!key_match3("/foo", "/foo/{id}"));
    }

    #[test]
    fn key_match4_requires_repeated_placeholders_to_agree() {
        assert!(key_match4("/parent/1/child/1", "/parent/{id}/child/{id}"));
        assert!(!key_match4("/parent/1/child/2", "/parent/{id}/child/{id}"));
        assert!(key_match4("/parent/1/child/2", "/parent/{a}/child/{b}"));
    }

    #[test]
    fn ip_match_supports_literals_and_cidr() {
        assert!(ip_match("192.168.2.123", "192.168.2.0/24"));
        assert!(!ip_match("192.168.3.123", "192.168.2.0/24"));
        assert!(ip_match("10.0.0.1", "10.0.0.1"));
        assert!(ip_match("::1", "::1"));
        assert!(ip_match("2001:db8::1", "2001:db8::/32"));
        assert!(!ip_match("not-an-ip", "10.0.0.0/8"));
        assert!(!ip_match("10.0.0.1", "not-a-network/8"));
    }

    #[test]
    fn glob_match_distinguishes_single_and_double_stars() {
        assert!(glob_match("/foo/bar", "/foo/*"));
        assert!(!glob_match("/foo/bar/baz", "/foo/*"));
        assert!(glob_match("/foo/bar/baz", "/foo/**"));
        assert!(!glob_match("/other/bar", "/foo/**"));
    }

    #[test]
    fn builtins_fold_bad_arguments_to_false_or_empty() {
        let mut env = Environment::new();
        install(&mut env);

        let Some(Value::Function(key_match)) = env.get("keyMatch") else {
            panic!("keyMatch not installed");
        };
        assert_eq!(
            key_match(&[Value::Num(1.0), Value::from("/x")]).unwrap(),
            Value::Bool(false)
        );

        let Some(Value::Function(key_get)) = env.get("keyGet") else {
            panic!("keyGet not installed");
        };
        assert_eq!(key_get(&[Value::from("only")]).unwrap(), Value::Str(String::new()));
    }

    #[test]
    fn every_advertised_name_is_installed() {
        let mut env = Environment::new();
        install(&mut env);
        for name in NAMES {
            assert!(
                matches!(env.get(*name), Some(Value::Function(_))),
                "missing builtin {name}"
            );
        }
    }
}
