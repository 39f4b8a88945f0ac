//! CSV policy file parsing and rendering.
//!
//! One rule per line: the rule key first, then attribute values, separated
//! by commas with optional surrounding whitespace. Blank lines are ignored.
//! Which keys are meaningful is decided by the caller; this module keeps
//! every non-blank line.

use crate::adapter::PolicyRecord;

pub(crate) fn parse(text: &str) -> Vec<PolicyRecord> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.split(',').map(|field| field.trim().to_owned()).collect())
        .collect()
}

pub(crate) fn render(records: &[PolicyRecord]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&record.join(", "));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fields_and_skips_blank_lines() {
        let records = parse("p, alice, blog_post, read\n\ng, bob , reader\n");
        assert_eq!(
            records,
            vec![
                vec!["p", "alice", "blog_post", "read"],
                vec!["g", "bob", "reader"],
            ]
            .into_iter()
            .map(|r: Vec<&str>| r.into_iter().map(String::from).collect::<Vec<_>>())
            .collect::<Vec<_>>()
        );
    }

    #[test]
    fn render_round_trips_through_parse() {
        let records = parse("p, alice, blog_post, read\np, peter, blog_post, modify, deny\n");
        assert_eq!(parse(&render(&records)), records);
    }
}
