//! Placeholder substitution for request templates.
//!
//! Templates contain literal JSON examples, so only `{name}` tokens whose
//! name is a known key are replaced; every other brace is copied through.
//! Substitution is single-pass, so values containing `{name}` are never
//! expanded again.

/// Replace `{key}` with its value for each `(key, value)` in `vars`.
pub fn fill_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let replacement = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });

        match replacement {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
