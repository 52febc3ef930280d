/// Split a comma-separated tech list, trimming each entry.
///
/// Empty entries are dropped and duplicates keep their first position,
/// so `"Rust, , Go,Rust"` becomes `["Rust", "Go"]`.
pub fn parse_techs(input: &str) -> Vec<String> {
    normalize_techs(input.split(','))
}

/// Same cleanup as [`parse_techs`] for tags that arrive already split.
pub fn normalize_techs<I, S>(techs: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tech in techs {
        let tech = tech.as_ref().trim();
        if tech.is_empty() || out.iter().any(|t| t == tech) {
            continue;
        }
        out.push(tech.to_string());
    }
    out
}
