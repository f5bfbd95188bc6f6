//! JSDoc comments (`/** ... */`).

/// Extract the documentation text from a `/** ... */` comment.
pub fn clean(raw: &str) -> String {
    let inner = raw
        .trim()
        .strip_prefix("/**")
        .unwrap_or(raw)
        .strip_suffix("*/")
        .unwrap_or(raw);

    let mut lines: Vec<String> = inner
        .lines()
        .map(|line| {
            let line = line.trim_start();
            let line = line.strip_prefix('*').unwrap_or(line);
            let line = line.strip_prefix(' ').unwrap_or(line);
            line.trim_end().replace("*\\/", "*/")
        })
        .collect();

    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Render documentation text as a JSDoc comment.
///
/// The opening `/**` is not indented (the caller places it); following
/// lines are prefixed with `indent`.
pub fn render(content: &str, indent: &str) -> String {
    let mut out = String::from("/**\n");
    for line in content.lines() {
        let line = line.replace("*/", "*\\/");
        out.push_str(indent);
        if line.trim().is_empty() {
            out.push_str(" *\n");
        } else {
            out.push_str(" * ");
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }
    out.push_str(indent);
    out.push_str(" */");
    out
}
