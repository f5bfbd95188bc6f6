//! Python docstring literals.
//!
//! [`clean`] turns a string literal from the source into its documentation
//! text (like `inspect.cleandoc`, plus escape handling for the sequences
//! [`render`] produces). [`render`] goes the other way and always emits a
//! non-raw triple-quoted literal.

/// String prefix characters allowed before the opening quote.
const PREFIX_CHARS: &[char] = &['r', 'R', 'u', 'U', 'b', 'B', 'f', 'F'];

/// Extract the documentation text from a Python string literal.
pub fn clean(raw: &str) -> String {
    let prefix_len = raw.chars().take_while(|c| PREFIX_CHARS.contains(c)).count();
    let is_raw = raw
        .get(..prefix_len)
        .is_some_and(|p| p.contains(['r', 'R']));
    let literal = raw.get(prefix_len..).unwrap_or("");

    let inner = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|q| {
            literal
                .strip_prefix(q)
                .and_then(|rest| rest.strip_suffix(q).or(Some(rest)))
        })
        .unwrap_or(literal);

    let text = if is_raw {
        inner.to_string()
    } else {
        unescape(inner)
    };
    cleandoc(&text)
}

/// Render documentation text as a triple-quoted literal.
///
/// The opening quotes are not indented (the caller places them); every
/// following line, including the closing quotes, is prefixed with `indent`.
pub fn render(content: &str, indent: &str) -> String {
    let mut out = String::from("\"\"\"\n");
    for line in escape(content).lines() {
        if line.trim().is_empty() {
            out.push('\n');
        } else {
            out.push_str(indent);
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str(indent);
    out.push_str("\"\"\"");
    out
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"")
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(&next) = chars.peek()
            && matches!(next, '\\' | '"' | '\'')
        {
            out.push(next);
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}

/// Strip the uniform indentation of lines after the first, and leading and
/// trailing blank lines.
fn cleandoc(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let margin = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<String> = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            cleaned.push(line.trim().to_string());
        } else {
            let stripped = line.get(margin.min(line.len())..).unwrap_or("");
            cleaned.push(if line.trim().is_empty() {
                String::new()
            } else {
                stripped.trim_end().to_string()
            });
        }
    }

    while cleaned.first().is_some_and(|l| l.is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|l| l.is_empty()) {
        cleaned.pop();
    }
    cleaned.join("\n")
}
