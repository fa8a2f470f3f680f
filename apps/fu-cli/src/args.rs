//! The `from <source> to <target> [--context <id>] [--json]` word grammar.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertArgs {
    pub source: String,
    pub target: String,
    pub context: Option<String>,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct UsageError(pub String);

fn usage(msg: impl Into<String>) -> UsageError {
    UsageError(msg.into())
}

/// Split `words` into source and target expressions.
///
/// `--context <id>` (or `--context=<id>`) and `--json` may appear anywhere
/// among the words. The remaining
/// words must start with `from`, contain `to`, and leave both operands
/// non-empty. Operand words are joined with single spaces.
pub fn parse_convert_args(words: &[String]) -> Result<ConvertArgs, UsageError> {
    let mut context = None;
    let mut json = false;
    let mut rest = Vec::with_capacity(words.len());
    let mut iter = words.iter();
    while let Some(word) = iter.next() {
        if word == "--context" {
            let id = iter
                .next()
                .ok_or_else(|| usage("--context needs a context id"))?;
            context = Some(id.clone());
        } else if let Some(id) = word.strip_prefix("--context=") {
            if id.is_empty() {
                return Err(usage("--context needs a context id"));
            }
            context = Some(id.to_string());
        } else if word == "--json" {
            json = true;
        } else {
            rest.push(word.as_str());
        }
    }

    match rest.first() {
        Some(&"from") => {}
        Some(_) => return Err(usage("expected `from <source> to <target>`")),
        None => return Err(usage("missing `from <source> to <target>`")),
    }
    let to = rest
        .iter()
        .position(|w| *w == "to")
        .ok_or_else(|| usage("missing `to` keyword"))?;

    let source = rest[1..to].join(" ");
    let target = rest[to + 1..].join(" ");
    if source.trim().is_empty() {
        return Err(usage("empty source expression after `from`"));
    }
    if target.trim().is_empty() {
        return Err(usage("empty target expression after `to`"));
    }
    Ok(ConvertArgs {
        source,
        target,
        context,
        json,
    })
}
