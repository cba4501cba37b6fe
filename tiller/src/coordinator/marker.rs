//! Handoff marker grammar.
//!
//! Two forms, matched case-insensitively on `HANDOFF` at any position, target
//! restricted to `[A-Za-z0-9_-]+`, message running to end of line:
//!
//! ```text
//! HANDOFF:coder:now write it
//! [HANDOFF coder] now write it
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

static COLON_FORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)HANDOFF:([A-Za-z0-9_-]+):([^\r\n]*)").expect("colon marker"));

static BRACKET_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[HANDOFF[ \t]+([A-Za-z0-9_-]+)\][ \t]*([^\r\n]*)").expect("bracket marker")
});

/// A parsed handoff directive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandoffDirective {
    pub target: String,
    pub message: String,
}

/// Finds the first handoff marker in `output` (either form, earliest wins).
/// Returns the directive and the output with the matched text stripped; the
/// caller keeps the unstripped text in the transcript.
pub fn parse_handoff(output: &str) -> Option<(HandoffDirective, String)> {
    let colon = COLON_FORM.captures(output);
    let bracket = BRACKET_FORM.captures(output);

    let chosen = match (&colon, &bracket) {
        (Some(c), Some(b)) => {
            let (c0, b0) = (c.get(0).map(|m| m.start()), b.get(0).map(|m| m.start()));
            if c0 <= b0 {
                colon.as_ref()
            } else {
                bracket.as_ref()
            }
        }
        (Some(_), None) => colon.as_ref(),
        (None, Some(_)) => bracket.as_ref(),
        (None, None) => return None,
    }?;

    let whole = chosen.get(0)?;
    let directive = HandoffDirective {
        target: chosen[1].to_string(),
        message: chosen[2].trim().to_string(),
    };
    let mut stripped = String::with_capacity(output.len() - whole.len());
    stripped.push_str(&output[..whole.start()]);
    stripped.push_str(&output[whole.end()..]);
    Some((directive, stripped.trim().to_string()))
}
