/// Verse body with its optional reference line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerseText {
    pub text: String,
    pub reference: Option<String>,
}

impl VerseText {
    /// Split "text - reference" or "text (reference)".
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some((text, reference)) = raw.split_once(" - ") {
            return Self::from_parts(text, reference);
        }
        if let Some(close) = raw.rfind(')')
            && let Some(open) = raw[..close].rfind('(')
        {
            return Self::from_parts(&raw[..open], &raw[open + 1..close]);
        }
        Self {
            text: raw.to_string(),
            reference: None,
        }
    }

    fn from_parts(text: &str, reference: &str) -> Self {
        let reference = reference.trim();
        Self {
            text: text.trim().to_string(),
            reference: (!reference.is_empty()).then(|| reference.to_string()),
        }
    }
}
