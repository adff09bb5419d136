//! Minimal OBO `[Term]` stanza parser: `id:`, `name:`, `def:` (the quoted
//! string before the trailing xref list), `synonym:` (quoted, repeatable),
//! `is_a:` (parent id, first whitespace token), `xref:` (repeatable). Lines
//! outside a `[Term]` section are ignored.

use ferrumyx_common::error::{RagError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OboTerm {
    pub id: String,
    pub name: String,
    pub def: Option<String>,
    pub synonyms: Vec<String>,
    pub is_a: Vec<String>,
    pub xrefs: Vec<String>,
}

/// Parses every `[Term]` stanza in `content`. A file yielding zero terms is
/// `Fatal`: the original ontology worker raises rather than silently
/// succeeding on what is presumably a malformed or empty upload.
pub fn parse_obo(content: &str) -> Result<Vec<OboTerm>> {
    let mut terms = Vec::new();
    let mut current: Option<OboTerm> = None;
    let mut in_term = false;

    for line in content.lines() {
        let line = line.trim();
        if line == "[Term]" {
            if let Some(term) = current.take() {
                if !term.id.is_empty() {
                    terms.push(term);
                }
            }
            current = Some(OboTerm::default());
            in_term = true;
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            if let Some(term) = current.take() {
                if !term.id.is_empty() {
                    terms.push(term);
                }
            }
            in_term = false;
            continue;
        }
        if !in_term || line.is_empty() {
            continue;
        }
        let Some(term) = current.as_mut() else { continue };
        let Some((tag, value)) = line.split_once(':') else { continue };
        let value = value.trim();
        match tag {
            "id" => term.id = value.to_string(),
            "name" => term.name = value.to_string(),
            "def" => term.def = Some(quoted_prefix(value).to_string()),
            "synonym" => term.synonyms.push(quoted_prefix(value).to_string()),
            "is_a" => {
                if let Some(parent) = value.split_whitespace().next() {
                    term.is_a.push(parent.to_string());
                }
            }
            "xref" => term.xrefs.push(value.to_string()),
            _ => {}
        }
    }
    if let Some(term) = current.take() {
        if !term.id.is_empty() {
            terms.push(term);
        }
    }

    if terms.is_empty() {
        return Err(RagError::Fatal("OBO source yielded zero terms".into()));
    }
    Ok(terms)
}

/// Extracts the quoted string at the start of a `def:`/`synonym:` value,
/// dropping the trailing xref list (e.g. `"a definition" [XREF:1]`).
fn quoted_prefix(value: &str) -> &str {
    if let Some(rest) = value.strip_prefix('"') {
        if let Some(end) = rest.find('"') {
            return &rest[..end];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_term() {
        let obo = r#"
[Term]
id: GO:0000001
name: mitochondrion inheritance
def: "The distribution of mitochondria." [GOC:mcc]
synonym: "mitochondrial inheritance" EXACT []
is_a: GO:0048308 ! organelle inheritance
xref: Wikipedia:Mitochondrial_inheritance
"#;
        let terms = parse_obo(obo).unwrap();
        assert_eq!(terms.len(), 1);
        let t = &terms[0];
        assert_eq!(t.id, "GO:0000001");
        assert_eq!(t.def.as_deref(), Some("The distribution of mitochondria."));
        assert_eq!(t.synonyms, vec!["mitochondrial inheritance".to_string()]);
        assert_eq!(t.is_a, vec!["GO:0048308".to_string()]);
        assert_eq!(t.xrefs, vec!["Wikipedia:Mitochondrial_inheritance".to_string()]);
    }

    #[test]
    fn ignores_lines_outside_term_stanzas() {
        let obo = "format-version: 1.2\nontology: go\n\n[Term]\nid: GO:1\nname: root\n";
        let terms = parse_obo(obo).unwrap();
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].id, "GO:1");
    }

    #[test]
    fn trailing_blank_term_at_eof_is_not_emitted() {
        let obo = "[Term]\nid: GO:1\nname: root\n\n[Term]\n";
        let terms = parse_obo(obo).unwrap();
        assert_eq!(terms.len(), 1);
    }

    #[test]
    fn zero_terms_is_fatal() {
        let result = parse_obo("format-version: 1.2\n");
        assert!(matches!(result, Err(RagError::Fatal(_))));
    }

    #[test]
    fn multiple_terms_and_typedefs_section_ignored() {
        let obo = "[Term]\nid: GO:1\nname: a\n\n[Typedef]\nid: part_of\n\n[Term]\nid: GO:2\nname: b\nis_a: GO:1\n";
        let terms = parse_obo(obo).unwrap();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[1].is_a, vec!["GO:1".to_string()]);
    }
}
