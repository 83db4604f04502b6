use std::sync::OnceLock;

use regex::Regex;
use restamp_core::{
    CustomizeOptions, DomPage, LocatorKind, MatchEvidence, RestampError, RestampResult,
};

/// Tags scanned by the text-phrase fallback, in document order.
const TEXT_SCAN_TAGS: &[&str] = &["a", "div", "span"];

/// One entry in the ordered locator list. Earlier entries win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heuristic {
    /// `tag.class` or `.class`
    ClassExact { tag: Option<String>, class: String },
    /// `tag[attr*="value"]` or `[attr*="value"]`; bare `=` is accepted
    /// and treated as a substring match as well.
    AttrContains {
        tag: Option<String>,
        attr: String,
        needle: String,
    },
}

fn selector_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^([a-zA-Z][a-zA-Z0-9-]*)?(?:\.([A-Za-z0-9_-]+)|\[([a-zA-Z][a-zA-Z0-9-]*)\*?=["']?([^"'\]]+)["']?\])$"#,
        )
        .expect("selector grammar regex")
    })
}

impl Heuristic {
    pub fn parse(selector: &str) -> RestampResult<Self> {
        let caps = selector_re()
            .captures(selector.trim())
            .ok_or_else(|| RestampError::Selector(selector.to_string()))?;
        let tag = caps.get(1).map(|m| m.as_str().to_ascii_lowercase());
        if let Some(class) = caps.get(2) {
            return Ok(Self::ClassExact {
                tag,
                class: class.as_str().to_string(),
            });
        }
        match (caps.get(3), caps.get(4)) {
            (Some(attr), Some(needle)) => Ok(Self::AttrContains {
                tag,
                attr: attr.as_str().to_ascii_lowercase(),
                needle: needle.as_str().to_string(),
            }),
            _ => Err(RestampError::Selector(selector.to_string())),
        }
    }

    fn kind(&self) -> LocatorKind {
        match self {
            Self::ClassExact { .. } => LocatorKind::ClassExact,
            Self::AttrContains { .. } => LocatorKind::AttrContains,
        }
    }

    fn matches<P: DomPage>(&self, page: &P, el: &P::Handle) -> bool {
        match self {
            Self::ClassExact { tag, class } => {
                tag_matches(page, el, tag.as_deref()) && page.has_class(el, class)
            }
            Self::AttrContains { tag, attr, needle } => {
                tag_matches(page, el, tag.as_deref())
                    && page.attr(el, attr).is_some_and(|v| v.contains(needle))
            }
        }
    }
}

fn tag_matches<P: DomPage>(page: &P, el: &P::Handle, tag: Option<&str>) -> bool {
    tag.map_or(true, |t| page.tag(el) == t)
}

/// Ordered first-match-wins watermark locator.
pub struct Locator {
    heuristics: Vec<(String, Heuristic)>,
    phrases: Vec<String>,
}

impl Locator {
    pub fn from_options(options: &CustomizeOptions) -> RestampResult<Self> {
        let mut heuristics = Vec::with_capacity(options.selectors.len());
        for selector in &options.selectors {
            heuristics.push((selector.clone(), Heuristic::parse(selector)?));
        }
        let phrases = options.phrases.iter().map(|p| p.to_lowercase()).collect();
        Ok(Self {
            heuristics,
            phrases,
        })
    }

    /// Scan the page: selector heuristics in configured order, then the
    /// text-phrase fallback. The first match wins.
    pub fn find<P: DomPage>(&self, page: &P) -> Option<(P::Handle, MatchEvidence)> {
        let elements = page.elements();

        for (selector, heuristic) in &self.heuristics {
            for el in &elements {
                if heuristic.matches(page, el) {
                    return Some((
                        el.clone(),
                        MatchEvidence {
                            kind: heuristic.kind(),
                            selector: selector.clone(),
                            evidence: format!("<{}> matches {}", page.tag(el), selector),
                        },
                    ));
                }
            }
        }

        for phrase in &self.phrases {
            for el in &elements {
                let tag = page.tag(el);
                if !TEXT_SCAN_TAGS.contains(&tag.as_str()) {
                    continue;
                }
                let text = page.text(el);
                if text.to_lowercase().contains(phrase) {
                    // Prefer the enclosing anchor, as the upstream widget
                    // nests its label inside the link.
                    let target = page.closest(el, "a").unwrap_or_else(|| el.clone());
                    let evidence = format!(
                        "<{}> text \"{}\" contains '{}'",
                        page.tag(&target),
                        preview(&text),
                        phrase
                    );
                    return Some((
                        target,
                        MatchEvidence {
                            kind: LocatorKind::TextPhrase,
                            selector: phrase.clone(),
                            evidence,
                        },
                    ));
                }
            }
        }

        None
    }
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    let mut out: String = trimmed.chars().take(40).collect();
    if trimmed.chars().count() > 40 {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use restamp_dom::Document;

    fn locator() -> Locator {
        Locator::from_options(&CustomizeOptions::default()).expect("default locator")
    }

    #[test]
    fn parses_the_restricted_grammar() {
        assert_eq!(
            Heuristic::parse("a.watermark").expect("tag.class"),
            Heuristic::ClassExact {
                tag: Some("a".to_string()),
                class: "watermark".to_string()
            }
        );
        assert_eq!(
            Heuristic::parse(".watermark").expect("bare class"),
            Heuristic::ClassExact {
                tag: None,
                class: "watermark".to_string()
            }
        );
        assert_eq!(
            Heuristic::parse("a[href*=\"chainlit.io\"]").expect("attr substring"),
            Heuristic::AttrContains {
                tag: Some("a".to_string()),
                attr: "href".to_string(),
                needle: "chainlit.io".to_string()
            }
        );
        assert_eq!(
            Heuristic::parse("[class*=watermark]").expect("unquoted value"),
            Heuristic::AttrContains {
                tag: None,
                attr: "class".to_string(),
                needle: "watermark".to_string()
            }
        );
        // Bare `=` is substring matching too.
        assert_eq!(
            Heuristic::parse("[data-brand=\"chainlit\"]").expect("bare ="),
            Heuristic::AttrContains {
                tag: None,
                attr: "data-brand".to_string(),
                needle: "chainlit".to_string()
            }
        );
    }

    #[test]
    fn rejects_unsupported_selectors() {
        for bad in ["a", "div > a", "a.b.c", "#footer", ""] {
            let err = Heuristic::parse(bad).unwrap_err();
            assert!(matches!(err, RestampError::Selector(_)), "{bad}");
        }
    }

    #[test]
    fn heuristic_order_beats_document_order() {
        // The href heuristic sits earlier in the default list than the
        // class-substring one, so the later-in-document anchor wins.
        let doc = Document::parse(
            "<div class=\"footer-watermark-slot\">slot</div>\
             <a href=\"https://chainlit.io/about\">About</a>",
            "about:blank",
        )
        .expect("parse");
        let (el, evidence) = locator().find(&doc).expect("match");
        assert_eq!(doc.tag(&el), "a");
        assert_eq!(evidence.kind, LocatorKind::AttrContains);
        assert_eq!(evidence.selector, "a[href*=\"chainlit.io\"]");
    }

    #[test]
    fn phrase_fallback_resolves_to_enclosing_anchor() {
        let doc = Document::parse(
            "<footer><a href=\"https://example.com\"><span>Built with Chainlit</span></a></footer>",
            "about:blank",
        )
        .expect("parse");
        let (el, evidence) = locator().find(&doc).expect("match");
        assert_eq!(doc.tag(&el), "a");
        assert_eq!(evidence.kind, LocatorKind::TextPhrase);
    }

    #[test]
    fn phrase_fallback_keeps_a_bare_container() {
        let doc = Document::parse(
            "<footer><div>Built with SomeKit</div></footer>",
            "about:blank",
        )
        .expect("parse");
        let (el, evidence) = locator().find(&doc).expect("match");
        assert_eq!(doc.tag(&el), "div");
        assert_eq!(evidence.kind, LocatorKind::TextPhrase);
    }

    #[test]
    fn no_match_on_clean_documents() {
        let doc = Document::parse(
            "<main><h1>Chat</h1><p>ask me anything</p></main>",
            "about:blank",
        )
        .expect("parse");
        assert!(locator().find(&doc).is_none());
    }
}
