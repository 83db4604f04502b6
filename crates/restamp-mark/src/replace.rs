use restamp_core::{
    CustomizeOptions, CustomizeOutcome, DomPage, RestampResult, MARKER_ATTR, MARKER_CLASS,
};
use tracing::debug;

use crate::locate::Locator;

/// Fixed fragment that replaces the watermark's content.
pub fn notice_markup(options: &CustomizeOptions) -> String {
    if let Some(html) = &options.notice_html {
        return html.clone();
    }
    format!(
        "<div class=\"text-xs text-muted-foreground\"><span>Copyright © {} {}</span></div>",
        options.year,
        escape(&options.owner)
    )
}

/// One replacement attempt: locate, then rewrite in place.
///
/// Safe to call repeatedly: once the marker attribute is present the
/// attempt reports [`CustomizeOutcome::AlreadyApplied`] without touching
/// the tree, and a missing watermark is a deferred outcome, not an error.
pub fn try_customize<P: DomPage>(
    page: &mut P,
    locator: &Locator,
    options: &CustomizeOptions,
) -> RestampResult<CustomizeOutcome> {
    let Some((el, evidence)) = locator.find(page) else {
        return Ok(CustomizeOutcome::NotFound);
    };

    if page.attr(&el, MARKER_ATTR).as_deref() == Some("true") {
        debug!("watermark already carries the completion marker");
        return Ok(CustomizeOutcome::AlreadyApplied);
    }

    // Link behavior goes first, the completion marker last.
    page.remove_attr(&el, "href")?;
    page.remove_attr(&el, "target")?;
    page.add_class(&el, MARKER_CLASS)?;
    page.set_inner_html(&el, &notice_markup(options))?;
    page.set_style(&el, "cursor", "default")?;
    page.set_style(&el, "text-decoration", "none")?;
    page.set_style(&el, "pointer-events", "none")?;
    page.set_attr(&el, MARKER_ATTR, "true")?;

    Ok(CustomizeOutcome::Applied { evidence })
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use restamp_core::LocatorKind;
    use restamp_dom::Document;

    fn defaults() -> (Locator, CustomizeOptions) {
        let options = CustomizeOptions::default();
        let locator = Locator::from_options(&options).expect("default locator");
        (locator, options)
    }

    #[test]
    fn rewrites_the_branded_anchor() {
        let (locator, options) = defaults();
        let mut doc = Document::parse(
            "<html><body><a class=\"watermark\" href=\"https://chainlit.io\" target=\"_blank\">Built with Chainlit</a></body></html>",
            "https://chat.example.edu/",
        )
        .expect("parse");

        let outcome = try_customize(&mut doc, &locator, &options).expect("customize");
        let evidence = match outcome {
            CustomizeOutcome::Applied { evidence } => evidence,
            other => panic!("expected Applied, got {:?}", other),
        };
        assert_eq!(evidence.kind, LocatorKind::ClassExact);
        assert_eq!(evidence.selector, "a.watermark");

        let a = doc
            .elements()
            .into_iter()
            .find(|id| doc.tag(id) == "a")
            .expect("anchor");
        assert_eq!(doc.attr(&a, "href"), None);
        assert_eq!(doc.attr(&a, "target"), None);
        assert_eq!(doc.attr(&a, "data-customized").as_deref(), Some("true"));
        assert_eq!(
            doc.attr(&a, "style").as_deref(),
            Some("cursor: default; text-decoration: none; pointer-events: none")
        );
        assert_eq!(doc.text(&a), "Copyright © 2025 Harry Mardika");
        assert!(doc
            .outer_html(a)
            .contains("<div class=\"text-xs text-muted-foreground\"><span>Copyright © 2025 Harry Mardika</span></div>"));
    }

    #[test]
    fn second_attempt_mutates_nothing() {
        let (locator, options) = defaults();
        let mut doc = Document::parse(
            "<a class=\"watermark\" href=\"https://chainlit.io\">Built with Chainlit</a>",
            "about:blank",
        )
        .expect("parse");

        let first = try_customize(&mut doc, &locator, &options).expect("first attempt");
        assert!(matches!(first, CustomizeOutcome::Applied { .. }));
        let snapshot = doc.to_html();

        let second = try_customize(&mut doc, &locator, &options).expect("second attempt");
        assert_eq!(second, CustomizeOutcome::AlreadyApplied);
        assert_eq!(doc.to_html(), snapshot);
    }

    #[test]
    fn exactly_one_element_is_modified() {
        let (locator, options) = defaults();
        let mut doc = Document::parse(
            "<a class=\"watermark\">one</a><a class=\"watermark\">two</a>",
            "about:blank",
        )
        .expect("parse");

        try_customize(&mut doc, &locator, &options).expect("customize");
        let marked = doc
            .elements()
            .into_iter()
            .filter(|id| doc.attr(id, "data-customized").is_some())
            .count();
        assert_eq!(marked, 1);
        assert!(doc.to_html().contains(">two</a>"));
    }

    #[test]
    fn clean_document_is_left_untouched() {
        let (locator, options) = defaults();
        let mut doc = Document::parse("<main><p>hello</p></main>", "about:blank").expect("parse");
        let before = doc.to_html();

        let outcome = try_customize(&mut doc, &locator, &options).expect("attempt");
        assert_eq!(outcome, CustomizeOutcome::NotFound);
        assert_eq!(doc.to_html(), before);
    }

    #[test]
    fn owner_text_is_escaped_in_the_notice() {
        let options = CustomizeOptions {
            owner: "Dept. of <R&D>".to_string(),
            ..CustomizeOptions::default()
        };
        assert!(notice_markup(&options).contains("Copyright © 2025 Dept. of &lt;R&amp;D&gt;"));
    }

    #[test]
    fn notice_override_wins() {
        let options = CustomizeOptions {
            notice_html: Some("<span>mine</span>".to_string()),
            ..CustomizeOptions::default()
        };
        assert_eq!(notice_markup(&options), "<span>mine</span>");
    }
}
