use restamp_core::{DomPage, RestampError, RestampResult};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlElement};

/// `DomPage` over the live browser document.
pub struct WebPage {
    document: Document,
}

impl WebPage {
    pub fn new(document: Document) -> Self {
        Self { document }
    }
}

fn js_err(err: JsValue) -> RestampError {
    RestampError::Dom(format!("{:?}", err))
}

impl DomPage for WebPage {
    type Handle = Element;

    fn elements(&self) -> Vec<Element> {
        let mut out = Vec::new();
        if let Ok(list) = self.document.query_selector_all("*") {
            for i in 0..list.length() {
                if let Some(node) = list.item(i) {
                    if let Ok(el) = node.dyn_into::<Element>() {
                        out.push(el);
                    }
                }
            }
        }
        out
    }

    fn tag(&self, el: &Element) -> String {
        el.tag_name().to_ascii_lowercase()
    }

    fn attr(&self, el: &Element, name: &str) -> Option<String> {
        el.get_attribute(name)
    }

    fn has_class(&self, el: &Element, class: &str) -> bool {
        el.class_list().contains(class)
    }

    fn text(&self, el: &Element) -> String {
        el.text_content().unwrap_or_default()
    }

    fn closest(&self, el: &Element, tag: &str) -> Option<Element> {
        el.closest(tag).ok().flatten()
    }

    fn url(&self) -> String {
        self.document
            .location()
            .and_then(|loc| loc.href().ok())
            .unwrap_or_default()
    }

    fn remove_attr(&mut self, el: &Element, name: &str) -> RestampResult<()> {
        el.remove_attribute(name).map_err(js_err)
    }

    fn set_attr(&mut self, el: &Element, name: &str, value: &str) -> RestampResult<()> {
        el.set_attribute(name, value).map_err(js_err)
    }

    fn add_class(&mut self, el: &Element, class: &str) -> RestampResult<()> {
        el.class_list().add_1(class).map_err(js_err)
    }

    fn set_inner_html(&mut self, el: &Element, html: &str) -> RestampResult<()> {
        el.set_inner_html(html);
        Ok(())
    }

    fn set_style(&mut self, el: &Element, prop: &str, value: &str) -> RestampResult<()> {
        match el.dyn_ref::<HtmlElement>() {
            Some(html_el) => html_el.style().set_property(prop, value).map_err(js_err),
            None => self.set_attr(el, "style", &format!("{}: {}", prop, value)),
        }
    }
}
