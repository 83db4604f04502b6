use crate::error::RestampResult;

/// The operations the engine needs from the hosting page's DOM.
///
/// Implemented by `restamp_dom::Document` in native builds and by a
/// `web-sys` wrapper in the browser build. Handles stay valid for the
/// lifetime of the page; a handle to a detached element simply stops
/// matching anything.
pub trait DomPage {
    type Handle: Clone;

    /// Every element in document order.
    fn elements(&self) -> Vec<Self::Handle>;

    /// Lowercase tag name.
    fn tag(&self, el: &Self::Handle) -> String;

    fn attr(&self, el: &Self::Handle, name: &str) -> Option<String>;

    fn has_class(&self, el: &Self::Handle, class: &str) -> bool;

    /// Concatenated descendant text, like `textContent`.
    fn text(&self, el: &Self::Handle) -> String;

    /// Nearest ancestor (or self) with the given tag.
    fn closest(&self, el: &Self::Handle, tag: &str) -> Option<Self::Handle>;

    /// Current navigation URL.
    fn url(&self) -> String;

    fn remove_attr(&mut self, el: &Self::Handle, name: &str) -> RestampResult<()>;

    fn set_attr(&mut self, el: &Self::Handle, name: &str, value: &str) -> RestampResult<()>;

    fn add_class(&mut self, el: &Self::Handle, class: &str) -> RestampResult<()>;

    /// Replace the element's children with the parsed fragment.
    fn set_inner_html(&mut self, el: &Self::Handle, html: &str) -> RestampResult<()>;

    fn set_style(&mut self, el: &Self::Handle, prop: &str, value: &str) -> RestampResult<()>;
}
