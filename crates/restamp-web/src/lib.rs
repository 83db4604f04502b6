//! Browser build: the watermark customizer wired to the live DOM via
//! `web-sys`. Compiles to an empty crate off wasm32; native builds run
//! `restamp-watch` against the in-memory document instead.

#[cfg(target_arch = "wasm32")]
mod install;
#[cfg(target_arch = "wasm32")]
mod page;

#[cfg(target_arch = "wasm32")]
pub use install::{install, install_with_notice};

#[cfg(all(target_arch = "wasm32", test))]
mod tests {
    use wasm_bindgen_test::*;

    use crate::page::WebPage;
    use restamp_core::CustomizeOptions;
    use restamp_mark::{try_customize, Locator};

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn rewrites_an_injected_watermark() {
        let document = web_sys::window().unwrap().document().unwrap();
        let body = document.body().unwrap();
        body.set_inner_html(
            "<a class=\"watermark\" href=\"https://chainlit.io\">Built with Chainlit</a>",
        );

        let options = CustomizeOptions::default();
        let locator = Locator::from_options(&options).unwrap();
        let mut page = WebPage::new(document.clone());
        try_customize(&mut page, &locator, &options).unwrap();

        let a = document.query_selector("a").unwrap().unwrap();
        assert_eq!(a.get_attribute("data-customized").as_deref(), Some("true"));
        assert!(a.get_attribute("href").is_none());
        assert!(a.text_content().unwrap_or_default().contains("Copyright"));
    }
}
