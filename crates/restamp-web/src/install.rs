use std::cell::RefCell;
use std::rc::Rc;

use restamp_core::{CustomizeOptions, CustomizeOutcome};
use restamp_mark::{try_customize, Locator};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    console, Document, DocumentReadyState, MutationObserver, MutationObserverInit, MutationRecord,
};

use crate::page::WebPage;

struct State {
    customized: bool,
    observer: Option<MutationObserver>,
    last_url: String,
    options: CustomizeOptions,
    locator: Locator,
}

type Shared = Rc<RefCell<State>>;

/// Install the customizer with default options.
#[wasm_bindgen]
pub fn install() -> Result<(), JsValue> {
    install_options(CustomizeOptions::default())
}

/// Install with a custom owner and year in the notice.
#[wasm_bindgen]
pub fn install_with_notice(owner: String, year: i32) -> Result<(), JsValue> {
    install_options(CustomizeOptions {
        owner,
        year,
        ..CustomizeOptions::default()
    })
}

fn install_options(options: CustomizeOptions) -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let locator =
        Locator::from_options(&options).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let state: Shared = Rc::new(RefCell::new(State {
        customized: false,
        observer: None,
        last_url: current_url(&document),
        options,
        locator,
    }));

    // First eligible moment: immediately when the DOM is ready, else on
    // DOMContentLoaded.
    if document.ready_state() == DocumentReadyState::Loading {
        let st = state.clone();
        let on_ready = Closure::<dyn FnMut()>::new(move || initialize(&st));
        document.add_event_listener_with_callback(
            "DOMContentLoaded",
            on_ready.as_ref().unchecked_ref(),
        )?;
        on_ready.forget();
    } else {
        initialize(&state);
    }

    // Backup pass shortly after the window load event.
    {
        let st = state.clone();
        let on_load = Closure::<dyn FnMut()>::new(move || {
            let st = st.clone();
            set_timeout(100, move || {
                if !st.borrow().customized {
                    initialize(&st);
                }
            });
        });
        window.add_event_listener_with_callback("load", on_load.as_ref().unchecked_ref())?;
        on_load.forget();
    }

    spawn_navigation_observer(&state)?;

    console::log_1(&"watermark customizer installed".into());
    Ok(())
}

/// Immediate attempt, then the mutation observer plus the fixed retry
/// schedule.
fn initialize(state: &Shared) {
    state.borrow_mut().customized = false;
    attempt(state);
    if state.borrow().customized {
        return;
    }
    if let Err(err) = ensure_observer(state) {
        console::warn_1(&err);
    }
    let delays = state.borrow().options.retry_delays_ms.clone();
    for delay in delays {
        let st = state.clone();
        set_timeout(delay as i32, move || {
            if !st.borrow().customized {
                attempt(&st);
            }
        });
    }
}

/// One locate-and-replace pass against the live document.
fn attempt(state: &Shared) {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let mut st = state.borrow_mut();
    if st.customized {
        return;
    }
    let mut page = WebPage::new(document);
    match try_customize(&mut page, &st.locator, &st.options) {
        Ok(CustomizeOutcome::Applied { evidence }) => {
            st.customized = true;
            console::log_1(&format!("watermark customized ({})", evidence.evidence).into());
            disconnect(&mut st);
        }
        Ok(CustomizeOutcome::AlreadyApplied) => {
            st.customized = true;
            disconnect(&mut st);
        }
        Ok(CustomizeOutcome::NotFound) => {}
        Err(e) => {
            console::error_1(&format!("watermark replacement failed: {}", e).into());
        }
    }
}

fn disconnect(st: &mut State) {
    if let Some(observer) = st.observer.take() {
        observer.disconnect();
    }
}

/// Watch for element insertions under the body, re-running the attempt
/// after a short debounce. One observer at a time.
fn ensure_observer(state: &Shared) -> Result<(), JsValue> {
    if state.borrow().observer.is_some() {
        return Ok(());
    }
    let debounce = state.borrow().options.debounce_ms as i32;
    let st = state.clone();
    let callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
        move |records: js_sys::Array, observer: MutationObserver| {
            if st.borrow().customized {
                observer.disconnect();
                return;
            }
            if !batch_inserted_elements(&records) {
                return;
            }
            let st = st.clone();
            set_timeout(debounce, move || attempt(&st));
        },
    );
    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    callback.forget();

    if let Some(body) = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.body())
    {
        observer.observe_with_options(&body, &child_list_subtree())?;
    }
    state.borrow_mut().observer = Some(observer);
    Ok(())
}

/// Compare the location against the last seen URL on every body-level
/// mutation batch, re-initializing after a route change.
fn spawn_navigation_observer(state: &Shared) -> Result<(), JsValue> {
    let st = state.clone();
    let callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
        move |_records: js_sys::Array, _observer: MutationObserver| {
            let Some(document) = web_sys::window().and_then(|w| w.document()) else {
                return;
            };
            let url = current_url(&document);
            let changed = {
                let mut s = st.borrow_mut();
                if url != s.last_url {
                    s.last_url = url;
                    s.customized = false;
                    true
                } else {
                    false
                }
            };
            if changed {
                let delay = st.borrow().options.renavigate_delay_ms as i32;
                let st = st.clone();
                set_timeout(delay, move || initialize(&st));
            }
        },
    );
    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    callback.forget();

    if let Some(body) = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.body())
    {
        observer.observe_with_options(&body, &child_list_subtree())?;
    }
    Ok(())
}

fn batch_inserted_elements(records: &js_sys::Array) -> bool {
    for record in records.iter() {
        let record: MutationRecord = record.unchecked_into();
        if record.type_() != "childList" {
            continue;
        }
        let added = record.added_nodes();
        for i in 0..added.length() {
            // Element nodes only; text and comment churn is ignored.
            if added.item(i).map_or(false, |n| n.node_type() == 1) {
                return true;
            }
        }
    }
    false
}

fn child_list_subtree() -> MutationObserverInit {
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    init
}

fn set_timeout(delay_ms: i32, f: impl FnOnce() + 'static) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let cb = Closure::once_into_js(f);
    let _ = window
        .set_timeout_with_callback_and_timeout_and_arguments_0(cb.unchecked_ref(), delay_ms);
}

fn current_url(document: &Document) -> String {
    document
        .location()
        .and_then(|loc| loc.href().ok())
        .unwrap_or_default()
}
