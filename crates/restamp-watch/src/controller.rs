use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use restamp_core::{CustomizeOptions, CustomizeOutcome, DomPage, RestampResult};
use restamp_dom::SharedDocument;
use restamp_mark::{try_customize, Locator};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Watches a live document and applies the watermark substitution.
///
/// The "already customized" flag and the watcher handles are instance
/// state, so independent controllers can run against independent
/// documents. `start` performs an immediate attempt and arms the
/// mutation watcher, the fixed retry schedule and the navigation
/// watcher; `stop` aborts everything the controller spawned.
pub struct Customizer {
    inner: Arc<Inner>,
    started: AtomicBool,
}

struct Inner {
    doc: SharedDocument,
    locator: Locator,
    options: CustomizeOptions,
    customized: AtomicBool,
    watcher_active: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Customizer {
    pub fn new(doc: SharedDocument, options: CustomizeOptions) -> RestampResult<Self> {
        let locator = Locator::from_options(&options)?;
        Ok(Self {
            inner: Arc::new(Inner {
                doc,
                locator,
                options,
                customized: AtomicBool::new(false),
                watcher_active: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
            }),
            started: AtomicBool::new(false),
        })
    }

    /// Immediate attempt, then the mutation watcher and retry schedule
    /// when the watermark has not appeared yet. Calling `start` twice is
    /// a no-op.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.attempt();
        if !self.inner.is_customized() {
            arm_watchers(&self.inner);
        }
        let nav = spawn_navigation_watcher(self.inner.clone());
        self.inner.push_task(nav);
    }

    /// Abort every controller task. The document is left as-is.
    pub fn stop(&self) {
        let mut tasks = lock_tasks(&self.inner);
        for task in tasks.drain(..) {
            task.abort();
        }
        drop(tasks);
        self.inner.watcher_active.store(false, Ordering::SeqCst);
        self.started.store(false, Ordering::SeqCst);
    }

    pub fn is_customized(&self) -> bool {
        self.inner.is_customized()
    }
}

impl Inner {
    fn is_customized(&self) -> bool {
        self.customized.load(Ordering::SeqCst)
    }

    fn push_task(&self, task: JoinHandle<()>) {
        let mut tasks = match self.tasks.lock() {
            Ok(tasks) => tasks,
            Err(poisoned) => poisoned.into_inner(),
        };
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    /// One locate-and-replace pass. Failures are logged and abandoned; a
    /// later retry may still succeed.
    fn attempt(&self) {
        if self.is_customized() {
            return;
        }
        let mut doc = match self.doc.lock() {
            Ok(doc) => doc,
            Err(_) => return,
        };
        match try_customize(&mut *doc, &self.locator, &self.options) {
            Ok(CustomizeOutcome::Applied { evidence }) => {
                self.customized.store(true, Ordering::SeqCst);
                info!(
                    kind = ?evidence.kind,
                    selector = %evidence.selector,
                    "watermark customized"
                );
            }
            Ok(CustomizeOutcome::AlreadyApplied) => {
                self.customized.store(true, Ordering::SeqCst);
                debug!("watermark already carries the completion marker");
            }
            Ok(CustomizeOutcome::NotFound) => {
                debug!("no watermark candidate yet");
            }
            Err(e) => {
                warn!(error = %e, "watermark replacement failed, leaving for retry");
            }
        }
    }
}

fn lock_tasks(inner: &Inner) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
    match inner.tasks.lock() {
        Ok(tasks) => tasks,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Arm the mutation watcher (unless one is already active) and the fixed
/// retry schedule.
fn arm_watchers(inner: &Arc<Inner>) {
    if !inner.watcher_active.swap(true, Ordering::SeqCst) {
        let task = spawn_mutation_watcher(inner.clone());
        inner.push_task(task);
    }
    let task = spawn_retry_schedule(inner.clone());
    inner.push_task(task);
}

fn spawn_mutation_watcher(inner: Arc<Inner>) -> JoinHandle<()> {
    let mut rx = match inner.doc.lock() {
        Ok(doc) => doc.subscribe(),
        Err(_) => {
            inner.watcher_active.store(false, Ordering::SeqCst);
            return tokio::spawn(async {});
        }
    };
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(mutation) => {
                    if inner.is_customized() {
                        break;
                    }
                    if mutation.added_elements == 0 {
                        continue;
                    }
                    sleep(Duration::from_millis(inner.options.debounce_ms)).await;
                    inner.attempt();
                    if inner.is_customized() {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        inner.watcher_active.store(false, Ordering::SeqCst);
        debug!("mutation watcher disconnected");
    })
}

fn spawn_retry_schedule(inner: Arc<Inner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        // Delays are measured from initialization, not from each other.
        let mut elapsed = 0u64;
        for target in inner.options.retry_delays_ms.clone() {
            sleep(Duration::from_millis(target.saturating_sub(elapsed))).await;
            elapsed = elapsed.max(target);
            if inner.is_customized() {
                return;
            }
            inner.attempt();
        }
    })
}

fn spawn_navigation_watcher(inner: Arc<Inner>) -> JoinHandle<()> {
    let (mut rx, mut last_url) = match inner.doc.lock() {
        Ok(doc) => (doc.subscribe(), doc.url()),
        Err(_) => return tokio::spawn(async {}),
    };
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(_) => {
                    let url = match inner.doc.lock() {
                        Ok(doc) => doc.url(),
                        Err(_) => break,
                    };
                    if url == last_url {
                        continue;
                    }
                    info!(url = %url, "route changed, rescheduling customization");
                    last_url = url;
                    inner.customized.store(false, Ordering::SeqCst);
                    sleep(Duration::from_millis(inner.options.renavigate_delay_ms)).await;
                    inner.attempt();
                    if !inner.is_customized() {
                        arm_watchers(&inner);
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use restamp_dom::Document;

    const WATERMARK: &str =
        "<a class=\"watermark\" href=\"https://chainlit.io\" target=\"_blank\">Built with Chainlit</a>";

    async fn wait_until_customized(customizer: &Customizer, max_ms: u64) -> bool {
        let mut waited = 0;
        while waited < max_ms {
            if customizer.is_customized() {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
            waited += 10;
        }
        customizer.is_customized()
    }

    #[tokio::test(start_paused = true)]
    async fn replaces_an_existing_watermark_immediately() {
        let doc = Document::parse(WATERMARK, "https://chat.example.edu/")
            .expect("parse")
            .shared();
        let customizer =
            Customizer::new(doc.clone(), CustomizeOptions::default()).expect("customizer");
        customizer.start();
        assert!(customizer.is_customized());

        let html = doc.lock().expect("doc lock").to_html();
        assert!(html.contains("data-customized=\"true\""));
        assert!(!html.contains("chainlit.io"));
        customizer.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn detects_a_watermark_inserted_after_initialization() {
        let doc = Document::empty("https://chat.example.edu/").shared();
        let customizer =
            Customizer::new(doc.clone(), CustomizeOptions::default()).expect("customizer");
        customizer.start();
        assert!(!customizer.is_customized());

        sleep(Duration::from_millis(300)).await;
        {
            let mut d = doc.lock().expect("doc lock");
            let body = d.body();
            d.append_html(body, WATERMARK).expect("append watermark");
        }

        assert!(wait_until_customized(&customizer, 500).await);
        let html = doc.lock().expect("doc lock").to_html();
        assert!(html.contains("data-customized=\"true\""));
        customizer.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn leaves_a_clean_document_unmodified() {
        let doc = Document::parse("<main><p>hi</p></main>", "about:blank")
            .expect("parse")
            .shared();
        let before = doc.lock().expect("doc lock").to_html();
        let customizer =
            Customizer::new(doc.clone(), CustomizeOptions::default()).expect("customizer");
        customizer.start();

        // Past the whole retry window.
        sleep(Duration::from_millis(5000)).await;
        assert!(!customizer.is_customized());
        assert_eq!(doc.lock().expect("doc lock").to_html(), before);
        customizer.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn reapplies_after_a_route_change() {
        let doc = Document::parse(
            &format!("<div id=\"app\">{}</div>", WATERMARK),
            "https://chat.example.edu/",
        )
        .expect("parse")
        .shared();
        let customizer =
            Customizer::new(doc.clone(), CustomizeOptions::default()).expect("customizer");
        customizer.start();
        assert!(customizer.is_customized());

        {
            let mut d = doc.lock().expect("doc lock");
            d.set_url("https://chat.example.edu/archive");
            let app = d
                .elements()
                .into_iter()
                .find(|id| d.attr(id, "id").as_deref() == Some("app"))
                .expect("app container");
            d.set_inner_html(&app, WATERMARK).expect("re-render view");
        }

        assert!(wait_until_customized(&customizer, 1000).await);
        let html = doc.lock().expect("doc lock").to_html();
        assert_eq!(html.matches("data-customized=\"true\"").count(), 1);
        customizer.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn watermark_appearing_on_a_late_retry_is_caught() {
        let doc = Document::empty("https://chat.example.edu/").shared();
        let customizer =
            Customizer::new(doc.clone(), CustomizeOptions::default()).expect("customizer");
        customizer.start();

        // Between the 1s and 2s retries.
        sleep(Duration::from_millis(1500)).await;
        {
            let mut d = doc.lock().expect("doc lock");
            let body = d.body();
            d.append_html(body, WATERMARK).expect("append watermark");
        }

        assert!(wait_until_customized(&customizer, 1000).await);
        customizer.stop();
    }
}
