//! Browser seam for the portal session.
//!
//! The navigator and extractors only talk to [`PortalPage`]; the headless
//! Chromium implementation lives in [`ChromeBrowser`] / [`ChromePage`] on top
//! of `chromiumoxide`.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::NetworkIdle;
use crate::error::PortalError;

/// The page operations a portal run needs.
#[async_trait]
pub trait PortalPage: Send + Sync {
    /// Navigate to `url` and return once network activity has quiesced.
    async fn goto(&self, url: &str) -> Result<(), PortalError>;

    /// URL the page ended up on, after any redirects.
    async fn current_url(&self) -> Result<String, PortalError>;

    /// Focus the element matching `selector` and type `text` into it.
    async fn type_into(&self, selector: &str, text: &str) -> Result<(), PortalError>;

    async fn click(&self, selector: &str) -> Result<(), PortalError>;

    /// Evaluate a JavaScript expression in the page and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<Value, PortalError>;
}

#[async_trait]
impl<P: PortalPage + ?Sized> PortalPage for Arc<P> {
    async fn goto(&self, url: &str) -> Result<(), PortalError> {
        (**self).goto(url).await
    }

    async fn current_url(&self) -> Result<String, PortalError> {
        (**self).current_url().await
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<(), PortalError> {
        (**self).type_into(selector, text).await
    }

    async fn click(&self, selector: &str) -> Result<(), PortalError> {
        (**self).click(selector).await
    }

    async fn evaluate(&self, script: &str) -> Result<Value, PortalError> {
        (**self).evaluate(script).await
    }
}

/// A launched browser process. Must be released with [`PortalBrowser::close`].
#[async_trait]
pub trait PortalBrowser: Send + Sync + Sized {
    type Page: PortalPage;

    async fn new_page(&self) -> Result<Self::Page, PortalError>;

    async fn close(self) -> Result<(), PortalError>;
}

#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Show the browser window instead of running headless.
    pub headful: bool,
    /// Explicit Chrome/Chromium binary; otherwise auto-detected.
    pub executable: Option<PathBuf>,
}

// ── Chromium ──

pub struct ChromeBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
    idle: NetworkIdle,
}

impl ChromeBrowser {
    pub async fn launch(options: &LaunchOptions, idle: NetworkIdle) -> Result<Self, PortalError> {
        let mut builder = BrowserConfig::builder();
        if options.headful {
            builder = builder.with_head();
        }
        if let Some(path) = &options.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(PortalError::Browser)?;

        info!(headful = options.headful, "launching browser");
        let (browser, mut handler) = Browser::launch(config).await?;

        // The CDP connection only makes progress while its handler is polled.
        // Messages newer Chrome sends that chromiumoxide cannot decode are skipped;
        // only a broken websocket ends the loop.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                match event {
                    Ok(()) => {}
                    Err(e) if connection_lost(&e) => {
                        warn!(error = %e, "browser connection lost");
                        break;
                    }
                    Err(e) => debug!(error = %e, "skipping undecodable CDP message"),
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            idle,
        })
    }
}

#[async_trait]
impl PortalBrowser for ChromeBrowser {
    type Page = ChromePage;

    async fn new_page(&self) -> Result<ChromePage, PortalError> {
        let page = self.browser.new_page("about:blank").await?;
        page.execute(EnableParams::default()).await?;
        Ok(ChromePage {
            page,
            idle: self.idle.clone(),
        })
    }

    async fn close(mut self) -> Result<(), PortalError> {
        info!("closing browser");
        self.browser.close().await?;
        self.browser
            .wait()
            .await
            .map_err(|e| PortalError::Browser(format!("waiting for browser exit: {e}")))?;
        let _ = self.handler.await;
        Ok(())
    }
}

pub struct ChromePage {
    page: Page,
    idle: NetworkIdle,
}

#[async_trait]
impl PortalPage for ChromePage {
    async fn goto(&self, url: &str) -> Result<(), PortalError> {
        // Subscribe before navigating so no request of the new page is missed.
        let requests = self.page.event_listener::<EventRequestWillBeSent>().await?;
        let finished = self.page.event_listener::<EventLoadingFinished>().await?;
        let failed = self.page.event_listener::<EventLoadingFailed>().await?;

        debug!(url, "navigating");
        self.page.goto(url).await?;

        let settled = wait_for_network_idle(
            &self.idle,
            requests.map(|ev| ev.request_id.inner().clone()),
            finished.map(|ev| ev.request_id.inner().clone()),
            failed.map(|ev| ev.request_id.inner().clone()),
        )
        .await;
        if !settled {
            warn!(
                url,
                max_wait = ?self.idle.max_wait,
                "network never went idle, continuing anyway"
            );
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, PortalError> {
        self.page
            .url()
            .await?
            .ok_or_else(|| PortalError::Browser("page has no URL".into()))
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<(), PortalError> {
        let element = self.page.find_element(selector).await?;
        element.click().await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), PortalError> {
        self.page.find_element(selector).await?.click().await?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, PortalError> {
        let result = self.page.evaluate(script).await?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }
}

/// Track in-flight request ids until at most `max_inflight` have been pending
/// for a full quiet window. The window starts at the call and restarts only
/// when the count drops back to `max_inflight` from above. Returns `false`
/// when `max_wait` runs out first.
pub async fn wait_for_network_idle<R, F, X>(
    idle: &NetworkIdle,
    mut requests: R,
    mut finished: F,
    mut failed: X,
) -> bool
where
    R: Stream<Item = String> + Unpin,
    F: Stream<Item = String> + Unpin,
    X: Stream<Item = String> + Unpin,
{
    let settle = async {
        let mut inflight: HashSet<String> = HashSet::new();
        let quiet = tokio::time::sleep(idle.quiet_window);
        tokio::pin!(quiet);

        loop {
            let was_quiet = inflight.len() <= idle.max_inflight;
            tokio::select! {
                Some(id) = requests.next() => {
                    inflight.insert(id);
                }
                Some(id) = finished.next() => {
                    inflight.remove(&id);
                }
                Some(id) = failed.next() => {
                    inflight.remove(&id);
                }
                () = &mut quiet, if was_quiet => return true,
                else => return false,
            }
            if !was_quiet && inflight.len() <= idle.max_inflight {
                quiet
                    .as_mut()
                    .reset(tokio::time::Instant::now() + idle.quiet_window);
            }
        }
    };

    tokio::time::timeout(idle.max_wait, settle)
        .await
        .unwrap_or(false)
}

fn connection_lost(err: &CdpError) -> bool {
    matches!(err, CdpError::Ws(_))
}

/// Quote `s` as a JavaScript string literal for embedding in page scripts.
pub fn js_string(s: &str) -> String {
    Value::from(s).to_string()
}
