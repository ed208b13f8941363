use tracing::{debug, info};

use crate::browser::{js_string, PortalPage};
use crate::config::PortalConfig;
use crate::credentials::Credentials;
use crate::error::PortalError;

/// Navigate `page` to `url`, logging in through the SSO form if the portal
/// redirects there. On success the page shows the authenticated content of `url`.
pub async fn goto_authenticated<P: PortalPage + ?Sized>(
    page: &P,
    url: &str,
    config: &PortalConfig,
    credentials: &Credentials,
) -> Result<(), PortalError> {
    page.goto(url).await?;

    let landed = page.current_url().await?;
    if !config.is_sso(&landed) {
        debug!(url, "already authenticated");
        return Ok(());
    }

    info!(nif = %credentials.nif(), "logging in");
    let selectors = &config.selectors;
    page.type_into(&selectors.username, credentials.nif().as_str()).await?;
    page.type_into(&selectors.password, credentials.password()).await?;
    page.click(&selectors.submit).await?;

    // No dependable navigation signal after submit; see `PortalConfig::settle_wait`.
    tokio::time::sleep(config.settle_wait).await;

    let landed = page.current_url().await?;
    if config.is_sso(&landed) {
        let message = login_error_message(page, &selectors.login_error).await?;
        return Err(PortalError::Authentication(message));
    }

    info!("logged in");
    Ok(())
}

async fn login_error_message<P: PortalPage + ?Sized>(
    page: &P,
    selector: &str,
) -> Result<String, PortalError> {
    let script = format!(
        "(() => {{ const e = document.querySelector({}); return e ? e.innerText : null; }})()",
        js_string(selector)
    );
    let message = match page.evaluate(&script).await? {
        serde_json::Value::String(s) => s.trim().to_string(),
        _ => String::new(),
    };
    if message.is_empty() {
        Ok("login rejected without an error message".to_string())
    } else {
        Ok(message)
    }
}
