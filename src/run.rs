use std::path::{Path, PathBuf};

use anyhow::Result;
use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use crate::browser::{PortalBrowser, PortalPage};
use crate::config::PortalConfig;
use crate::credentials::Credentials;
use crate::error::PortalError;
use crate::extract::{fields, records};
use crate::output;
use crate::record::{self, OutputDocument};
use crate::session::goto_authenticated;

/// Fetch both portal pages through one session, write the output document and
/// release the browser. The browser is closed on every path, after the output
/// (if any) has been written.
pub async fn run<B: PortalBrowser>(
    browser: B,
    config: &PortalConfig,
    credentials: &Credentials,
    output_dir: &Path,
    progress: &ProgressBar,
) -> Result<PathBuf> {
    let outcome = async {
        let page = browser.new_page().await?;
        let doc = fetch_document(&page, config, credentials, progress).await?;

        let path = output_dir.join(output::file_name(credentials.nif()));
        progress.suspend(|| println!("writing data to {}...", path.display()));
        output::write_document(output_dir, credentials.nif(), &doc)
    }
    .await;

    progress.set_message("closing browser");
    if let Err(e) = browser.close().await {
        warn!(error = %e, "failed to close browser");
    }

    outcome
}

/// Personal data page first, then the real estate listing, on the same page.
pub async fn fetch_document<P: PortalPage + ?Sized>(
    page: &P,
    config: &PortalConfig,
    credentials: &Credentials,
    progress: &ProgressBar,
) -> Result<OutputDocument, PortalError> {
    progress.set_message("fetching personal data");
    goto_authenticated(page, &config.personal_data_url, config, credentials).await?;
    let personal = fields::extract(page, &config.selectors).await?;
    info!(fields = personal.len(), "personal data fetched");
    debug!(labels = ?personal.keys().collect::<Vec<_>>(), "personal data labels");

    progress.set_message("fetching real estate");
    goto_authenticated(page, &config.real_estate_url, config, credentials).await?;
    let listing = records::extract(page, &config.selectors).await?;
    let urban = listing
        .iter()
        .filter(|r| r.kind.as_deref() == Some("U"))
        .count();
    info!(
        records = listing.len(),
        urban,
        rustic = listing.len() - urban,
        "real estate fetched"
    );

    Ok(record::normalize(&config.field_keys, &personal, &listing))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_config, FakeBrowser, FakePortal};
    use serde_json::json;

    fn personal_snapshot() -> serde_json::Value {
        json!({
            "error": null,
            "titles": [
                { "text": "Nome", "header": false },
                { "text": "NIF", "header": false },
                { "text": "Sexo", "header": false },
                { "text": "Data Nascimento", "header": false }
            ],
            "values": ["XPTO", "100000002", "MASCULINO", "1970-01-01"]
        })
    }

    fn listing() -> serde_json::Value {
        json!([{
            "id": "0", "loc": "1 - UTOPIA", "frg": "1", "tipo": "R", "sec": "XX",
            "art": "0", "arv": "", "frac": "", "qP": " 1/1", "ano": "1900",
            "vIni": 123.4, "val": 321.0, "cadR": "S", "map": false, "artM": "R-0-XX-"
        }])
    }

    #[tokio::test]
    async fn rejected_login_writes_nothing_and_closes_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = fake_config();
        let portal = FakePortal::new(&config, "correct-horse")
            .with_login_error("O NIF ou a senha estão incorretos.");
        let browser = FakeBrowser::new(portal);
        let closes = browser.close_counter();

        let creds = Credentials::new("100000002", "000000000").unwrap();
        let err = run(browser, &config, &creds, dir.path(), &ProgressBar::hidden())
            .await
            .unwrap_err();

        match err.downcast_ref::<PortalError>() {
            Some(PortalError::Authentication(message)) => {
                assert_eq!(message, "O NIF ou a senha estão incorretos.")
            }
            other => panic!("expected authentication error, got {other:?}"),
        }
        assert_eq!(closes.get(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn successful_run_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let config = fake_config();
        let portal = FakePortal::new(&config, "secret")
            .with_personal_snapshot(personal_snapshot())
            .with_records(listing());
        let browser = FakeBrowser::new(portal);
        let closes = browser.close_counter();

        let creds = Credentials::new("100000002", "secret").unwrap();
        let path = run(browser, &config, &creds, dir.path(), &ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("real-estate-100000002.json"));
        assert_eq!(closes.get(), 1);

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            written,
            json!({
                "id": "100000002",
                "name": "XPTO",
                "dob": "1970-01-01",
                "sex": "M",
                "data": [{
                    "id": "0",
                    "parish": "1 - UTOPIA",
                    "article": "0",
                    "section": "XX",
                    "title": "R-0-XX-",
                    "part": "1/1",
                    "year": "1900",
                    "initial_value": 123.4,
                    "current_value": 321.0
                }]
            })
        );
    }

    #[tokio::test]
    async fn login_happens_once_across_both_pages() {
        let config = fake_config();
        let portal = FakePortal::new(&config, "secret")
            .with_personal_snapshot(personal_snapshot())
            .with_records(listing());

        let creds = Credentials::new("100000002", "secret").unwrap();
        let doc = fetch_document(&portal, &config, &creds, &ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(portal.submit_count(), 1);
        assert_eq!(
            portal.visited(),
            [config.personal_data_url.clone(), config.real_estate_url.clone()]
        );
        assert_eq!(doc.data.len(), 1);
    }

    #[tokio::test]
    async fn business_error_aborts_before_real_estate() {
        let dir = tempfile::tempdir().unwrap();
        let config = fake_config();
        let portal = FakePortal::new(&config, "secret")
            .with_personal_snapshot(json!({ "error": "Conta bloqueada" }))
            .with_records(listing());
        let browser = FakeBrowser::new(portal);
        let closes = browser.close_counter();

        let creds = Credentials::new("100000002", "secret").unwrap();
        let err = run(browser, &config, &creds, dir.path(), &ProgressBar::hidden())
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<PortalError>(),
            Some(PortalError::DataFetch { context: "personal data", .. })
        ));
        assert_eq!(closes.get(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
