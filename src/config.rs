use std::time::Duration;

const SSO_URL_PREFIX: &str = "https://www.acesso.gov.pt/";
const PERSONAL_DATA_URL: &str =
    "https://www.portaldasfinancas.gov.pt/pt/main.jsp?body=/external/sgrcsitcad/jsp/sitcadDadosGerais.do";
// PATRIMÓNIO PREDIAL / CADERNETAS
const REAL_ESTATE_URL: &str =
    "https://www.portaldasfinancas.gov.pt/pt/Pat/main.jsp?body=/ca/patrimonio.jsp";

/// Everything that ties a run to one portal: endpoints, selectors, field
/// labels and timing. `Default` is the production Portal das Finanças.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub sso_prefix: String,
    pub personal_data_url: String,
    pub real_estate_url: String,
    pub selectors: Selectors,
    pub field_keys: FieldKeys,
    /// Fixed pause after submitting the login form before checking the
    /// resulting URL. The portal gives no reliable "login finished" signal,
    /// so this stays a plain wait; shortening it makes logins flaky.
    pub settle_wait: Duration,
    pub network_idle: NetworkIdle,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            sso_prefix: SSO_URL_PREFIX.to_string(),
            personal_data_url: PERSONAL_DATA_URL.to_string(),
            real_estate_url: REAL_ESTATE_URL.to_string(),
            selectors: Selectors::default(),
            field_keys: FieldKeys::default(),
            settle_wait: Duration::from_millis(1000),
            network_idle: NetworkIdle::default(),
        }
    }
}

impl PortalConfig {
    /// True when `url` points at the identity provider, i.e. the session is
    /// being asked to log in.
    pub fn is_sso(&self, url: &str) -> bool {
        url.starts_with(&self.sso_prefix)
    }
}

#[derive(Debug, Clone)]
pub struct Selectors {
    pub username: String,
    pub password: String,
    pub submit: String,
    pub login_error: String,
    /// Business error box rendered instead of page content.
    pub error_box: String,
    pub field_title: String,
    pub field_value: String,
    /// Class on a field title that marks it as a section header.
    pub section_header_class: String,
    /// Element whose AngularJS scope holds the real estate listing.
    pub record_scope_root: String,
    pub record_collection: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            username: "input#username".into(),
            password: "input#password".into(),
            submit: "button#sbmtLogin".into(),
            login_error: ".error-message".into(),
            error_box: ".redBoxBody".into(),
            field_title: ".fieldTitleBold".into(),
            field_value: ".fieldValue".into(),
            section_header_class: "blueBackground".into(),
            record_scope_root: "mainDiv".into(),
            record_collection: "predios".into(),
        }
    }
}

/// Labels (as composed by the field list extractor) read into the output document.
#[derive(Debug, Clone)]
pub struct FieldKeys {
    pub nif: String,
    pub name: String,
    pub date_of_birth: String,
    pub sex: String,
}

impl Default for FieldKeys {
    fn default() -> Self {
        Self {
            nif: "NIF".into(),
            name: "Nome".into(),
            date_of_birth: "Data Nascimento".into(),
            sex: "Sexo".into(),
        }
    }
}

/// "networkidle2": a page is settled once no more than `max_inflight`
/// requests have been pending for `quiet_window`. `max_wait` caps the whole wait.
#[derive(Debug, Clone)]
pub struct NetworkIdle {
    pub max_inflight: usize,
    pub quiet_window: Duration,
    pub max_wait: Duration,
}

impl Default for NetworkIdle {
    fn default() -> Self {
        Self {
            max_inflight: 2,
            quiet_window: Duration::from_millis(500),
            max_wait: Duration::from_secs(30),
        }
    }
}
