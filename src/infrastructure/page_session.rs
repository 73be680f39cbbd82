//! Page collaborator driving navigation and form submission
//!
//! Plays the part of the interactive browser: one page is "current" at a
//! time, navigation and form posts replace it, and the shared scheduler
//! state is raised on navigation start and cleared on finish. HTML snapshots
//! of key pages are dropped into the diagnostics directory as the primary
//! debugging aid, since intermediate page state is otherwise only visible in
//! logs.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::application::scheduler::SchedulerState;
use crate::infrastructure::http_client::HttpClient;

/// Session-level failures. All of them are fatal to the run.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to load the page {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("No page has been loaded yet")]
    NoPage,

    #[error("Sign-in form not found on the current page")]
    SignInFormMissing,

    #[error("Security token not present on the current page")]
    TokenMissing,
}

/// Known states recognizable from the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageMarker {
    /// A sign-in form is present
    SignInForm,
    /// The site interposed a visual verification challenge
    ChallengeRequested,
}

/// The page most recently loaded into the session.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    /// Final URL after redirects
    pub url: String,
    pub body: String,
}

/// A parsed sign-in form ready for resubmission.
#[derive(Debug, Clone)]
struct SignInForm {
    action: String,
    /// (name, value, id) triples for every named input
    fields: Vec<(String, String, String)>,
}

/// Cookie-session stand-in for an interactive browser page.
pub struct PageSession {
    http: Arc<HttpClient>,
    state: Arc<SchedulerState>,
    diagnostics_dir: PathBuf,
    current: Option<LoadedPage>,
}

impl PageSession {
    pub fn new(http: Arc<HttpClient>, state: Arc<SchedulerState>, diagnostics_dir: PathBuf) -> Self {
        Self {
            http,
            state,
            diagnostics_dir,
            current: None,
        }
    }

    /// Navigate to a URL, replacing the current page. The navigation flag on
    /// the shared scheduler state is held for the duration of the load.
    pub async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        info!("Navigating to {}", url);
        self.state.begin_navigation();
        let result = self.http.get_text(url).await;
        self.state.end_navigation();

        let (body, final_url) = result.map_err(|e| SessionError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        debug!("Load finished: {} ({} bytes)", final_url, body.len());
        self.current = Some(LoadedPage {
            url: final_url,
            body,
        });
        Ok(())
    }

    pub fn current_page(&self) -> Result<&LoadedPage, SessionError> {
        self.current.as_ref().ok_or(SessionError::NoPage)
    }

    /// Title of the current page, when it has one.
    pub fn page_title(&self) -> Option<String> {
        let page = self.current.as_ref()?;
        extract_title(&page.body)
    }

    /// Recognizable states of the current page.
    pub fn page_markers(&self) -> HashSet<PageMarker> {
        let mut markers = HashSet::new();
        let Some(page) = self.current.as_ref() else {
            return markers;
        };

        let document = Html::parse_document(&page.body);
        if select_first(&document, "input#ap_email, form[name=\"signIn\"]").is_some() {
            markers.insert(PageMarker::SignInForm);
        }
        if select_first(
            &document,
            "input#auth-captcha-guess, img#auth-captcha-image",
        )
        .is_some()
        {
            markers.insert(PageMarker::ChallengeRequested);
        }
        markers
    }

    /// URL of the verification challenge image, when one is displayed.
    pub fn challenge_image_url(&self) -> Option<String> {
        let page = self.current.as_ref()?;
        let document = Html::parse_document(&page.body);
        let selector = Selector::parse("img#auth-captcha-image, img[src*=\"captcha\"]").ok()?;
        let src = document
            .select(&selector)
            .next()
            .and_then(|img| img.value().attr("src"))?;
        resolve_url(&page.url, src)
    }

    /// Fill in and submit the sign-in form on the current page. `guess`
    /// carries the operator's challenge response when one was requested.
    ///
    /// There is no direct success signal; the next phase infers the outcome
    /// from the page it finds itself on.
    pub async fn submit_sign_in(
        &mut self,
        email: &str,
        password: &str,
        guess: Option<&str>,
    ) -> Result<(), SessionError> {
        let page = self.current.as_ref().ok_or(SessionError::NoPage)?;
        let mut form =
            parse_sign_in_form(&page.url, &page.body).ok_or(SessionError::SignInFormMissing)?;

        set_field(&mut form.fields, &["email", "ap_email"], email);
        set_field(&mut form.fields, &["password", "ap_password"], password);
        if let Some(guess) = guess {
            set_field(&mut form.fields, &["guess", "auth-captcha-guess"], guess);
        }

        let action = form.action.clone();
        let pairs: Vec<(&str, &str)> = form
            .fields
            .iter()
            .map(|(name, value, _)| (name.as_str(), value.as_str()))
            .collect();

        info!("Submitting sign-in form to {}", action);
        self.state.begin_navigation();
        let result = self.http.post_form(&action, &pairs).await;
        self.state.end_navigation();

        let (body, final_url) = result.map_err(|e| SessionError::Navigation {
            url: action,
            message: e.to_string(),
        })?;

        self.current = Some(LoadedPage {
            url: final_url,
            body,
        });
        Ok(())
    }

    /// Extract the anti-forgery token the devices page plants in an inline
    /// script. Later ownership queries are rejected without it.
    pub fn extract_csrf_token(&self) -> Result<String, SessionError> {
        let page = self.current.as_ref().ok_or(SessionError::NoPage)?;
        let pattern = regex::Regex::new(r#"csrfToken["']?\s*[=:]\s*["']([^"']+)["']"#)
            .expect("valid token pattern");
        pattern
            .captures(&page.body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or(SessionError::TokenMissing)
    }

    /// Drop an HTML snapshot of the current page into the diagnostics
    /// directory. Best effort: snapshot failures are logged, never fatal.
    pub fn save_snapshot(&self, name: &str) {
        let Some(page) = self.current.as_ref() else {
            return;
        };
        if let Err(e) = std::fs::create_dir_all(&self.diagnostics_dir) {
            warn!("Could not create diagnostics directory: {}", e);
            return;
        }
        let file_name = format!("{}-{}.html", name, Utc::now().format("%Y%m%dT%H%M%S"));
        let path = self.diagnostics_dir.join(&file_name);
        match std::fs::write(&path, &page.body) {
            Ok(()) => info!("Rendering page to {}", path.display()),
            Err(e) => warn!("Failed to write snapshot {}: {}", path.display(), e),
        }
    }

    /// Download the challenge image next to the snapshots so the operator
    /// can look at it. Returns the path it was written to.
    pub async fn save_challenge_image(&self) -> Option<PathBuf> {
        let image_url = self.challenge_image_url()?;
        let bytes = match self.http.get_bytes(&image_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to download challenge image: {}", e);
                return None;
            }
        };
        if let Err(e) = std::fs::create_dir_all(&self.diagnostics_dir) {
            warn!("Could not create diagnostics directory: {}", e);
            return None;
        }
        let path = self.diagnostics_dir.join("challenge.jpg");
        match std::fs::write(&path, bytes) {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Failed to write challenge image: {}", e);
                None
            }
        }
    }

    pub fn http(&self) -> Arc<HttpClient> {
        Arc::clone(&self.http)
    }
}

fn select_first<'a>(
    document: &'a Html,
    selectors: &str,
) -> Option<scraper::ElementRef<'a>> {
    let selector = Selector::parse(selectors).ok()?;
    document.select(&selector).next()
}

fn extract_title(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    let selector = Selector::parse("title").ok()?;
    let title = document.select(&selector).next()?;
    let text: String = title.text().collect();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Find the sign-in form and collect its inputs, hidden fields included.
/// The form is recognized by its email input rather than by name, since the
/// markup shifts between site revisions.
fn parse_sign_in_form(base_url: &str, body: &str) -> Option<SignInForm> {
    let document = Html::parse_document(body);
    let form_selector = Selector::parse("form").ok()?;
    let input_selector = Selector::parse("input").ok()?;

    for form in document.select(&form_selector) {
        let mut fields = Vec::new();
        let mut has_email_input = false;

        for input in form.select(&input_selector) {
            let id = input.value().attr("id").unwrap_or("");
            if id == "ap_email" || input.value().attr("name") == Some("email") {
                has_email_input = true;
            }
            if let Some(name) = input.value().attr("name") {
                let value = input.value().attr("value").unwrap_or("");
                fields.push((name.to_string(), value.to_string(), id.to_string()));
            }
        }

        if !has_email_input {
            continue;
        }

        let action = form.value().attr("action").unwrap_or("");
        let action = resolve_url(base_url, action)?;
        return Some(SignInForm { action, fields });
    }

    None
}

/// Overwrite the field matching one of the candidate names or ids, inserting
/// it when the form does not carry it at all.
fn set_field(fields: &mut Vec<(String, String, String)>, candidates: &[&str], value: &str) {
    for (name, field_value, id) in fields.iter_mut() {
        if candidates.contains(&name.as_str()) || candidates.contains(&id.as_str()) {
            *field_value = value.to_string();
            return;
        }
    }
    fields.push((
        candidates[0].to_string(),
        value.to_string(),
        String::new(),
    ));
}

fn resolve_url(base: &str, href: &str) -> Option<String> {
    if href.is_empty() {
        return Some(base.to_string());
    }
    Url::parse(base)
        .ok()?
        .join(href)
        .ok()
        .map(|u| u.to_string())
}
