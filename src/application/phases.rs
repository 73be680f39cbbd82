//! The automation phases
//!
//! One run is six phases executed in order by the scheduler: land on the
//! storefront (which redirects to sign-in), submit credentials, clear a
//! possible verification challenge, prime the session on the devices page
//! to obtain the anti-forgery token, fetch the library, finish.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::prompt::{ChallengePrompt, PromptError};
use crate::application::scheduler::{PhaseExecutor, SchedulerState};
use crate::domain::fetch::{FetchError, MultiOrderMerger};
use crate::domain::sort_order::FetchPlan;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::export::{self, ExportError};
use crate::infrastructure::ownership_endpoint::OwnershipEndpoint;
use crate::infrastructure::page_session::{PageMarker, PageSession, SessionError};

/// Sign-in credentials for the run.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// The fixed phase list. Each phase runs exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Landing,
    SignIn,
    ChallengeGate,
    PrimeSession,
    FetchLibrary,
    Finish,
}

impl StepPhase {
    pub const SEQUENCE: [StepPhase; 6] = [
        StepPhase::Landing,
        StepPhase::SignIn,
        StepPhase::ChallengeGate,
        StepPhase::PrimeSession,
        StepPhase::FetchLibrary,
        StepPhase::Finish,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Landing => "landing",
            Self::SignIn => "sign-in",
            Self::ChallengeGate => "challenge-gate",
            Self::PrimeSession => "prime-session",
            Self::FetchLibrary => "fetch-library",
            Self::Finish => "finish",
        }
    }
}

/// Failures inside a phase. All are fatal except where a phase absorbs them
/// explicitly.
#[derive(Error, Debug)]
pub enum PhaseError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("No security token available for the ownership query")]
    TokenUnavailable,
}

/// Owns the collaborators and carries run state between phases.
pub struct StepRunner {
    session: PageSession,
    prompt: Box<dyn ChallengePrompt>,
    state: Arc<SchedulerState>,
    config: AppConfig,
    credentials: Credentials,
    plan: FetchPlan,
    csrf_token: Option<String>,
    item_count: Option<usize>,
}

impl StepRunner {
    pub fn new(
        session: PageSession,
        prompt: Box<dyn ChallengePrompt>,
        state: Arc<SchedulerState>,
        config: AppConfig,
        credentials: Credentials,
        plan: FetchPlan,
    ) -> Self {
        Self {
            session,
            prompt,
            state,
            config,
            credentials,
            plan,
            csrf_token: None,
            item_count: None,
        }
    }

    /// Number of items handed to the sinks, once the fetch phase has run.
    pub fn item_count(&self) -> Option<usize> {
        self.item_count
    }

    async fn run_landing(&mut self) -> Result<(), PhaseError> {
        self.session
            .navigate(&self.config.advanced.site.home_url)
            .await?;
        self.session.save_snapshot("landing");
        Ok(())
    }

    async fn run_sign_in(&mut self) -> Result<(), PhaseError> {
        self.session.save_snapshot("signin");

        if !self.session.page_markers().contains(&PageMarker::SignInForm) {
            // An existing session cookie can skip the sign-in redirect.
            warn!("No sign-in form on the current page, continuing with the existing session");
            return Ok(());
        }

        info!("Signing in as {}", self.credentials.email);
        self.session
            .submit_sign_in(&self.credentials.email, &self.credentials.password, None)
            .await?;
        self.session.save_snapshot("after-signin");
        Ok(())
    }

    /// The challenge is an expected branch, not an error. The response is
    /// submitted and the run proceeds whether or not the site accepted it;
    /// the next phase's behavior is the only signal.
    async fn run_challenge_gate(&mut self) -> Result<(), PhaseError> {
        if !self
            .session
            .page_markers()
            .contains(&PageMarker::ChallengeRequested)
        {
            return Ok(());
        }

        warn!("Verification challenge requested during sign-in");
        self.session.save_snapshot("challenge");
        let image_path = self.session.save_challenge_image().await;

        let answer = self
            .prompt
            .read_challenge_response(image_path.as_deref())
            .await?;
        info!("Resubmitting sign-in with the challenge response");
        self.session
            .submit_sign_in(
                &self.credentials.email,
                &self.credentials.password,
                Some(&answer),
            )
            .await?;
        self.session.save_snapshot("after-challenge");
        Ok(())
    }

    async fn run_prime_session(&mut self) -> Result<(), PhaseError> {
        self.session
            .navigate(&self.config.advanced.site.devices_url)
            .await?;
        self.session.save_snapshot("devices");

        let token = self.session.extract_csrf_token()?;
        info!("Security token obtained");
        self.csrf_token = Some(token);
        Ok(())
    }

    async fn run_fetch_library(&mut self) -> Result<(), PhaseError> {
        // Guards against re-entry while the pagination is still unwinding.
        self.state.begin_fetch();
        let result = self.fetch_and_export().await;
        self.state.end_fetch();
        result
    }

    async fn fetch_and_export(&mut self) -> Result<(), PhaseError> {
        let token = self.csrf_token.clone().ok_or(PhaseError::TokenUnavailable)?;
        let endpoint = Arc::new(OwnershipEndpoint::new(
            self.session.http(),
            self.config.advanced.site.ownership_query_url.clone(),
            token,
        ));

        info!(
            "Fetching the item list under {} sort order(s)",
            self.plan.len()
        );
        let merger = MultiOrderMerger::new(endpoint);
        let items = merger.run(&self.plan, self.config.user.batch_size).await?;

        if let Err(e) = std::fs::create_dir_all(&self.config.user.output_dir) {
            warn!("Could not create output directory: {}", e);
        }
        let raw_path = self.output_path("txt");
        let table_path = self.output_path("csv");
        export::write_raw(&raw_path, &items)?;
        export::write_table(&table_path, &items)?;

        self.item_count = Some(items.len());
        Ok(())
    }

    fn run_finish(&self) {
        match self.item_count {
            Some(count) => info!(
                "Got item list successfully: {} unique items, look in {}",
                count,
                self.output_path("csv").display()
            ),
            None => warn!("Finish reached without a fetched item list"),
        }
    }

    fn output_path(&self, extension: &str) -> PathBuf {
        self.config
            .user
            .output_dir
            .join(format!("{}.{}", self.config.user.output_stem, extension))
    }
}

#[async_trait::async_trait]
impl PhaseExecutor for StepRunner {
    async fn run_phase(&mut self, phase: StepPhase) -> Result<(), PhaseError> {
        match phase {
            StepPhase::Landing => self.run_landing().await,
            StepPhase::SignIn => self.run_sign_in().await,
            StepPhase::ChallengeGate => self.run_challenge_gate().await,
            StepPhase::PrimeSession => self.run_prime_session().await,
            StepPhase::FetchLibrary => self.run_fetch_library().await,
            StepPhase::Finish => {
                self.run_finish();
                Ok(())
            }
        }
    }
}
