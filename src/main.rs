use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use uuid::Uuid;

use kindle_shelf_lib::application::{
    Credentials, SchedulerState, StepRunner, StepScheduler, TerminalPrompt,
};
use kindle_shelf_lib::cli::Args;
use kindle_shelf_lib::infrastructure::{
    init_logging_with_config, ConfigManager, HttpClient, HttpClientConfig, PageSession,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Usage errors abort here, before any network activity.
    let args = Args::parse();

    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new()?,
    };
    let mut config = manager.load().await?;

    if let Some(dir) = &args.output_dir {
        config.user.output_dir = dir.clone();
    }
    if let Some(batch_size) = args.batch_size {
        config.user.batch_size = batch_size;
    }
    if let Some(level) = &args.log_level {
        config.user.logging.level = level.clone();
    }
    config.validate()?;

    init_logging_with_config(&config.user.logging)?;

    let run_id = Uuid::new_v4();
    info!(
        "kindle-shelf {} starting (run {})",
        env!("CARGO_PKG_VERSION"),
        run_id
    );
    info!("User: {}", args.email);
    info!("Using user agent of {}", config.advanced.user_agent);

    let password = match args.password.clone() {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ")
            .context("Failed to read password from the terminal")?,
    };

    let http = Arc::new(HttpClient::new(HttpClientConfig {
        user_agent: config.advanced.user_agent.clone(),
        timeout_seconds: config.advanced.request_timeout_seconds,
        max_requests_per_second: config.advanced.max_requests_per_second,
    })?);

    let state = Arc::new(SchedulerState::new());
    let diagnostics_dir = config.user.output_dir.join("diagnostics");
    let session = PageSession::new(Arc::clone(&http), Arc::clone(&state), diagnostics_dir);

    let credentials = Credentials {
        email: args.email.clone(),
        password,
    };
    let plan = args.fetch_plan();

    let phase_timeout = Duration::from_secs(config.advanced.phase_timeout_seconds);
    let mut runner = StepRunner::new(
        session,
        Box::new(TerminalPrompt),
        Arc::clone(&state),
        config,
        credentials,
        plan,
    );

    let scheduler = StepScheduler::new(state, phase_timeout);
    scheduler
        .run(&mut runner)
        .await
        .context("Extraction run failed")?;

    Ok(())
}
