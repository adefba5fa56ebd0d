use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use modsentry_core::api::{FilePart, LoginCredentials, Registration};
use modsentry_core::models::{FinalVerdict, ModerationResult};
use modsentry_core::{AuthOutcome, Config, SessionManager};
use tracing::warn;

use crate::{Command, PolicyAction};

pub(crate) async fn run(
    command: Command,
    session: &SessionManager,
    config: &mut Config,
) -> Result<()> {
    match command {
        Command::Login { username } => login(session, config, username).await,
        Command::Register {
            username,
            email,
            first_name,
            last_name,
        } => {
            let password = rpassword::prompt_password("Password: ")?;
            let password2 = rpassword::prompt_password("Confirm password: ")?;
            let registration = Registration {
                username,
                email,
                password,
                password2,
                first_name,
                last_name,
            };
            let outcome = session.register(&registration).await;
            finish_auth(outcome, session, config, &registration.username)
        }
        Command::Logout => {
            session.logout().await;
            println!("Logged out.");
            Ok(())
        }
        Command::Whoami { reload } => whoami(session, reload).await,
        Command::Policies { action } => policies(session, action).await,
        Command::Moderate { file } => {
            let part = read_file("file", &file)?;
            let result = session.moderation().moderate_file(part).await?;
            print_result(&result);
            Ok(())
        }
        Command::History => {
            let history = session.moderation().history().await?;
            if history.results.is_empty() {
                println!("No moderation results yet.");
            }
            for row in history.results {
                println!(
                    "{:>5}  {:<16} {:>3} flagged  {}  {}",
                    row.id,
                    row.verdict.to_string(),
                    row.violation_count,
                    row.created_at.format("%Y-%m-%d %H:%M"),
                    row.filename
                );
            }
            Ok(())
        }
        Command::Show { id } => {
            let result = session.moderation().detail(id).await?;
            print_result(&result);
            Ok(())
        }
        Command::Verdict { id, verdict } => {
            let Some(verdict) = FinalVerdict::parse(&verdict) else {
                bail!("Unknown verdict '{}': use approved, rejected or pending", verdict);
            };
            let update = session
                .moderation()
                .update_final_verdict(id, verdict)
                .await?;
            println!("{}", update.message);
            Ok(())
        }
    }
}

async fn login(
    session: &SessionManager,
    config: &mut Config,
    username: Option<String>,
) -> Result<()> {
    let username = match username.or_else(|| config.last_username.clone()) {
        Some(name) => name,
        None => prompt_username()?,
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", username))?;

    println!("Authenticating...");
    let outcome = session
        .login(&LoginCredentials::new(username.clone(), password))
        .await;
    finish_auth(outcome, session, config, &username)
}

fn finish_auth(
    outcome: AuthOutcome,
    session: &SessionManager,
    config: &mut Config,
    username: &str,
) -> Result<()> {
    if let AuthOutcome::Failure(e) = outcome {
        bail!("{}", e);
    }

    config.last_username = Some(username.to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    let name = session
        .current_user()
        .map(|u| u.display_name())
        .unwrap_or_else(|| username.to_string());
    println!("Signed in as {}.", name);
    Ok(())
}

async fn whoami(session: &SessionManager, reload: bool) -> Result<()> {
    if !session.is_authenticated() {
        println!("Not signed in.");
        return Ok(());
    }
    let user = if reload {
        session.reload_profile().await?
    } else {
        match session.current_user() {
            Some(user) => user,
            None => bail!("Not signed in"),
        }
    };
    println!("{} <{}>", user.display_name(), user.email);
    println!("username: {}", user.username);
    if let Some(role) = user.role {
        println!("role:     {}", role);
    }
    Ok(())
}

async fn policies(session: &SessionManager, action: PolicyAction) -> Result<()> {
    let api = session.moderation();
    match action {
        PolicyAction::List => {
            let list = api.list_policies().await?;
            if !list.policy_store_exists {
                println!("Policy store is empty.");
            }
            for policy in list.policies {
                println!(
                    "{:>5}  {:>9}  {}  {}",
                    policy.id,
                    policy.display_size(),
                    policy.uploaded_at.format("%Y-%m-%d"),
                    policy.filename
                );
            }
        }
        PolicyAction::Upload { files } => {
            let parts = files
                .iter()
                .map(|path| read_file("files", path))
                .collect::<Result<Vec<_>>>()?;
            let upload = api.upload_policies(parts).await?;
            println!("{}", upload.message);
        }
        PolicyAction::Delete { id } => {
            let response = api.delete_policy(id).await?;
            println!("{}", response.message);
            if let Some(note) = response.note {
                println!("{}", note);
            }
        }
        PolicyAction::Clear => {
            let response = api.clear_policies().await?;
            println!("{}", response.message);
        }
    }
    Ok(())
}

fn print_result(result: &ModerationResult) {
    println!("{} - {}", result.filename, result.verdict);
    println!(
        "chunks: {} total, {} allowed, {} review, {} violation",
        result.total_chunks, result.allowed_chunks, result.review_chunks, result.violation_chunks
    );
    if let Some(final_verdict) = result.final_verdict {
        println!("final verdict: {}", final_verdict);
    }
    for violation in &result.violations {
        println!();
        println!("[{}] {}", violation.verdict, violation.chunk_id);
        println!("  {}", violation.explanation);
    }
}

fn read_file(field: &str, path: &Path) -> Result<FilePart> {
    FilePart::from_path(field, path).with_context(|| format!("Failed to read {}", path.display()))
}

fn prompt_username() -> Result<String> {
    print!("Username: ");
    io::stdout().flush()?;

    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    Ok(username.trim().to_string())
}
