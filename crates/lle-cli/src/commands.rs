//! Bodies of the account, children, sessions and analytics subcommands.
//! Each writes human-readable lines to `out`.

use lle_api::{ApiClient, ApiError};
use lle_store::{ChildSelection, StoreError};
use lle_types::{ChildProfile, ChildUpdate, RegisterRequest, ValidationError};
use std::io::Write;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no child selected, run `lle children select <id>` or pass --child")]
    NoChildSelected,

    #[error("no child with id {0}")]
    UnknownChild(Uuid),

    #[error("nothing to update, pass at least one of --name, --age, --prompt")]
    NothingToUpdate,

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

pub async fn login(
    api: &ApiClient,
    username: &str,
    password: &str,
    out: &mut impl Write,
) -> Result<(), CliError> {
    api.login(username, password).await?;
    writeln!(out, "Logged in as {username}.")?;
    Ok(())
}

pub async fn register(
    api: &ApiClient,
    request: &RegisterRequest,
    out: &mut impl Write,
) -> Result<(), CliError> {
    api.register(request).await?;
    writeln!(out, "Registered {} and logged in.", request.username)?;
    Ok(())
}

pub fn logout(api: &ApiClient, out: &mut impl Write) -> Result<(), CliError> {
    api.logout();
    writeln!(out, "Logged out.")?;
    Ok(())
}

fn selected_id(api: &ApiClient) -> Result<Option<Uuid>, CliError> {
    Ok(api.store().selected_child()?.map(|child| child.id))
}

/// Uses `child` when given, otherwise the selected child.
pub fn resolve_child(api: &ApiClient, child: Option<Uuid>) -> Result<Uuid, CliError> {
    match child {
        Some(id) => Ok(id),
        None => selected_id(api)?.ok_or(CliError::NoChildSelected),
    }
}

pub async fn list_children(api: &ApiClient, out: &mut impl Write) -> Result<(), CliError> {
    let page = api.list_children().await?;
    let selected = selected_id(api)?;
    if page.results.is_empty() {
        writeln!(out, "No children yet. Add one with `lle children add <name> <age>`.")?;
    }
    for child in &page.results {
        let mark = if Some(child.id) == selected { '*' } else { ' ' };
        writeln!(out, "{mark} {}  {} (age {})", child.id, child.name, child.age)?;
    }
    if page.next.is_some() {
        writeln!(out, "({} children in total, showing the first page)", page.count)?;
    }
    Ok(())
}

pub async fn add_child(
    api: &ApiClient,
    profile: &ChildProfile,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let child = api.create_child(profile).await?;
    writeln!(out, "Added {} ({}).", child.name, child.id)?;
    Ok(())
}

pub async fn update_child(
    api: &ApiClient,
    id: Uuid,
    update: &ChildUpdate,
    out: &mut impl Write,
) -> Result<(), CliError> {
    if update.is_empty() {
        return Err(CliError::NothingToUpdate);
    }
    let child = api.update_child(id, update).await?;
    if selected_id(api)? == Some(id) {
        api.store().select_child(&child)?;
    }
    writeln!(out, "Updated {} ({}).", child.name, child.id)?;
    Ok(())
}

pub async fn remove_child(api: &ApiClient, id: Uuid, out: &mut impl Write) -> Result<(), CliError> {
    api.delete_child(id).await?;
    if selected_id(api)? == Some(id) {
        api.store().clear_selected_child()?;
    }
    writeln!(out, "Removed {id}.")?;
    Ok(())
}

pub async fn select_child(api: &ApiClient, id: Uuid, out: &mut impl Write) -> Result<(), CliError> {
    let child = match api.get_child(id).await {
        Ok(child) => child,
        Err(e) if e.status() == Some(404) => return Err(CliError::UnknownChild(id)),
        Err(e) => return Err(e.into()),
    };
    api.store().select_child(&child)?;
    writeln!(out, "Selected {} ({}).", child.name, child.id)?;
    Ok(())
}

pub async fn list_sessions(
    api: &ApiClient,
    child: Option<Uuid>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let child_id = resolve_child(api, child)?;
    let sessions = api.list_sessions(child_id).await?;
    if sessions.is_empty() {
        writeln!(out, "No sessions yet.")?;
    }
    for session in &sessions {
        let length = match session.duration() {
            Some(d) => format!("{}m{:02}s", d.num_minutes(), d.num_seconds() % 60),
            None => "active".to_string(),
        };
        writeln!(
            out,
            "{:>6}  {}  {:<8}  {}",
            session.id,
            session.started_at.format("%Y-%m-%d %H:%M"),
            length,
            session.livekit_room
        )?;
    }
    Ok(())
}

/// Ends every session the local log still records as open, e.g. after a
/// crash. Sessions the server no longer knows are dropped from the log.
/// Returns how many were ended.
pub async fn end_stale_sessions(api: &ApiClient, out: &mut impl Write) -> Result<usize, CliError> {
    let open = api.store().open_sessions()?;
    if open.is_empty() {
        writeln!(out, "No open sessions.")?;
        return Ok(0);
    }
    let mut ended = 0;
    for session in &open {
        match api.end_session(session.session_id).await {
            Ok(()) => {
                ended += 1;
                writeln!(
                    out,
                    "Ended session {} (room {}, started {}).",
                    session.session_id, session.livekit_room, session.started_at
                )?;
            }
            Err(e) if e.status() == Some(404) => {
                api.store().record_session_ended(session.session_id)?;
                writeln!(out, "Session {} no longer exists on the server.", session.session_id)?;
            }
            Err(e) => {
                tracing::warn!(session_id = session.session_id, error = %e, "failed to end stale session");
                writeln!(out, "Could not end session {}: {e}", session.session_id)?;
            }
        }
    }
    Ok(ended)
}

pub async fn analytics(
    api: &ApiClient,
    child: Option<Uuid>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let child_id = resolve_child(api, child)?;
    let page = api.analytics(child_id).await?;
    if page.results.is_empty() {
        writeln!(out, "No analytics yet.")?;
    }
    for record in &page.results {
        writeln!(
            out,
            "Session {}: {} vocalizations, {} responses, {} unique words, {} encouragements",
            record.session,
            record.child_vocalizations,
            record.assistant_responses,
            record.unique_child_words,
            record.encouragements_given
        )?;
        if let Some(avg) = record.avg_child_utterance_length {
            writeln!(out, "  average utterance: {avg:.1} words")?;
        }
        if !record.topics_detected.is_empty() {
            writeln!(out, "  topics: {}", record.topics_detected.join(", "))?;
        }
        if !record.best_utterance.is_empty() {
            writeln!(out, "  best: \"{}\"", record.best_utterance)?;
        }
        if !record.conversation_summary.is_empty() {
            writeln!(out, "  {}", record.conversation_summary)?;
        }
    }
    Ok(())
}
