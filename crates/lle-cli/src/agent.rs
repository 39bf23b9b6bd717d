//! The `agent` subcommand: runs the voice-agent view in a terminal.

use crate::commands::CliError;
use lle_agent::{present, AgentDeps, AgentView, AgentViewOptions, ViewState};
use lle_api::ApiClient;
use lle_voice::{MediaConfig, RoomConnector, TokenFetcher};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;

fn print_state(state: &ViewState, out: &mut impl Write) -> Result<(), CliError> {
    let p = present(state);
    writeln!(out, "[{}] {}: {}", state.label(), p.title, p.message)?;
    if state.is_error() {
        writeln!(out, "Press Enter to try again, or Ctrl+C to go back.")?;
    }
    Ok(())
}

/// Mounts the view, prints every state it publishes to `out`, and retries
/// on each message from `retries`. Returns the last state once `shutdown`
/// resolves or the view reports that no child is selected; the view is
/// unmounted first, which ends its session.
pub async fn run_agent<C: RoomConnector>(
    api: ApiClient,
    media: MediaConfig,
    connector: C,
    options: AgentViewOptions,
    mut retries: mpsc::UnboundedReceiver<()>,
    shutdown: impl Future<Output = ()>,
    out: &mut impl Write,
) -> Result<ViewState, CliError> {
    let view = AgentView::mount(
        AgentDeps {
            sessions: Arc::new(api.clone()),
            tokens: Arc::new(TokenFetcher::new(api.clone())),
            connector: Arc::new(connector),
            selection: Arc::new(api.store().clone()),
            media,
        },
        options,
    );
    let mut rx = view.subscribe();
    let mut last = rx.borrow_and_update().clone();
    print_state(&last, out)?;

    tokio::pin!(shutdown);
    while last != ViewState::NoChildSelected {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                last = rx.borrow_and_update().clone();
                print_state(&last, out)?;
            }
            Some(()) = retries.recv() => {
                view.retry().await;
            }
            () = &mut shutdown => {
                tracing::info!("leaving voice agent");
                break;
            }
        }
    }

    view.unmount().await;
    Ok(last)
}
