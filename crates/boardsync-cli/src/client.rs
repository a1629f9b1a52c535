//! Host loop driving one board session.

use crate::cli::Cli;
use boardsync_core::channel::ChannelState;
use boardsync_core::config::{ClientConfig, ConfigError};
use boardsync_core::session::{SessionCoordinator, SessionError, SessionNotice};
use boardsync_core::storage::BoardApi;
use boardsync_core::sync::Transport;
use boardsync_render::{BoardView, RasterSurface, RendererError};
use kurbo::Point;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often the session is polled.
const TICK: Duration = Duration::from_millis(50);

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Render(#[from] RendererError),
}

type Session<T, A> = SessionCoordinator<T, A, BoardView<RasterSurface>>;

pub async fn run(cli: Cli) -> Result<(), ClientError> {
    let config = cli.resolve_config()?;
    let view = BoardView::new(RasterSurface::new(config.canvas_width, config.canvas_height));
    let mut session = SessionCoordinator::from_config(&config, &cli.board, view)?;

    if let Err(e) = session.load_initial().await {
        log::warn!("Continuing without snapshot: {}", e);
    }
    session.connect()?;

    let deadline = cli.duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut demo_pending = cli.demo;
    let mut saved_frame = 0;
    let mut ticker = tokio::time::interval(TICK);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c => {
                log::info!("Interrupted");
                break;
            }
        }

        session.poll(Instant::now());
        if session.view_mut().poll_images() {
            session.repaint();
        }
        for notice in session.take_notices() {
            report(&notice);
        }

        if demo_pending && session.channel_state() == ChannelState::Open {
            demo_pending = false;
            submit_demo(&mut session, &config).await;
        }

        let frame = session.view().frames();
        if frame != saved_frame {
            saved_frame = frame;
            if let Some(ref path) = cli.snapshot {
                save_snapshot(session.view().surface(), path)?;
            }
        }

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
    }

    session.shutdown();
    session.poll(Instant::now());
    log::info!(
        "Left board {} with {} operations ({} visible)",
        session.board_id(),
        session.log().len(),
        session.visible_operations().len()
    );
    Ok(())
}

fn report(notice: &SessionNotice) {
    match notice {
        SessionNotice::Connected => log::info!("Connected"),
        SessionNotice::Disconnected { code, reconnecting } => {
            if *reconnecting {
                log::warn!("Connection lost ({}), reconnecting", code);
            } else {
                log::info!("Disconnected ({})", code);
            }
        }
        SessionNotice::UserJoined(user) => log::info!("{} joined", user.email),
        SessionNotice::UserLeft(user) => log::info!("{} left", user.email),
        SessionNotice::SnapshotFailed(reason) => log::error!("Failed to load board: {}", reason),
        SessionNotice::SendFailed { operation, reason } => {
            log::error!("Operation {} not delivered: {}", operation, reason)
        }
    }
}

/// A small square stroke and a greeting near the top-left corner.
async fn submit_demo<T: Transport, A: BoardApi>(session: &mut Session<T, A>, config: &ClientConfig) {
    let factory = session.factory().clone();
    let stroke = factory.default_draw(vec![
        Point::new(40.0, 40.0),
        Point::new(140.0, 40.0),
        Point::new(140.0, 140.0),
        Point::new(40.0, 140.0),
        Point::new(40.0, 40.0),
    ]);
    let label = factory.default_text(40.0, 180.0, &format!("hello from {}", config.email));

    for operation in [stroke, label] {
        if let Err(e) = session.submit_local(operation).await {
            log::error!("Demo operation failed: {}", e);
        }
    }
}

fn save_snapshot(surface: &RasterSurface, path: &Path) -> Result<(), RendererError> {
    surface.save_png(path)?;
    log::debug!("Wrote snapshot to {}", path.display());
    Ok(())
}
