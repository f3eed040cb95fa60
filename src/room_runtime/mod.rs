use crate::config::ServerConfig;
use crate::game::room::Room;
use crate::transport::tcp_session::handle_socket;
use anyhow::Context;
use axum::{extract::State, http::Method, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tower_http::cors::{Any, CorsLayer};

/// Grace period after game over so writers can flush the final STATE and BYE
/// before sessions are torn down.
const FINAL_FLUSH: Duration = Duration::from_millis(250);
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Serialize)]
struct OkResponse {
  ok: bool,
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
  let listener = TcpListener::bind(config.game_addr)
    .await
    .with_context(|| format!("failed to bind game port {}", config.game_addr))?;
  let status_listener = match config.status_addr {
    Some(addr) => Some(
      TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind status port {addr}"))?,
    ),
    None => None,
  };

  let settings = config.room;
  tracing::info!(
    address = %listener.local_addr()?,
    mode = ?settings.mode,
    world = ?settings.grid.world(),
    width = settings.grid.width(),
    height = settings.grid.height(),
    time_limit_sec = settings.time_limit_sec,
    tick_ms = settings.tick_ms,
    "arena listening"
  );
  let tick = Duration::from_millis(settings.tick_ms);
  let room = Arc::new(Room::new(settings));
  let (shutdown_tx, shutdown_rx) = watch::channel(false);

  let accept_task = tokio::spawn(accept_loop(
    listener,
    Arc::clone(&room),
    shutdown_rx.clone(),
  ));

  if let Some(status_listener) = status_listener {
    let status_room = Arc::clone(&room);
    let status_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
      if let Err(error) = serve_status(status_listener, status_room, status_shutdown).await {
        tracing::warn!(?error, "status server stopped");
      }
    });
  }

  let mut tick_task = tokio::spawn(tick_loop(Arc::clone(&room), tick, shutdown_rx));

  tokio::select! {
    result = tokio::signal::ctrl_c() => {
      if let Err(error) = result {
        tracing::warn!(?error, "failed to listen for ctrl-c");
      }
      tracing::info!("shutdown requested");
    }
    _ = &mut tick_task => {
      tracing::info!(scoreboard = ?room.scoreboard().await, "game finished");
      tokio::time::sleep(FINAL_FLUSH).await;
    }
  }

  let _ = shutdown_tx.send(true);
  let _ = accept_task.await;
  tick_task.abort();
  Ok(())
}

async fn accept_loop(listener: TcpListener, room: Arc<Room>, mut shutdown: watch::Receiver<bool>) {
  loop {
    let accepted = tokio::select! {
      result = listener.accept() => result,
      _ = shutdown.changed() => break,
    };
    match accepted {
      Ok((stream, peer)) => {
        tracing::debug!(%peer, "connection accepted");
        tokio::spawn(handle_socket(stream, Arc::clone(&room), shutdown.clone()));
      }
      Err(error) => {
        tracing::warn!(%error, "accept failed");
        tokio::time::sleep(ACCEPT_BACKOFF).await;
      }
    }
  }
  tracing::info!("accept loop stopped");
}

/// Drives the simulation at a fixed cadence. Late ticks are skipped rather
/// than bunched, and each step is fed the real time since the previous one.
async fn tick_loop(room: Arc<Room>, tick: Duration, mut shutdown: watch::Receiver<bool>) {
  let mut interval = tokio::time::interval(tick);
  interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
  let mut last = Instant::now();

  loop {
    tokio::select! {
      _ = interval.tick() => {}
      _ = shutdown.changed() => return,
    }
    let now = Instant::now();
    let dt_ms = now.duration_since(last).as_millis().min(u32::MAX as u128) as u32;
    last = now;

    if room.step(dt_ms).await.finished {
      return;
    }
  }
}

fn status_router(room: Arc<Room>) -> Router {
  let cors = CorsLayer::new()
    .allow_origin(Any)
    .allow_methods([Method::GET])
    .allow_headers(Any);
  Router::new()
    .route("/api/health", get(health))
    .route("/api/scoreboard", get(scoreboard))
    .layer(cors)
    .with_state(room)
}

async fn serve_status(
  listener: TcpListener,
  room: Arc<Room>,
  mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
  tracing::info!(address = %listener.local_addr()?, "status endpoint listening");
  axum::serve(listener, status_router(room))
    .with_graceful_shutdown(async move {
      let _ = shutdown.changed().await;
    })
    .await?;
  Ok(())
}

async fn health() -> impl IntoResponse {
  Json(OkResponse { ok: true })
}

async fn scoreboard(State(room): State<Arc<Room>>) -> impl IntoResponse {
  Json(room.scoreboard().await)
}
