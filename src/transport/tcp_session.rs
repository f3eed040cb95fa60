use crate::game::room::session::{OutboundControl, SessionIo};
use crate::game::room::Room;
use crate::game::types::NameBuf;
use crate::protocol::{
  self, decode_client_message, read_frame, write_frame, ClientMessage, ProtocolError,
};
use crate::shared::names::display_name;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use uuid::Uuid;

/// Upper bound on any single frame write. A peer that cannot take a frame in
/// this window is dropped.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(2);

async fn send<W>(writer: &mut W, bytes: &[u8]) -> io::Result<()>
where
  W: AsyncWrite + Unpin,
{
  match tokio::time::timeout(SEND_TIMEOUT, write_frame(writer, bytes)).await {
    Ok(result) => result,
    Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "frame write timed out")),
  }
}

async fn read_hello<R>(reader: &mut R) -> Result<NameBuf, ProtocolError>
where
  R: AsyncRead + Unpin,
{
  let frame = read_frame(reader).await?;
  match decode_client_message(&frame)? {
    ClientMessage::Hello { name } => Ok(name),
    _ => Err(ProtocolError::UnexpectedMessage(frame.message_type)),
  }
}

pub async fn handle_socket(stream: TcpStream, room: Arc<Room>, shutdown: watch::Receiver<bool>) {
  let peer = stream
    .peer_addr()
    .map(|address| address.to_string())
    .unwrap_or_else(|_| "unknown".to_string());
  let _ = stream.set_nodelay(true);
  let (reader, writer) = stream.into_split();
  serve_connection(reader, writer, peer, room, shutdown).await;
}

/// Runs one client from HELLO to teardown. The slot is always released
/// through `Room::disconnect`, whichever side ends the session.
async fn serve_connection<R, W>(
  mut reader: R,
  mut writer: W,
  peer: String,
  room: Arc<Room>,
  mut shutdown: watch::Receiver<bool>,
) where
  R: AsyncRead + Unpin,
  W: AsyncWrite + Unpin + Send + 'static,
{
  let connection = Uuid::new_v4();

  let hello = tokio::select! {
    result = read_hello(&mut reader) => result,
    _ = shutdown.changed() => return,
  };
  let name = match hello {
    Ok(name) => name,
    Err(error) => {
      tracing::debug!(%peer, %error, "handshake failed before hello");
      return;
    }
  };

  let outcome = match room.join(name, connection).await {
    Ok(outcome) => outcome,
    Err(error) => {
      tracing::info!(%peer, name = %display_name(&name), %error, "join refused");
      let _ = writer.shutdown().await;
      return;
    }
  };
  let slot = outcome.slot;

  let handshake = async {
    send(&mut writer, &protocol::encode_welcome(slot as u32)).await?;
    send(&mut writer, &protocol::encode_config(&outcome.config)).await?;
    Ok::<_, io::Error>(())
  };
  if let Err(error) = handshake.await {
    tracing::warn!(%peer, %connection, slot, %error, "handshake write failed");
    room.disconnect(slot, connection).await;
    return;
  }

  let io = SessionIo::new();
  let outbound = Arc::clone(&io.outbound);
  if !room.mark_ready(slot, connection, Arc::clone(&outbound)).await {
    room.disconnect(slot, connection).await;
    return;
  }
  tracing::info!(
    %peer,
    %connection,
    slot,
    name = %display_name(&name),
    reattached = outcome.reattached,
    "session ready"
  );

  let writer_peer = peer.clone();
  let mut send_task = tokio::spawn(async move {
    if let Err(error) = write_loop(writer, io).await {
      tracing::info!(peer = %writer_peer, %error, "writer stopped");
    }
  });

  loop {
    let frame = tokio::select! {
      result = read_frame(&mut reader) => result,
      _ = &mut send_task => break,
      _ = shutdown.changed() => break,
    };
    let message = match frame.and_then(|frame| decode_client_message(&frame)) {
      Ok(message) => message,
      Err(ProtocolError::Io(error)) if error.kind() == io::ErrorKind::UnexpectedEof => break,
      Err(error) => {
        tracing::warn!(%peer, slot, %error, "dropping connection on protocol error");
        break;
      }
    };
    match message {
      ClientMessage::Input {
        direction: Some(direction),
      } => room.apply_input(slot, connection, direction).await,
      ClientMessage::Input { direction: None } => {}
      ClientMessage::PauseToggle => room.toggle_pause(slot, connection).await,
      ClientMessage::Leave => {
        room.leave(slot, connection).await;
        break;
      }
      ClientMessage::Bye => break,
      ClientMessage::Ping => {
        outbound.push_control(protocol::encode_empty(protocol::TYPE_PONG));
      }
      ClientMessage::Hello { .. } => {
        tracing::warn!(%peer, slot, "second hello on an active session");
        break;
      }
    }
  }

  room.disconnect(slot, connection).await;
  send_task.abort();
  tracing::info!(%peer, %connection, slot, "session ended");
}

/// Drains the session's outbound side. A pending snapshot is always written
/// before a control frame so the final STATE precedes BYE.
async fn write_loop<W>(mut writer: W, io: SessionIo) -> io::Result<()>
where
  W: AsyncWrite + Unpin,
{
  let SessionIo {
    outbound,
    mut control_rx,
  } = io;

  loop {
    tokio::select! {
      control = control_rx.recv() => {
        if let Some(payload) = outbound.state.take_latest() {
          send(&mut writer, &payload).await?;
        }
        match control {
          Some(OutboundControl::Frame(payload)) => send(&mut writer, &payload).await?,
          Some(OutboundControl::Close) | None => {
            writer.shutdown().await?;
            return Ok(());
          }
        }
      }
      _ = outbound.state.wait_for_update() => {
        if let Some(payload) = outbound.state.take_latest() {
          send(&mut writer, &payload).await?;
        }
      }
    }
  }
}
