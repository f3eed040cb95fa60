use crate::game::constants::{MAX_PLAYERS, NAME_MAX};
use crate::game::types::{Cell, Direction, GameMode, NameBuf, WorldMode};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const HEADER_LEN: usize = 6;
pub const MAX_PAYLOAD_LEN: u32 = 1 << 20;

pub const TYPE_HELLO: u16 = 1;
pub const TYPE_WELCOME: u16 = 2;
pub const TYPE_PING: u16 = 3;
pub const TYPE_PONG: u16 = 4;
pub const TYPE_BYE: u16 = 5;
pub const TYPE_CONFIG: u16 = 6;
pub const TYPE_INPUT: u16 = 7;
pub const TYPE_STATE: u16 = 8;
pub const TYPE_PAUSE_TOGGLE: u16 = 9;
pub const TYPE_LEAVE: u16 = 10;

const CONFIG_FIXED_LEN: usize = 2 + 2 + 1 + 1 + 2 + 4;

#[derive(Debug, Error)]
pub enum ProtocolError {
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error("message type {message_type} carries {actual} payload bytes, expected {expected}")]
  BadLength {
    message_type: u16,
    expected: usize,
    actual: usize,
  },
  #[error("unknown message type {0}")]
  UnknownType(u16),
  #[error("declared payload of {0} bytes exceeds the frame limit")]
  PayloadTooLarge(u32),
  #[error("message type {0} is not valid in this direction or state")]
  UnexpectedMessage(u16),
  #[error("malformed {0} payload")]
  Malformed(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
  pub message_type: u16,
  pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
  Hello { name: NameBuf },
  /// `None` when the direction byte is out of range; such input is ignored.
  Input { direction: Option<Direction> },
  PauseToggle,
  Leave,
  Bye,
  Ping,
}

/// Reads one header and exactly the declared payload. Unknown types are
/// fully drained here, so the caller can reject them without losing framing.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, ProtocolError>
where
  R: AsyncRead + Unpin,
{
  let mut header = [0u8; HEADER_LEN];
  reader.read_exact(&mut header).await?;
  let message_type = u16::from_be_bytes([header[0], header[1]]);
  let len = u32::from_be_bytes([header[2], header[3], header[4], header[5]]);
  if len > MAX_PAYLOAD_LEN {
    return Err(ProtocolError::PayloadTooLarge(len));
  }
  let mut payload = vec![0u8; len as usize];
  reader.read_exact(&mut payload).await?;
  Ok(Frame {
    message_type,
    payload,
  })
}

pub async fn write_frame<W>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
  W: AsyncWrite + Unpin,
{
  writer.write_all(bytes).await?;
  writer.flush().await
}

fn expect_len(frame: &Frame, expected: usize) -> Result<(), ProtocolError> {
  if frame.payload.len() != expected {
    return Err(ProtocolError::BadLength {
      message_type: frame.message_type,
      expected,
      actual: frame.payload.len(),
    });
  }
  Ok(())
}

pub fn decode_client_message(frame: &Frame) -> Result<ClientMessage, ProtocolError> {
  match frame.message_type {
    TYPE_HELLO => {
      expect_len(frame, NAME_MAX)?;
      let name = Reader::new(&frame.payload)
        .read_array::<NAME_MAX>()
        .ok_or(ProtocolError::Malformed("hello"))?;
      Ok(ClientMessage::Hello { name })
    }
    TYPE_INPUT => {
      expect_len(frame, 1)?;
      let code = Reader::new(&frame.payload)
        .read_u8()
        .ok_or(ProtocolError::Malformed("input"))?;
      Ok(ClientMessage::Input {
        direction: Direction::from_code(code),
      })
    }
    TYPE_PAUSE_TOGGLE => {
      expect_len(frame, 0)?;
      Ok(ClientMessage::PauseToggle)
    }
    TYPE_LEAVE => {
      expect_len(frame, 0)?;
      Ok(ClientMessage::Leave)
    }
    TYPE_BYE => {
      expect_len(frame, 0)?;
      Ok(ClientMessage::Bye)
    }
    TYPE_PING => {
      expect_len(frame, 0)?;
      Ok(ClientMessage::Ping)
    }
    TYPE_WELCOME | TYPE_PONG | TYPE_CONFIG | TYPE_STATE => {
      Err(ProtocolError::UnexpectedMessage(frame.message_type))
    }
    other => Err(ProtocolError::UnknownType(other)),
  }
}

pub struct Encoder {
  buffer: Vec<u8>,
}

impl Encoder {
  /// Starts a framed message; the length field is patched by `finish`.
  pub fn message(message_type: u16, payload_capacity: usize) -> Self {
    let mut buffer = Vec::with_capacity(HEADER_LEN + payload_capacity);
    buffer.extend_from_slice(&message_type.to_be_bytes());
    buffer.extend_from_slice(&0u32.to_be_bytes());
    Self { buffer }
  }

  pub fn finish(mut self) -> Vec<u8> {
    let len = (self.buffer.len() - HEADER_LEN) as u32;
    self.buffer[2..HEADER_LEN].copy_from_slice(&len.to_be_bytes());
    self.buffer
  }

  pub fn write_u8(&mut self, value: u8) {
    self.buffer.push(value);
  }

  pub fn write_bool(&mut self, value: bool) {
    self.write_u8(u8::from(value));
  }

  pub fn write_u16(&mut self, value: u16) {
    self.buffer.extend_from_slice(&value.to_be_bytes());
  }

  pub fn write_u32(&mut self, value: u32) {
    self.buffer.extend_from_slice(&value.to_be_bytes());
  }

  pub fn write_cell(&mut self, cell: Cell) {
    self.write_u16(cell.x);
    self.write_u16(cell.y);
  }

  pub fn write_bytes(&mut self, value: &[u8]) {
    self.buffer.extend_from_slice(value);
  }
}

pub struct Reader<'a> {
  data: &'a [u8],
  offset: usize,
}

impl<'a> Reader<'a> {
  pub fn new(data: &'a [u8]) -> Self {
    Self { data, offset: 0 }
  }

  pub fn read_u8(&mut self) -> Option<u8> {
    let value = *self.data.get(self.offset)?;
    self.offset += 1;
    Some(value)
  }

  pub fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
    let slice = self.read_slice(N)?;
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    Some(out)
  }

  pub fn read_slice(&mut self, len: usize) -> Option<&'a [u8]> {
    if self.offset + len > self.data.len() {
      return None;
    }
    let slice = &self.data[self.offset..self.offset + len];
    self.offset += len;
    Some(slice)
  }
}

/// Client-side reads, used when decoding server messages.
#[cfg(test)]
impl<'a> Reader<'a> {
  pub fn remaining(&self) -> usize {
    self.data.len() - self.offset
  }

  pub fn read_bool(&mut self) -> Option<bool> {
    self.read_u8().map(|value| value != 0)
  }

  pub fn read_u16(&mut self) -> Option<u16> {
    let bytes = self.read_array::<2>()?;
    Some(u16::from_be_bytes(bytes))
  }

  pub fn read_u32(&mut self) -> Option<u32> {
    let bytes = self.read_array::<4>()?;
    Some(u32::from_be_bytes(bytes))
  }

  pub fn read_cell(&mut self) -> Option<Cell> {
    Some(Cell::new(self.read_u16()?, self.read_u16()?))
  }
}

pub fn encode_empty(message_type: u16) -> Vec<u8> {
  Encoder::message(message_type, 0).finish()
}

#[cfg(test)]
pub fn encode_hello(name: &NameBuf) -> Vec<u8> {
  let mut encoder = Encoder::message(TYPE_HELLO, NAME_MAX);
  encoder.write_bytes(name);
  encoder.finish()
}

#[cfg(test)]
pub fn encode_input(code: u8) -> Vec<u8> {
  let mut encoder = Encoder::message(TYPE_INPUT, 1);
  encoder.write_u8(code);
  encoder.finish()
}

pub fn encode_welcome(player_id: u32) -> Vec<u8> {
  let mut encoder = Encoder::message(TYPE_WELCOME, 4);
  encoder.write_u32(player_id);
  encoder.finish()
}

#[cfg(test)]
pub fn decode_welcome(frame: &Frame) -> Result<u32, ProtocolError> {
  if frame.message_type != TYPE_WELCOME {
    return Err(ProtocolError::UnexpectedMessage(frame.message_type));
  }
  expect_len(frame, 4)?;
  Reader::new(&frame.payload)
    .read_u32()
    .ok_or(ProtocolError::Malformed("welcome"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPayload {
  pub width: u16,
  pub height: u16,
  pub mode: GameMode,
  pub world: WorldMode,
  pub time_limit_sec: u16,
  pub obstacles: Vec<u8>,
}

pub fn encode_config(config: &ConfigPayload) -> Vec<u8> {
  let mut encoder = Encoder::message(TYPE_CONFIG, CONFIG_FIXED_LEN + config.obstacles.len());
  encoder.write_u16(config.width);
  encoder.write_u16(config.height);
  encoder.write_u8(config.mode.code());
  encoder.write_u8(config.world.code());
  encoder.write_u16(config.time_limit_sec);
  encoder.write_u32(config.obstacles.len() as u32);
  encoder.write_bytes(&config.obstacles);
  encoder.finish()
}

#[cfg(test)]
pub fn decode_config(frame: &Frame) -> Result<ConfigPayload, ProtocolError> {
  if frame.message_type != TYPE_CONFIG {
    return Err(ProtocolError::UnexpectedMessage(frame.message_type));
  }
  let malformed = ProtocolError::Malformed("config");
  let mut reader = Reader::new(&frame.payload);
  let (Some(width), Some(height), Some(mode), Some(world), Some(time_limit_sec), Some(map_len)) = (
    reader.read_u16(),
    reader.read_u16(),
    reader.read_u8(),
    reader.read_u8(),
    reader.read_u16(),
    reader.read_u32(),
  ) else {
    return Err(malformed);
  };
  let map_len = map_len as usize;
  if map_len != width as usize * height as usize {
    return Err(malformed);
  }
  expect_len(frame, CONFIG_FIXED_LEN + map_len)?;
  let (Some(mode), Some(world), Some(obstacles)) = (
    GameMode::from_code(mode),
    WorldMode::from_code(world),
    reader.read_slice(map_len),
  ) else {
    return Err(malformed);
  };
  Ok(ConfigPayload {
    width,
    height,
    mode,
    world,
    time_limit_sec,
    obstacles: obstacles.to_vec(),
  })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerView {
  pub id: u8,
  pub used: bool,
  pub connected: bool,
  pub active: bool,
  pub alive: bool,
  pub paused: bool,
  pub name: NameBuf,
  pub score: u32,
  pub survival_ms: u32,
  pub direction: Direction,
  pub body: Vec<Cell>,
}

/// Copy of everything a STATE message carries, taken under the room lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateView {
  pub tick_ms: u16,
  pub game_over: bool,
  pub mode: GameMode,
  pub world: WorldMode,
  pub width: u16,
  pub height: u16,
  pub time_left_sec: u16,
  pub freeze_ms: u32,
  pub elapsed_sec: u32,
  pub players: Vec<PlayerView>,
  pub fruits: Vec<Cell>,
}

impl StateView {
  pub fn num_players(&self) -> u8 {
    self.players.iter().filter(|player| player.used).count() as u8
  }
}

const STATE_FIXED_LEN: usize = 2 + 1 + 1 + 1 + 2 + 2 + 2 + 4 + 4 + 1;
const PLAYER_FIXED_LEN: usize = 6 + NAME_MAX + 4 + 4 + 1 + 2;

pub fn encode_state(state: &StateView) -> Vec<u8> {
  let mut capacity = STATE_FIXED_LEN + 1 + state.fruits.len() * 4;
  for player in &state.players {
    capacity += PLAYER_FIXED_LEN + player.body.len() * 4;
  }

  let mut encoder = Encoder::message(TYPE_STATE, capacity);
  encoder.write_u16(state.tick_ms);
  encoder.write_bool(state.game_over);
  encoder.write_u8(state.mode.code());
  encoder.write_u8(state.world.code());
  encoder.write_u16(state.width);
  encoder.write_u16(state.height);
  encoder.write_u16(state.time_left_sec);
  encoder.write_u32(state.freeze_ms);
  encoder.write_u32(state.elapsed_sec);
  encoder.write_u8(state.num_players());

  for player in state.players.iter().take(MAX_PLAYERS) {
    encoder.write_u8(player.id);
    encoder.write_bool(player.used);
    encoder.write_bool(player.connected);
    encoder.write_bool(player.active);
    encoder.write_bool(player.alive);
    encoder.write_bool(player.paused);
    encoder.write_bytes(&player.name);
    encoder.write_u32(player.score);
    encoder.write_u32(player.survival_ms);
    encoder.write_u8(player.direction.code());
    let body_len = player.body.len().min(u16::MAX as usize);
    encoder.write_u16(body_len as u16);
    for cell in player.body.iter().take(body_len) {
      encoder.write_cell(*cell);
    }
  }

  let fruit_len = state.fruits.len().min(u8::MAX as usize);
  encoder.write_u8(fruit_len as u8);
  for fruit in state.fruits.iter().take(fruit_len) {
    encoder.write_cell(*fruit);
  }

  encoder.finish()
}

#[cfg(test)]
pub fn decode_state(frame: &Frame) -> Result<StateView, ProtocolError> {
  if frame.message_type != TYPE_STATE {
    return Err(ProtocolError::UnexpectedMessage(frame.message_type));
  }
  read_state(&mut Reader::new(&frame.payload)).ok_or(ProtocolError::Malformed("state"))
}

#[cfg(test)]
fn read_state(reader: &mut Reader<'_>) -> Option<StateView> {
  let tick_ms = reader.read_u16()?;
  let game_over = reader.read_bool()?;
  let mode = GameMode::from_code(reader.read_u8()?)?;
  let world = WorldMode::from_code(reader.read_u8()?)?;
  let width = reader.read_u16()?;
  let height = reader.read_u16()?;
  let time_left_sec = reader.read_u16()?;
  let freeze_ms = reader.read_u32()?;
  let elapsed_sec = reader.read_u32()?;
  let _num_players = reader.read_u8()?;

  let mut players = Vec::with_capacity(MAX_PLAYERS);
  for _ in 0..MAX_PLAYERS {
    let id = reader.read_u8()?;
    let used = reader.read_bool()?;
    let connected = reader.read_bool()?;
    let active = reader.read_bool()?;
    let alive = reader.read_bool()?;
    let paused = reader.read_bool()?;
    let name = reader.read_array::<NAME_MAX>()?;
    let score = reader.read_u32()?;
    let survival_ms = reader.read_u32()?;
    let direction = Direction::from_code(reader.read_u8()?)?;
    let body_len = reader.read_u16()? as usize;
    let mut body = Vec::with_capacity(body_len);
    for _ in 0..body_len {
      body.push(reader.read_cell()?);
    }
    players.push(PlayerView {
      id,
      used,
      connected,
      active,
      alive,
      paused,
      name,
      score,
      survival_ms,
      direction,
      body,
    });
  }

  let fruit_len = reader.read_u8()? as usize;
  let mut fruits = Vec::with_capacity(fruit_len);
  for _ in 0..fruit_len {
    fruits.push(reader.read_cell()?);
  }
  if reader.remaining() != 0 {
    return None;
  }

  Some(StateView {
    tick_ms,
    game_over,
    mode,
    world,
    width,
    height,
    time_left_sec,
    freeze_ms,
    elapsed_sec,
    players,
    fruits,
  })
}
