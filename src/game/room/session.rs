use std::sync::Mutex as StdMutex;
use std::sync::{Arc, PoisonError};
use tokio::sync::{mpsc, Notify};

/// Single-slot mailbox for STATE frames. Storing never blocks and replaces
/// whatever the writer has not sent yet, so a slow peer only ever falls
/// behind by dropping intermediate snapshots.
#[derive(Debug)]
pub struct LatestFrame {
  frame: StdMutex<Option<Vec<u8>>>,
  notify: Notify,
}

impl LatestFrame {
  pub(crate) fn new() -> Self {
    Self {
      frame: StdMutex::new(None),
      notify: Notify::new(),
    }
  }

  pub(crate) fn store(&self, payload: Vec<u8>) {
    *self.frame.lock().unwrap_or_else(PoisonError::into_inner) = Some(payload);
    self.notify.notify_one();
  }

  pub(crate) fn take_latest(&self) -> Option<Vec<u8>> {
    self.frame
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take()
  }

  pub(crate) async fn wait_for_update(&self) {
    self.notify.notified().await;
  }
}

#[derive(Debug)]
pub enum OutboundControl {
  Frame(Vec<u8>),
  Close,
}

/// Everything the room may push at one connection.
#[derive(Debug)]
pub struct SessionOutbound {
  pub(crate) state: LatestFrame,
  control_tx: mpsc::UnboundedSender<OutboundControl>,
}

impl SessionOutbound {
  pub(crate) fn push_state(&self, payload: Vec<u8>) {
    self.state.store(payload);
  }

  pub(crate) fn push_control(&self, payload: Vec<u8>) -> bool {
    self.control_tx.send(OutboundControl::Frame(payload)).is_ok()
  }

  pub(crate) fn close(&self) {
    let _ = self.control_tx.send(OutboundControl::Close);
  }
}

pub struct SessionIo {
  pub outbound: Arc<SessionOutbound>,
  pub control_rx: mpsc::UnboundedReceiver<OutboundControl>,
}

impl SessionIo {
  pub fn new() -> Self {
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    Self {
      outbound: Arc::new(SessionOutbound {
        state: LatestFrame::new(),
        control_tx,
      }),
      control_rx,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn latest_frame_keeps_only_newest_payload() {
    let frame = LatestFrame::new();
    frame.store(vec![1]);
    frame.store(vec![2]);
    assert_eq!(frame.take_latest(), Some(vec![2]));
    assert_eq!(frame.take_latest(), None);
  }

  #[tokio::test]
  async fn store_before_wait_still_wakes_writer() {
    let frame = LatestFrame::new();
    frame.store(vec![7]);
    tokio::time::timeout(std::time::Duration::from_millis(100), frame.wait_for_update())
      .await
      .expect("stored permit should wake the waiter");
    assert_eq!(frame.take_latest(), Some(vec![7]));
  }

  #[tokio::test]
  async fn control_frames_arrive_in_order_then_close() {
    let mut io = SessionIo::new();
    assert!(io.outbound.push_control(vec![1]));
    assert!(io.outbound.push_control(vec![2]));
    io.outbound.close();

    assert!(matches!(io.control_rx.recv().await, Some(OutboundControl::Frame(p)) if p == vec![1]));
    assert!(matches!(io.control_rx.recv().await, Some(OutboundControl::Frame(p)) if p == vec![2]));
    assert!(matches!(io.control_rx.recv().await, Some(OutboundControl::Close)));
  }
}
