use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_millis() -> i64 {
  let now = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default();
  now.as_millis() as i64
}
