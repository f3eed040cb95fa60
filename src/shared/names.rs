use crate::game::constants::NAME_MAX;
use crate::game::types::NameBuf;

/// Copies `name` into a NUL-padded buffer, truncating at `NAME_MAX` bytes.
#[cfg(test)]
pub fn name_buffer(name: &str) -> NameBuf {
  let mut buffer = [0u8; NAME_MAX];
  let bytes = name.as_bytes();
  let len = bytes.len().min(NAME_MAX);
  buffer[..len].copy_from_slice(&bytes[..len]);
  buffer
}

/// Readable form of a name buffer, stopping at the first NUL.
pub fn display_name(buffer: &NameBuf) -> String {
  let end = buffer.iter().position(|byte| *byte == 0).unwrap_or(NAME_MAX);
  String::from_utf8_lossy(&buffer[..end]).into_owned()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn long_names_are_truncated_to_buffer() {
    let long = "a".repeat(NAME_MAX + 8);
    let buffer = name_buffer(&long);
    assert_eq!(display_name(&buffer).len(), NAME_MAX);
  }

  #[test]
  fn display_stops_at_padding() {
    let buffer = name_buffer("viper");
    assert_eq!(display_name(&buffer), "viper");
    assert_eq!(display_name(&[0u8; NAME_MAX]), "");
  }

  #[test]
  fn names_compare_case_sensitively() {
    assert_ne!(name_buffer("Viper"), name_buffer("viper"));
  }
}
