pub const MAX_PLAYER_NAME_LENGTH: usize = 20;

pub fn sanitize_player_name(name: &str, fallback: &str) -> String {
  let cleaned = name
    .split_whitespace()
    .filter(|word| !word.is_empty())
    .collect::<Vec<_>>()
    .join(" ");
  if cleaned.is_empty() {
    return fallback.to_string();
  }
  cleaned.chars().take(MAX_PLAYER_NAME_LENGTH).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn collapses_whitespace_and_truncates() {
    assert_eq!(sanitize_player_name("  neon   rider  ", "Rider"), "neon rider");
    assert_eq!(sanitize_player_name("", "Rider"), "Rider");
    assert_eq!(sanitize_player_name("   ", "Rider"), "Rider");
    let long = "x".repeat(40);
    assert_eq!(sanitize_player_name(&long, "Rider").len(), MAX_PLAYER_NAME_LENGTH);
  }
}
