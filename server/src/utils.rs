use regex::Regex;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Current wall clock in milliseconds, wrapping like the protocol timestamp
pub fn get_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u32
}

fn player_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            // Three visible characters, then up to seventeen more including spaces
            let allowed = r"0-9a-zA-Z\^\.\$\|\(\)\[\]\*\+\?_\-#,@!=~'";
            Regex::new(&format!(r"^[{allowed}]{{3}}[{allowed}\s]{{0,17}}$")).ok()
        })
        .as_ref()
}

// Player names are 3 to 20 characters and cannot start with whitespace
pub fn is_valid_player_name(name: &str) -> bool {
    player_name_pattern().is_some_and(|pattern| pattern.is_match(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(is_valid_player_name("Bob"));
        assert!(is_valid_player_name("Player (2)"));
        assert!(is_valid_player_name("x_X-[pro]-X_x"));
        assert!(is_valid_player_name(&format!("abc{}", " ".repeat(17))));
    }

    #[test]
    fn test_invalid_names() {
        assert!(!is_valid_player_name(""));
        assert!(!is_valid_player_name("ab"));
        assert!(!is_valid_player_name(" ab"));
        assert!(!is_valid_player_name("name with ümlaut"));
        assert!(!is_valid_player_name("abcdefghijklmnopqrstu"));
        assert!(!is_valid_player_name("semi;colon"));
    }

    #[test]
    fn test_timestamp_advances() {
        let first = get_timestamp();
        std::thread::sleep(Duration::from_millis(5));
        assert!(get_timestamp().wrapping_sub(first) >= 5);
    }
}
