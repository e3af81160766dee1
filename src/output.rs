use std::sync::OnceLock;

static QUIET: OnceLock<bool> = OnceLock::new();

/// `RAGASSIST_QUIET=1` suppresses banners and per-document lines
pub fn is_quiet() -> bool {
    *QUIET.get_or_init(|| {
        std::env::var("RAGASSIST_QUIET")
            .map(|v| parse_flag(&v))
            .unwrap_or(false)
    })
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
    }
}
