use std::sync::LazyLock;

use regex::Regex;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)([hm])$").unwrap());

/// Sums a runtime string of `<N>h` / `<N>m` tokens into minutes.
///
/// Tokens may come in either order and either may be absent; anything
/// else in the string is ignored. `""` yields 0.
pub fn duration_minutes(time_str: &str) -> i32 {
    let mut total = 0;
    for part in time_str.split_whitespace() {
        let Some(cap) = TOKEN.captures(part) else {
            continue;
        };
        let n: i32 = cap[1].parse().unwrap_or(0);
        total += if &cap[2] == "h" { n * 60 } else { n };
    }
    total
}

#[cfg(test)]
mod tests {
    use super::duration_minutes;

    #[test]
    fn hours_and_minutes() {
        assert_eq!(duration_minutes("2h 5m"), 125);
    }

    #[test]
    fn minutes_only() {
        assert_eq!(duration_minutes("45m"), 45);
    }

    #[test]
    fn hours_only() {
        assert_eq!(duration_minutes("3h"), 180);
    }

    #[test]
    fn empty() {
        assert_eq!(duration_minutes(""), 0);
    }

    #[test]
    fn order_does_not_matter() {
        assert_eq!(duration_minutes("5m 2h"), 125);
    }

    #[test]
    fn unrecognized_tokens_ignored() {
        assert_eq!(duration_minutes("2h 5m PG-13"), 125);
        assert_eq!(duration_minutes("n/a"), 0);
        assert_eq!(duration_minutes("2h30m"), 0);
    }
}
