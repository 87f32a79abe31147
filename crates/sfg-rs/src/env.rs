use std::env;
use std::sync::OnceLock;

static SFG_OPT_MAX_ROUNDS: OnceLock<usize> = OnceLock::new();
static SFG_PASS_STATS: OnceLock<bool> = OnceLock::new();

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

fn parse_usize(value: &str) -> Option<usize> {
    value.trim().parse::<usize>().ok()
}

pub(crate) fn opt_max_rounds() -> usize {
    *SFG_OPT_MAX_ROUNDS.get_or_init(|| {
        env::var("SFG_OPT_MAX_ROUNDS")
            .ok()
            .and_then(|v| parse_usize(&v))
            .unwrap_or(4)
    })
}

pub(crate) fn pass_stats_enabled() -> bool {
    *SFG_PASS_STATS.get_or_init(|| match env::var("SFG_PASS_STATS") {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value),
        _ => false,
    })
}
