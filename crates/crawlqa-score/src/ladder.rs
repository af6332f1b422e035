//! Step functions mapping raw counts to 0-100 sub-scores.

/// `count` as a percentage of `total`. Counts over an empty total are
/// treated as unbounded.
fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        f64::INFINITY
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// Walks `(upper bound, score)` steps for a non-zero count; past the last
/// step the score is 0.
fn step(percent: f64, steps: &[(f64, f64)]) -> f64 {
    steps
        .iter()
        .find(|(bound, _)| percent <= *bound)
        .map_or(0.0, |(_, score)| *score)
}

pub fn adherence(validation_errors: u64, items: u64) -> f64 {
    if validation_errors == 0 {
        return 100.0;
    }
    step(
        percentage(validation_errors, items),
        &[(2.0, 75.0), (4.0, 50.0), (8.0, 25.0)],
    )
}

/// Shared by duplicated items and duplicated unique values.
pub fn duplicates(duplicated: u64, items: u64) -> f64 {
    if duplicated == 0 {
        return 100.0;
    }
    step(
        percentage(duplicated, items),
        &[(5.0, 75.0), (10.0, 50.0), (20.0, 25.0)],
    )
}

pub fn price(price_errors: u64, items: u64) -> f64 {
    if price_errors == 0 {
        return 100.0;
    }
    step(percentage(price_errors, items), &[(5.0, 50.0)])
}

/// A proxy user in the logs makes a crawl less stable.
pub fn crawlera(crawlera_user: Option<&str>) -> f64 {
    if crawlera_user.is_some_and(|user| !user.is_empty()) {
        0.0
    } else {
        100.0
    }
}

pub fn errors(errors_count: u64) -> f64 {
    match errors_count {
        0 => 100.0,
        1..=5 => 50.0,
        6..=10 => 20.0,
        _ => 0.0,
    }
}

pub fn outcome(state: &str, close_reason: Option<&str>) -> f64 {
    let finished = |value: &str| value.eq_ignore_ascii_case("finished");
    if finished(state) && close_reason.is_some_and(finished) {
        100.0
    } else {
        0.0
    }
}

/// Redirects, not-found and unavailable responses against successful ones.
pub fn response_status(ok: u64, moved: u64, not_found: u64, unavailable: u64) -> f64 {
    let anomalies = moved + not_found + unavailable;
    if anomalies == 0 {
        return 100.0;
    }
    step(
        percentage(anomalies, ok),
        &[(1.0, 100.0), (5.0, 50.0), (10.0, 20.0)],
    )
}

pub fn tested(tested: bool) -> f64 {
    if tested { 100.0 } else { 0.0 }
}
