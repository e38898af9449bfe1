// Verdict engine for counterfeit
// Decides whether a response to a forged token still looks authenticated

use crate::models::BaselineResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Authenticated,
    Rejected,
    Uncertain,
}

/// Body fragments that betray a rejected token behind a 200
const SOFT_FAIL_MARKERS: &[&str] = &[
    "unauthorized",
    "unauthenticated",
    "invalid token",
    "invalid signature",
    "signature verification failed",
    "jwt expired",
    "token expired",
    "jwt malformed",
    "access denied",
    "not allowed",
    "login required",
];

/// Decide verdict from HTTP status, body and the baseline response.
///
/// A forged token is considered accepted when:
/// 1. 401/403 = REJECTED
/// 2. 400 = REJECTED (token failed to parse)
/// 3. 2xx with a soft-fail message in the body = REJECTED
/// 4. 2xx matching the baseline status and body shape = AUTHENTICATED
/// 5. 2xx without a baseline = AUTHENTICATED
/// 6. anything else = UNCERTAIN
pub fn decide_verdict(status: u16, body: &str, baseline: Option<&BaselineResponse>) -> Verdict {
    match status {
        401 | 403 => Verdict::Rejected,

        400 => Verdict::Rejected,

        200..=299 => {
            if analyze_response_soft_fails(body).is_some() {
                return Verdict::Rejected;
            }
            match baseline {
                Some(base) => compare_with_baseline(status, body, base),
                None => Verdict::Authenticated,
            }
        }

        _ => Verdict::Uncertain,
    }
}

/// Soft-fail heuristics: error text in an otherwise successful response.
pub fn analyze_response_soft_fails(body: &str) -> Option<String> {
    let lower = body.to_ascii_lowercase();
    SOFT_FAIL_MARKERS
        .iter()
        .find(|marker| lower.contains(*marker))
        .map(|marker| format!("Soft fail detected: \"{}\" present", marker))
}

fn compare_with_baseline(status: u16, body: &str, baseline: &BaselineResponse) -> Verdict {
    if baseline.status != status {
        return Verdict::Uncertain;
    }
    if body == baseline.body || similar_length(body.len(), baseline.body.len()) {
        Verdict::Authenticated
    } else {
        Verdict::Uncertain
    }
}

// within 10% of the baseline length; dynamic fields (timestamps, nonces)
// change content but rarely size
fn similar_length(a: usize, b: usize) -> bool {
    let (small, large) = if a < b { (a, b) } else { (b, a) };
    if large == 0 {
        return true;
    }
    (large - small) * 10 <= large
}
