//! Predicates that decide whether two extracted values refer to the same thing.

use crate::extract::netloc_of;
use std::fmt;

/// True when both URLs have a non-empty network location and the two are
/// byte-equal. No case folding, no default-port handling.
pub fn same_netloc(a: &str, b: &str) -> bool {
    let left = netloc_of(a);
    !left.is_empty() && left == netloc_of(b)
}

/// Similarity of two strings on a 0-100 scale.
///
/// Computed as `2 * LCS / (len(a) + len(b))` over Unicode scalar values,
/// rounded half to even. Two empty strings score 100.
pub fn similarity_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100;
    }
    let scaled = 200 * longest_common_subsequence(&a, &b);
    let (quotient, remainder) = (scaled / total, scaled % total);
    let rounded = match (2 * remainder).cmp(&total) {
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal if quotient % 2 == 1 => quotient + 1,
        _ => quotient,
    };
    // LCS never exceeds the shorter input, so the ratio stays within 0..=100.
    u8::try_from(rounded).unwrap_or(100)
}

/// Whether `a` and `b` score at least `threshold`.
pub fn is_similar(a: &str, b: &str, threshold: u8) -> bool {
    similarity_ratio(a, b) >= threshold
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let (outer, inner) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut prev = vec![0usize; inner.len() + 1];
    let mut row = vec![0usize; inner.len() + 1];
    for x in outer {
        for (j, y) in inner.iter().enumerate() {
            row[j + 1] = if x == y {
                prev[j] + 1
            } else {
                row[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[inner.len()]
}

/// An endpoint identity synthesized from address, port and subnet.
///
/// Two endpoints are the same physical endpoint iff their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkKey(String);

impl NetworkKey {
    pub fn new(ip: &str, port: impl fmt::Display, subnet: &str) -> Self {
        Self(format!("{ip}{port}{subnet}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// True when each of the two source keys equals one of the two destination
/// keys, in either order.
pub fn pair_matches(sources: &[NetworkKey; 2], destinations: &[NetworkKey; 2]) -> bool {
    sources.iter().all(|s| destinations.contains(s))
}
