// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Fuzzy answer matching.
//!
//! The ratio is the Ratcliff/Obershelp measure: twice the number of
//! characters covered by recursively found longest common blocks, divided by
//! the combined length of both strings.

use crate::SIMILARITY_THRESHOLD;

pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Similarity of two strings in `[0, 1]`. Two empty strings are identical.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

/// True when the normalized submission equals a normalized candidate or is
/// at least [`SIMILARITY_THRESHOLD`] similar to one.
pub fn is_match(submitted: &str, candidates: &[String]) -> bool {
    let submitted = normalize(submitted);
    if submitted.is_empty() {
        return false;
    }

    candidates.iter().any(|candidate| {
        let candidate = normalize(candidate);
        candidate == submitted || ratio(&submitted, &candidate) >= SIMILARITY_THRESHOLD
    })
}

/// Candidate with the highest ratio against the submission. Ties go to the
/// earliest candidate.
pub fn best_match<'a>(submitted: &str, candidates: &'a [String]) -> Option<(&'a str, f64)> {
    let submitted = normalize(submitted);
    let mut best: Option<(&'a str, f64)> = None;
    for candidate in candidates {
        let score = ratio(&submitted, &normalize(candidate));
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((candidate.as_str(), score)),
        }
    }
    best
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
        let (i, j, size) = longest_block(a, b, a_lo, a_hi, b_lo, b_hi);
        if size == 0 {
            continue;
        }
        matched += size;
        if a_lo < i && b_lo < j {
            pending.push((a_lo, i, b_lo, j));
        }
        if i + size < a_hi && j + size < b_hi {
            pending.push((i + size, a_hi, j + size, b_hi));
        }
    }

    matched
}

/// Longest common block of `a[a_lo..a_hi]` and `b[b_lo..b_hi]` as
/// `(start_in_a, start_in_b, len)`, earliest in `a` then in `b` on ties.
fn longest_block(
    a: &[char],
    b: &[char],
    a_lo: usize,
    a_hi: usize,
    b_lo: usize,
    b_hi: usize,
) -> (usize, usize, usize) {
    let width = b_hi - b_lo;
    let mut best = (a_lo, b_lo, 0);
    let mut previous = vec![0_usize; width + 1];
    let mut current = vec![0_usize; width + 1];

    for i in a_lo..a_hi {
        for offset in 0..width {
            let j = b_lo + offset;
            current[offset + 1] = if a[i] == b[j] {
                previous[offset] + 1
            } else {
                0
            };
            let length = current[offset + 1];
            if length > best.2 {
                best = (i + 1 - length, j + 1 - length, length);
            }
        }
        std::mem::swap(&mut previous, &mut current);
    }

    best
}
