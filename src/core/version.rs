//! Package version comparison.
//!
//! Versions follow the pacman `[epoch:]pkgver[-pkgrel]` layout and are compared
//! segment by segment: numeric runs numerically, alphabetic runs lexically, with
//! separators only mattering by their length.

use std::cmp::Ordering;

/// Compare two full version strings (`epoch:pkgver-pkgrel`).
///
/// The release is only compared when both sides carry one, so `1.0` equals `1.0-3`.
pub fn vercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let (epoch_a, ver_a, rel_a) = parse_evr(a);
    let (epoch_b, ver_b, rel_b) = parse_evr(b);

    let mut ord = segment_cmp(epoch_a, epoch_b);
    if ord == Ordering::Equal {
        ord = segment_cmp(ver_a, ver_b);
        if ord == Ordering::Equal {
            if let (Some(ra), Some(rb)) = (rel_a, rel_b) {
                ord = segment_cmp(ra, rb);
            }
        }
    }
    ord
}

/// Split a version into epoch, version and optional release.
fn parse_evr(evr: &str) -> (&str, &str, Option<&str>) {
    let digits = evr.bytes().take_while(u8::is_ascii_digit).count();

    let (epoch, rest) = if evr.as_bytes().get(digits) == Some(&b':') {
        let epoch = &evr[..digits];
        (if epoch.is_empty() { "0" } else { epoch }, &evr[digits + 1..])
    } else {
        ("0", evr)
    };

    match rest.rfind('-') {
        Some(idx) => (epoch, &rest[..idx], Some(&rest[idx + 1..])),
        None => (epoch, rest, None),
    }
}

/// Compare a single version component.
fn segment_cmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let one = a.as_bytes();
    let two = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);

    while i < one.len() && j < two.len() {
        let sep_start_i = i;
        let sep_start_j = j;
        while i < one.len() && !one[i].is_ascii_alphanumeric() {
            i += 1;
        }
        while j < two.len() && !two[j].is_ascii_alphanumeric() {
            j += 1;
        }

        if i >= one.len() || j >= two.len() {
            break;
        }

        let sep_one = i - sep_start_i;
        let sep_two = j - sep_start_j;
        if sep_one != sep_two {
            return sep_one.cmp(&sep_two);
        }

        let start_i = i;
        let start_j = j;
        let is_num = one[i].is_ascii_digit();
        if is_num {
            while i < one.len() && one[i].is_ascii_digit() {
                i += 1;
            }
            while j < two.len() && two[j].is_ascii_digit() {
                j += 1;
            }
        } else {
            while i < one.len() && one[i].is_ascii_alphabetic() {
                i += 1;
            }
            while j < two.len() && two[j].is_ascii_alphabetic() {
                j += 1;
            }
        }

        let mut seg_one = &one[start_i..i];
        let mut seg_two = &two[start_j..j];

        // Numeric segments always beat alphabetic ones.
        if seg_two.is_empty() {
            return if is_num {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        if is_num {
            seg_one = trim_leading_zeros(seg_one);
            seg_two = trim_leading_zeros(seg_two);
            match seg_one.len().cmp(&seg_two.len()) {
                Ordering::Equal => {}
                other => return other,
            }
        }

        match seg_one.cmp(seg_two) {
            Ordering::Equal => {}
            other => return other,
        }
    }

    let one_done = i >= one.len();
    let two_done = j >= two.len();
    if one_done && two_done {
        return Ordering::Equal;
    }

    // A trailing alpha segment never beats an empty one.
    let two_alpha = !two_done && two[j].is_ascii_alphabetic();
    let one_alpha = !one_done && one[i].is_ascii_alphabetic();
    if (one_done && !two_alpha) || one_alpha {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

fn trim_leading_zeros(seg: &[u8]) -> &[u8] {
    let zeros = seg.iter().take_while(|&&b| b == b'0').count();
    &seg[zeros..]
}
