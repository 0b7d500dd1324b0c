use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;

use crate::pipeline::batch::ProcessedEntry;

pub fn sort_entries(entries: &mut [ProcessedEntry], descending: bool) {
    entries.sort_by(|a, b| compare_filenames(&a.filename, &b.filename));
    if descending {
        entries.reverse();
    }
}

pub fn compare_filenames(a: &str, b: &str) -> Ordering {
    let left = natural_key(a);
    let right = natural_key(b);

    for (x, y) in left.iter().zip(right.iter()) {
        match compare_segments(x, y) {
            Ordering::Equal => continue,
            unequal => return unequal,
        }
    }

    left.len().cmp(&right.len())
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Segment {
    Text(String),
    Digits(String),
}

impl Segment {
    fn raw(&self) -> &str {
        match self {
            Self::Text(run) | Self::Digits(run) => run,
        }
    }
}

fn natural_key(name: &str) -> Vec<Segment> {
    static RUNS: OnceLock<Regex> = OnceLock::new();
    let runs = RUNS.get_or_init(|| Regex::new(r"[0-9]+|[^0-9]+").expect("static run regex"));

    runs.find_iter(name)
        .map(|run| {
            let run = run.as_str().to_string();
            if run.bytes().all(|b| b.is_ascii_digit()) {
                Segment::Digits(run)
            } else {
                Segment::Text(run)
            }
        })
        .collect()
}

fn compare_segments(a: &Segment, b: &Segment) -> Ordering {
    match (a, b) {
        (Segment::Digits(x), Segment::Digits(y)) => compare_digit_runs(x, y),
        (Segment::Text(x), Segment::Text(y)) => x.cmp(y),
        // Mixed kinds at the same position compare as raw strings.
        _ => a.raw().cmp(b.raw()),
    }
}

// Magnitude comparison without parsing, so arbitrarily long digit runs cannot
// overflow: strip leading zeros, compare lengths, then compare digits. The raw
// run is the final tiebreak ("07" vs "7") to keep the order total.
fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let stripped_a = a.trim_start_matches('0');
    let stripped_b = b.trim_start_matches('0');

    stripped_a
        .len()
        .cmp(&stripped_b.len())
        .then_with(|| stripped_a.cmp(stripped_b))
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use image::RgbImage;

    use super::*;

    fn entry(filename: &str) -> ProcessedEntry {
        ProcessedEntry {
            filename: filename.to_string(),
            jpeg_bytes: Vec::new(),
            page: RgbImage::new(1, 1),
        }
    }

    fn sorted_names(names: &[&str], descending: bool) -> Vec<String> {
        let mut entries: Vec<ProcessedEntry> = names.iter().map(|n| entry(n)).collect();
        sort_entries(&mut entries, descending);
        entries.into_iter().map(|e| e.filename).collect()
    }

    #[test]
    fn digit_runs_compare_by_magnitude() {
        assert_eq!(
            sorted_names(&["p9.jpg", "p10.jpg", "p2.jpg"], false),
            vec!["p2.jpg", "p9.jpg", "p10.jpg"]
        );
    }

    #[test]
    fn descending_is_the_exact_reverse_of_ascending() {
        let names = ["scan_2.jpg", "scan_10.jpg", "12.jpg", "scan_1.jpg", "9.jpg"];

        let ascending = sorted_names(&names, false);
        let mut descending = sorted_names(&names, true);
        descending.reverse();

        assert_eq!(ascending, descending);
    }

    #[test]
    fn plain_numeric_names_sort_numerically() {
        assert_eq!(
            sorted_names(&["100.jpg", "20.jpg", "3.jpg"], false),
            vec!["3.jpg", "20.jpg", "100.jpg"]
        );
    }

    #[test]
    fn mixed_kind_positions_fall_back_to_string_compare() {
        // "12.jpg" opens with a digit run, "scan_L.jpg" with a text run.
        assert_eq!(
            sorted_names(&["scan_L.jpg", "12.jpg"], false),
            vec!["12.jpg", "scan_L.jpg"]
        );
    }

    #[test]
    fn shared_prefix_defers_to_later_segments() {
        assert_eq!(
            sorted_names(&["scan_2_R.jpg", "scan_2_L.jpg", "scan_10_L.jpg"], false),
            vec!["scan_2_L.jpg", "scan_2_R.jpg", "scan_10_L.jpg"]
        );
    }

    #[test]
    fn leading_zeros_do_not_change_magnitude() {
        assert_eq!(compare_filenames("007.jpg", "8.jpg"), Ordering::Less);
        assert_eq!(compare_filenames("007.jpg", "7.jpg"), Ordering::Less);
        assert_eq!(compare_filenames("7.jpg", "7.jpg"), Ordering::Equal);
    }

    #[test]
    fn long_digit_runs_do_not_overflow() {
        let huge_a = "99999999999999999999999999999999999999.jpg";
        let huge_b = "100000000000000000000000000000000000000.jpg";

        assert_eq!(compare_filenames(huge_a, huge_b), Ordering::Less);
    }

    #[test]
    fn prefix_of_a_longer_name_sorts_first() {
        assert_eq!(compare_filenames("scan", "scan_1"), Ordering::Less);
    }
}
