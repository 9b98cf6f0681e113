// SPDX-License-Identifier: AGPL-3.0-only

//! Anchored pattern fragments for numeric output.
//!
//! Benchmark tables put several numbers on one line, and an unanchored
//! `256` happily matches inside `2560`. These builders anchor every
//! numeric token on whitespace or line boundaries. They only produce
//! pattern strings; the extractor never rewrites a pattern it is given.

/// A signed decimal or scientific-notation number.
pub const FLOAT: &str = r"[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?";

/// `label` at the start of a line, an optional `:` or `=`, blanks, then a
/// number captured as `group`, followed by whitespace or end of line. The
/// label and the number must be on the same line.
///
/// `labelled_value("Triad", "triad")` matches `Triad:   14000.0  0.01`.
#[must_use]
pub fn labelled_value(label: &str, group: &str) -> String {
    format!(
        r"(?m)^[ \t]*{}[ \t]*[:=]?[ \t]+(?P<{group}>{FLOAT})(?:\s|$)",
        regex::escape(label)
    )
}

/// Blank-separated column `column` (0-based; column 0 is the key itself)
/// of a table row whose first column is exactly `key`, captured as `group`.
///
/// `keyed_column("256", 1, "bw")` matches `256   2560.5   1.2` but not a
/// row keyed `2560`.
#[must_use]
pub fn keyed_column(key: &str, column: usize, group: &str) -> String {
    let key = regex::escape(key);
    match column {
        0 => format!(r"(?m)^[ \t]*(?P<{group}>{key})(?:[ \t]|$)"),
        n => {
            let skip = n - 1;
            format!(
                r"(?m)^[ \t]*{key}[ \t]+(?:\S+[ \t]+){{{skip}}}(?P<{group}>{FLOAT})(?:\s|$)"
            )
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::extract::{extract_all, extract_single};
    use regex::Regex;

    const OSU: &str = "\
# OSU MPI Bandwidth Test v7.2
# Size      Bandwidth (MB/s)
128            1280.11
256            2560.44
2560          25600.99
";

    #[test]
    fn float_matches_common_forms() {
        let re = Regex::new(&format!("^{FLOAT}$")).unwrap();
        for s in ["1", "1.5", "-2.", ".5", "+3e10", "6.02E-23"] {
            assert!(re.is_match(s), "{s}");
        }
        assert!(!re.is_match("abc"));
    }

    #[test]
    fn keyed_column_does_not_match_longer_key() {
        let re = Regex::new(&keyed_column("256", 1, "bw")).unwrap();
        let v: f64 = extract_single(&re, OSU, &"bw".into()).unwrap();
        assert_eq!(v, 2560.44);
        assert_eq!(extract_all::<f64>(&re, OSU, &"bw".into()).unwrap().count(), 1);
    }

    #[test]
    fn keyed_column_skips_columns() {
        let text = "8  1.0  2.0  3.0\n";
        let re = Regex::new(&keyed_column("8", 3, "c")).unwrap();
        let v: f64 = extract_single(&re, text, &"c".into()).unwrap();
        assert_eq!(v, 3.0);
    }

    #[test]
    fn keyed_column_zero_is_the_key() {
        let text = "256  1024.5  7\n";
        let re = Regex::new(&keyed_column("256", 0, "c")).unwrap();
        let key: u32 = extract_single(&re, text, &"c".into()).unwrap();
        assert_eq!(key, 256);
        let re = Regex::new(&keyed_column("256", 1, "c")).unwrap();
        let v: f64 = extract_single(&re, text, &"c".into()).unwrap();
        assert_eq!(v, 1024.5);
        let re = Regex::new(&keyed_column("256", 2, "c")).unwrap();
        let v: f64 = extract_single(&re, text, &"c".into()).unwrap();
        assert_eq!(v, 7.0);
    }

    #[test]
    fn helpers_stay_on_one_line() {
        let re = Regex::new(&labelled_value("Triad", "t")).unwrap();
        assert!(!re.is_match("Triad:\n12.5\n"));
        assert!(!re.is_match("\nTriad\n  12.5\n"));
        let re = Regex::new(&keyed_column("256", 1, "bw")).unwrap();
        assert!(!re.is_match("256\n1024.5\n"));
        let re = Regex::new(&keyed_column("8", 2, "c")).unwrap();
        assert!(!re.is_match("8 1.0\n2.0\n"));
    }

    #[test]
    fn labelled_value_accepts_separators() {
        for (text, want) in [
            ("Triad:    14000.0  0.1\n", 14000.0),
            ("Triad = 12.5\n", 12.5),
            ("  Triad 7\n", 7.0),
        ] {
            let re = Regex::new(&labelled_value("Triad", "t")).unwrap();
            let v: f64 = extract_single(&re, text, &"t".into()).unwrap();
            assert_eq!(v, want, "{text}");
        }
    }

    #[test]
    fn labelled_value_rejects_glued_units() {
        let re = Regex::new(&labelled_value("Time", "t")).unwrap();
        assert!(!re.is_match("Time: 12.5s\n"));
        assert!(re.is_match("Time: 12.5 s\n"));
    }
}
