//! Case-insensitive string similarity in `[0, 1]`.

/// `2 * M / T`, where `M` is the longest common subsequence length and `T` the
/// combined length of both strings. Two empty strings are identical.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.trim().to_lowercase().chars().collect();
    let b: Vec<char> = b.trim().to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * lcs_len(&a, &b) as f64 / total as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            row[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                row[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(ratio("Submit", "submit"), 1.0);
        assert_eq!(ratio("", ""), 1.0);
    }

    #[test]
    fn typos_stay_close() {
        assert!(ratio("sumbit", "submit") > 0.8);
        assert!(ratio("settings", "setings") > 0.9);
    }

    #[test]
    fn unrelated_words_score_low() {
        assert!(ratio("submit", "cancel") < 0.4);
        assert_eq!(ratio("abc", ""), 0.0);
    }
}
