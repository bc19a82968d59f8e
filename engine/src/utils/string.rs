//! String utility functions

/// Similarity between two strings in `[0, 1]`.
///
/// Ratcliff/Obershelp ratio: twice the number of matching characters divided
/// by the total length, where matches are found by repeatedly taking the
/// longest common substring and recursing on both sides of it.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let (a_start, b_start, len) = longest_common_substring(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_characters(&a[..a_start], &b[..b_start])
        + matching_characters(&a[a_start + len..], &b[b_start + len..])
}

/// `(start in a, start in b, length)` of the leftmost longest common substring.
fn longest_common_substring(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // lengths[j + 1] = length of the common suffix ending at a[i], b[j]
    let mut lengths = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut next = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let len = lengths[j] + 1;
                next[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        lengths = next;
    }
    best
}

/// Closest choice to `source` and its similarity ratio.
pub fn best_match<'a, I>(source: &str, choices: I) -> Option<(&'a str, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    choices
        .into_iter()
        .map(|choice| (choice, similarity_ratio(source, choice)))
        .fold(None, |best, candidate| match best {
            Some((_, score)) if score >= candidate.1 => best,
            _ => Some(candidate),
        })
}

/// Join choices as an English disjunction: `a`, `a or b`, `a, b, or c`.
pub fn disjunction<S: AsRef<str>>(choices: &[S]) -> String {
    match choices {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [first, second] => format!("{} or {}", first.as_ref(), second.as_ref()),
        [init @ .., last] => {
            let head: Vec<&str> = init.iter().map(AsRef::as_ref).collect();
            format!("{}, or {}", head.join(", "), last.as_ref())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_identical_and_disjoint() {
        assert_eq!(similarity_ratio("score", "score"), 1.0);
        assert_eq!(similarity_ratio("abc", "xyz"), 0.0);
        assert_eq!(similarity_ratio("", ""), 1.0);
    }

    #[test]
    fn test_similarity_typo() {
        // "Hallucinat" + "on" match: 2 * 12 / 25
        let ratio = similarity_ratio("Hallucinaton", "Hallucination");
        assert!((ratio - 0.96).abs() < 1e-9, "got {ratio}");
    }

    #[test]
    fn test_similarity_known_ratio() {
        // "abcd" vs "bcde": "bcd" matches, 2 * 3 / 8
        assert_eq!(similarity_ratio("abcd", "bcde"), 0.75);
    }

    #[test]
    fn test_best_match() {
        let choices = ["label", "score", "explanation"];
        let (choice, ratio) = best_match("scor", choices).unwrap();
        assert_eq!(choice, "score");
        assert!(ratio > 0.75);
        assert!(best_match("x", []).is_none());
    }

    #[test]
    fn test_disjunction() {
        assert_eq!(disjunction::<&str>(&[]), "");
        assert_eq!(disjunction(&["a"]), "a");
        assert_eq!(disjunction(&["a", "b"]), "a or b");
        assert_eq!(disjunction(&["a", "b", "c"]), "a, b, or c");
    }
}
