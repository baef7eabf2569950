/// Estimates the syllable count of a line of text.
///
/// Heuristic: strip everything but ASCII letters, lowercase, and count
/// maximal runs of vowels (y included). A line with no vowel runs still
/// counts as one syllable, so the result is never zero.
pub fn count_syllables(text: &str) -> u32 {
    let mut runs = 0u32;
    let mut in_run = false;
    for c in text.chars().filter(char::is_ascii_alphabetic) {
        let vowel = matches!(
            c.to_ascii_lowercase(),
            'a' | 'e' | 'i' | 'o' | 'u' | 'y'
        );
        if vowel && !in_run {
            runs += 1;
        }
        in_run = vowel;
    }
    runs.max(1)
}
