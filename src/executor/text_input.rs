// CJK-aware text input: CJK goes through the clipboard when the backend can
// paste, everything else is typed key by key.

/// Returns true if the text contains CJK (Chinese/Japanese/Korean) characters.
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| {
        ('\u{4e00}'..='\u{9fff}').contains(&c)
            || ('\u{3040}'..='\u{309f}').contains(&c)
            || ('\u{30a0}'..='\u{30ff}').contains(&c)
            || ('\u{ac00}'..='\u{d7af}').contains(&c)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cjk_scripts() {
        assert!(contains_cjk("打开设置"));
        assert!(contains_cjk("カタカナ"));
        assert!(contains_cjk("안녕"));
        assert!(!contains_cjk("hello, world"));
    }
}
