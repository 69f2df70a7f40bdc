//! Caption text helpers
//!
//! On-screen pacing is word based and independent of narration length; the
//! chunks are shown for a fixed time each.

/// Default number of words shown per caption card.
pub const DEFAULT_WORDS_PER_CHUNK: usize = 10;

/// Split `text` into consecutive groups of at most `max_words` whitespace-separated words.
///
/// Word order is preserved and only the last group may be shorter. A `max_words`
/// of zero is treated as one.
pub fn chunk(text: &str, max_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(max_words.max(1))
        .map(|group| group.join(" "))
        .collect()
}

/// Drop every line that carries a hashtag marker.
pub fn strip_hashtag_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !line.contains('#'))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Text to show on screen: the script without hashtag lines, or the raw script
/// if nothing else is left.
pub fn on_screen_script(script: &str) -> String {
    let spoken = strip_hashtag_lines(script);
    if spoken.is_empty() {
        script.trim().to_string()
    } else {
        spoken
    }
}

/// Greedy word wrap to `width` characters; words longer than `width` are broken.
///
/// Returns an empty vector for blank input.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word = word;
        loop {
            let word_len = word.chars().count();
            let needed = if current.is_empty() {
                word_len
            } else {
                current_len + 1 + word_len
            };

            if needed <= width {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
                current_len = needed;
                break;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
                continue;
            }

            let split_at = word
                .char_indices()
                .nth(width)
                .map(|(idx, _)| idx)
                .unwrap_or(word.len());
            lines.push(word[..split_at].to_string());
            word = &word[split_at..];
            if word.is_empty() {
                break;
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines
}
