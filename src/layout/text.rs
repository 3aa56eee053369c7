use crate::text_metrics::TextMeasure;

pub(super) const ELLIPSIS: char = '\u{2026}';

/// Collapses newlines and runs of whitespace into single spaces.
pub(super) fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Wraps `text` into at most `max_lines` lines no wider than `max_width`.
///
/// Words wider than a whole line are broken between characters. Text that
/// needs more lines is folded into the last line and cut with an ellipsis.
pub(super) fn wrap_label<M: TextMeasure + ?Sized>(
    text: &str,
    max_width: f32,
    font_size: f32,
    measure: &M,
    max_lines: usize,
) -> Vec<String> {
    let text = single_line(text);
    let max_lines = max_lines.max(1);
    if text.is_empty() {
        return vec![String::new()];
    }
    if measure.text_width(&text, font_size) <= max_width {
        return vec![text];
    }

    let lines = wrap_words(&text, max_width, font_size, measure);
    if lines.len() <= max_lines {
        return lines
            .into_iter()
            .map(|line| truncate_with_ellipsis(&line, max_width, font_size, measure))
            .collect();
    }

    let mut kept: Vec<String> = lines[..max_lines - 1]
        .iter()
        .map(|line| truncate_with_ellipsis(line, max_width, font_size, measure))
        .collect();
    let rest = lines[max_lines - 1..].join(" ");
    kept.push(force_ellipsis(&rest, max_width, font_size, measure));
    kept
}

fn wrap_words<M: TextMeasure + ?Sized>(
    text: &str,
    max_width: f32,
    font_size: f32,
    measure: &M,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        for piece in split_long_word(word, max_width, font_size, measure) {
            let candidate = if current.is_empty() {
                piece.clone()
            } else {
                format!("{current} {piece}")
            };
            if !current.is_empty() && measure.text_width(&candidate, font_size) > max_width {
                lines.push(std::mem::take(&mut current));
                current = piece;
            } else {
                current = candidate;
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn split_long_word<M: TextMeasure + ?Sized>(
    word: &str,
    max_width: f32,
    font_size: f32,
    measure: &M,
) -> Vec<String> {
    if measure.text_width(word, font_size) <= max_width {
        return vec![word.to_string()];
    }
    let mut pieces = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        current.push(ch);
        if current.chars().count() > 1 && measure.text_width(&current, font_size) > max_width {
            current.pop();
            pieces.push(std::mem::take(&mut current));
            current.push(ch);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Shortens `text` with a trailing ellipsis until it fits `max_width`.
pub(super) fn truncate_with_ellipsis<M: TextMeasure + ?Sized>(
    text: &str,
    max_width: f32,
    font_size: f32,
    measure: &M,
) -> String {
    if measure.text_width(text, font_size) <= max_width {
        return text.to_string();
    }
    force_ellipsis(text, max_width, font_size, measure)
}

fn force_ellipsis<M: TextMeasure + ?Sized>(
    text: &str,
    max_width: f32,
    font_size: f32,
    measure: &M,
) -> String {
    // Take the longest prefix whose summed glyph widths leave room for the
    // ellipsis, then settle on the exact measurement.
    let mut buf = [0u8; 4];
    let budget = max_width - measure.text_width(ELLIPSIS.encode_utf8(&mut buf), font_size);
    let mut used = 0.0;
    let mut end = 0;
    for (idx, ch) in text.char_indices() {
        used += measure.text_width(ch.encode_utf8(&mut buf), font_size);
        if used > budget {
            break;
        }
        end = idx + ch.len_utf8();
    }

    let mut chars: Vec<char> = text[..end].chars().collect();
    loop {
        let mut candidate: String = chars.iter().collect::<String>().trim_end().to_string();
        candidate.push(ELLIPSIS);
        if chars.is_empty() || measure.text_width(&candidate, font_size) <= max_width {
            return candidate;
        }
        chars.pop();
    }
}
