// Greedy font-fit and line-wrap search.
//
// Given a translated string and a destination rectangle, find the largest
// font size (within min/max) whose wrapped text fits both dimensions, and
// the wrap with the fewest lines at that size. Height overflow is resolved
// only by shrinking — wrapping adds lines and can only make height worse.
// Width overflow first tries progressively narrower column counts
// (hyphenating words longer than the column budget) and falls back to
// shrinking when no wrap fits. Below the minimum size the search clamps and
// picks the wrap minimizing squared deviation from the rectangle: a best
// effort, not a guarantee of fit.
//
// Measurement goes through the TextMeasurer seam and is repeated after
// every size or wrap change; metrics are never reused across changes.

/// Text metrics provider for the exact font, size and spacing in use.
pub trait TextMeasurer {
    /// Measured (width, height) of `text` (may contain `\n`) at `font_size`.
    fn measure(&self, text: &str, font_size: f32, line_spacing: f32) -> (f32, f32);
}

/// A chosen layout: the wrapped text and the metrics it was accepted at.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub font_size: f32,
    pub text: String,
    pub width: f32,
    pub height: f32,
}

/// Search bounds for one region
#[derive(Debug, Clone, Copy)]
pub struct FitParams {
    pub min_font_size: f32,
    pub max_font_size: f32,
    /// Fixed sub-integer decrement of the size search
    pub step: f32,
    pub line_spacing: f32,
}

/// Run the fit search. Deterministic for a deterministic measurer.
pub fn fit_text(
    measurer: &dyn TextMeasurer,
    text: &str,
    rect_w: f32,
    rect_h: f32,
    params: &FitParams,
) -> TextLayout {
    let source = text.trim();
    let total_chars = source.chars().count().max(1);

    let mut font_size = params.max_font_size.max(params.min_font_size);
    let mut current = source.to_string();
    let mut columns = total_chars;

    while font_size >= params.min_font_size {
        let (width, height) = measurer.measure(&current, font_size, params.line_spacing);

        if height > rect_h {
            // Only shrinking can fix height; restart from the unwrapped text
            font_size -= params.step;
            current = source.to_string();
            columns = total_chars;
            continue;
        }

        if width > rect_w {
            if columns > 1 {
                columns -= 1;
                current = wrap_words(source, columns);
                continue;
            }
            // No column count fits at this size
            font_size -= params.step;
            current = source.to_string();
            columns = total_chars;
            continue;
        }

        return TextLayout {
            font_size,
            text: current,
            width,
            height,
        };
    }

    fallback_at_minimum(measurer, source, total_chars, rect_w, rect_h, params)
}

/// Clamp to the minimum size and search every column count for the wrap
/// minimizing squared deviation of (width, height) from the rectangle.
fn fallback_at_minimum(
    measurer: &dyn TextMeasurer,
    source: &str,
    total_chars: usize,
    rect_w: f32,
    rect_h: f32,
    params: &FitParams,
) -> TextLayout {
    let mut best: Option<(f32, TextLayout)> = None;

    for columns in 1..=total_chars {
        let wrapped = wrap_words(source, columns);
        let (width, height) = measurer.measure(&wrapped, params.min_font_size, params.line_spacing);
        let deviation = (width - rect_w).powi(2) + (height - rect_h).powi(2);

        let better = match &best {
            Some((best_dev, _)) => deviation < *best_dev,
            None => true,
        };
        if better {
            best = Some((
                deviation,
                TextLayout {
                    font_size: params.min_font_size,
                    text: wrapped,
                    width,
                    height,
                },
            ));
        }
    }

    // total_chars >= 1, so the loop produced at least one candidate
    best.map(|(_, layout)| layout).unwrap_or(TextLayout {
        font_size: params.min_font_size,
        text: source.to_string(),
        width: 0.0,
        height: 0.0,
    })
}

/// Greedy word wrap to at most `max_chars` characters per line, joined with
/// `\n`. A word longer than the budget is broken with hyphens so the column
/// limit holds for every line.
pub fn wrap_words(text: &str, max_chars: usize) -> String {
    let max_chars = max_chars.max(1);

    let mut tokens: Vec<String> = Vec::new();
    for word in text.split_whitespace() {
        if word.chars().count() > max_chars {
            tokens.extend(hyphenate(word, max_chars));
        } else {
            tokens.push(word.to_string());
        }
    }

    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    let mut line_chars = 0usize;

    for token in tokens {
        let token_chars = token.chars().count();
        let hyphen_fragment = token.ends_with('-');

        if line_chars == 0 {
            line = token;
            line_chars = token_chars;
        } else if line_chars + 1 + token_chars <= max_chars {
            line.push(' ');
            line.push_str(&token);
            line_chars += 1 + token_chars;
        } else {
            lines.push(std::mem::take(&mut line));
            line = token;
            line_chars = token_chars;
        }

        // A hyphenated fragment always ends its line so the break stays
        // inside the word it came from
        if hyphen_fragment {
            lines.push(std::mem::take(&mut line));
            line_chars = 0;
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }

    lines.join("\n")
}

/// Break an over-long word into `-`-terminated fragments no longer than
/// `max_chars` each.
fn hyphenate(word: &str, max_chars: usize) -> Vec<String> {
    let chunk = max_chars.saturating_sub(1).max(1);
    let chars: Vec<char> = word.chars().collect();

    let mut parts = Vec::new();
    let mut index = 0;
    while chars.len() - index > max_chars {
        let piece: String = chars[index..index + chunk].iter().collect();
        parts.push(format!("{}-", piece));
        index += chunk;
    }
    parts.push(chars[index..].iter().collect());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic metrics: every character advances `0.5 * font_size`,
    /// every line is `font_size * line_spacing` tall.
    struct FixedMeasurer;

    impl TextMeasurer for FixedMeasurer {
        fn measure(&self, text: &str, font_size: f32, line_spacing: f32) -> (f32, f32) {
            let lines: Vec<&str> = text.split('\n').collect();
            let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
            (
                widest as f32 * 0.5 * font_size,
                lines.len() as f32 * font_size * line_spacing,
            )
        }
    }

    const PARAMS: FitParams = FitParams {
        min_font_size: 10.0,
        max_font_size: 40.0,
        step: 0.75,
        line_spacing: 1.2,
    };

    #[test]
    fn test_scenario_fits_within_region_bounds() {
        // Region 100x30 from a [10,10,110,40] box
        let layout = fit_text(&FixedMeasurer, "Hello there, friend", 100.0, 30.0, &PARAMS);

        assert!(layout.font_size >= 10.0 && layout.font_size <= 40.0);
        assert!(layout.width <= 100.0, "width {} overflows", layout.width);
        assert!(layout.height <= 30.0, "height {} overflows", layout.height);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let a = fit_text(&FixedMeasurer, "Hello there, friend", 100.0, 30.0, &PARAMS);
        let b = fit_text(&FixedMeasurer, "Hello there, friend", 100.0, 30.0, &PARAMS);
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_text_stays_unwrapped_at_max_size() {
        let layout = fit_text(&FixedMeasurer, "Hi", 200.0, 100.0, &PARAMS);
        assert_eq!(layout.font_size, 40.0);
        assert!(!layout.text.contains('\n'));
    }

    #[test]
    fn test_height_overflow_shrinks_instead_of_wrapping() {
        // Wide but very short region: wrapping would only grow height, so
        // the accepted layout must be a single line at a reduced size
        let layout = fit_text(&FixedMeasurer, "one two three", 400.0, 14.0, &PARAMS);
        assert!(!layout.text.contains('\n'));
        assert!(layout.font_size < 40.0);
        assert!(layout.height <= 14.0);
    }

    #[test]
    fn test_impossible_region_clamps_to_minimum() {
        let layout = fit_text(
            &FixedMeasurer,
            "an impossibly long translation for such a tiny box",
            12.0,
            8.0,
            &PARAMS,
        );
        assert_eq!(layout.font_size, PARAMS.min_font_size);
    }

    #[test]
    fn test_fallback_minimizes_squared_deviation() {
        let text = "aaaa bbbb cccc dddd";
        let layout = fit_text(&FixedMeasurer, text, 12.0, 8.0, &PARAMS);

        let chosen_dev =
            (layout.width - 12.0).powi(2) + (layout.height - 8.0).powi(2);
        for columns in 1..=text.chars().count() {
            let wrapped = wrap_words(text, columns);
            let (w, h) = FixedMeasurer.measure(&wrapped, 10.0, 1.2);
            let dev = (w - 12.0).powi(2) + (h - 8.0).powi(2);
            assert!(chosen_dev <= dev, "columns={} beats the chosen wrap", columns);
        }
    }

    #[test]
    fn test_wrap_respects_column_budget() {
        let wrapped = wrap_words("the quick brown fox jumps", 10);
        for line in wrapped.split('\n') {
            assert!(line.chars().count() <= 10, "line too wide: {:?}", line);
        }
    }

    #[test]
    fn test_wrap_minimizes_line_count_greedily() {
        assert_eq!(wrap_words("aa bb cc", 8), "aa bb cc");
        assert_eq!(wrap_words("aa bb cc", 5), "aa bb\ncc");
    }

    #[test]
    fn test_long_words_are_hyphenated() {
        let wrapped = wrap_words("Extraordinary", 5);
        for line in wrapped.split('\n') {
            assert!(line.chars().count() <= 5, "line too wide: {:?}", line);
        }
        assert!(wrapped.contains('-'));
        // Reassembling drops the hyphens back out
        let rejoined: String = wrapped.replace("-\n", "").replace('\n', " ");
        assert_eq!(rejoined, "Extraordinary");
    }

    #[test]
    fn test_wrap_is_idempotent_for_fitting_text() {
        let once = wrap_words("short words only here", 12);
        let twice: Vec<String> = once
            .split('\n')
            .map(|line| wrap_words(line, 12))
            .collect();
        assert_eq!(once, twice.join("\n"));
    }
}
