//! Fitting a cell label into a box: greedy word wrap plus font-size
//! reduction, independent of any drawing backend.

pub const MIN_FONT_SIZE: f32 = 6.0;
pub const LINE_HEIGHT: f32 = 1.2;
const FONT_STEP: f32 = 0.5;
const ELLIPSIS: char = '…';

/// Width of a string rendered at a given font size, in the same unit as the size
pub trait TextMeasure {
    fn text_width(&self, text: &str, font_size: f32) -> f32;
}

/// Rough metrics for when no font face is loaded
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxMeasure;

impl TextMeasure for ApproxMeasure {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars()
            .map(|ch| {
                if is_wide(ch) {
                    1.0
                } else if ch.is_whitespace() {
                    0.28
                } else {
                    0.55
                }
            })
            .sum::<f32>()
            * font_size
    }
}

/// CJK and other full-width ranges take a whole em
fn is_wide(ch: char) -> bool {
    matches!(ch as u32,
        0x1100..=0x115F
        | 0x2E80..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FittedText {
    pub lines: Vec<String>,
    pub font_size: f32,
    pub truncated: bool,
}

impl FittedText {
    pub fn line_height(&self) -> f32 {
        self.font_size * LINE_HEIGHT
    }

    pub fn block_height(&self) -> f32 {
        self.line_height() * self.lines.len() as f32
    }
}

/// Shrinks the font from `base_font_size` until the wrapped text fits in
/// `box_width` x `box_height` within `max_lines`. When even the smallest size
/// overflows, the text is cut after the last allowed line and ends with an
/// ellipsis.
pub fn fit_text(
    text: &str,
    box_width: f32,
    box_height: f32,
    max_lines: usize,
    base_font_size: f32,
    measure: &dyn TextMeasure,
) -> FittedText {
    let max_lines = max_lines.max(1);
    let floor = MIN_FONT_SIZE.min(base_font_size);

    if text.trim().is_empty() {
        return FittedText {
            lines: Vec::new(),
            font_size: base_font_size,
            truncated: false,
        };
    }

    let mut font_size = base_font_size;
    loop {
        let lines = wrap_text(text, box_width, font_size, measure);
        let capacity = line_capacity(box_height, font_size, max_lines);
        if lines.len() <= capacity {
            return FittedText {
                lines,
                font_size,
                truncated: false,
            };
        }
        if font_size - FONT_STEP < floor {
            break;
        }
        font_size -= FONT_STEP;
    }

    let lines = wrap_text(text, box_width, font_size, measure);
    let capacity = line_capacity(box_height, font_size, max_lines);
    FittedText {
        lines: truncate_lines(lines, capacity, box_width, font_size, measure),
        font_size,
        truncated: true,
    }
}

fn line_capacity(box_height: f32, font_size: f32, max_lines: usize) -> usize {
    let by_height = (box_height / (font_size * LINE_HEIGHT)).floor().max(1.0) as usize;
    by_height.min(max_lines)
}

/// Greedy wrap on whitespace; words wider than the box are split by characters
pub fn wrap_text(
    text: &str,
    box_width: f32,
    font_size: f32,
    measure: &dyn TextMeasure,
) -> Vec<String> {
    let fits = |s: &str| measure.text_width(s, font_size) <= box_width;
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if fits(&candidate) {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        if fits(word) {
            current = word.to_string();
            continue;
        }

        for ch in word.chars() {
            current.push(ch);
            if current.chars().count() > 1 && !fits(&current) {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(ch);
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn truncate_lines(
    mut lines: Vec<String>,
    capacity: usize,
    box_width: f32,
    font_size: f32,
    measure: &dyn TextMeasure,
) -> Vec<String> {
    lines.truncate(capacity);
    if let Some(last) = lines.last_mut() {
        let mut cut = last.trim_end().to_string();
        loop {
            let candidate = format!("{cut}{ELLIPSIS}");
            if cut.is_empty() || measure.text_width(&candidate, font_size) <= box_width {
                *last = candidate;
                break;
            }
            cut.pop();
            cut = cut.trim_end().to_string();
        }
    }
    lines
}
