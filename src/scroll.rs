/// One step of the title marquee: the characters visible on the button and
/// the offset to use on the following step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollFrame {
    pub visible: String,
    pub next_tick: usize,
}

impl ScrollFrame {
    fn blank() -> Self {
        Self {
            visible: String::new(),
            next_tick: 0,
        }
    }
}

/// Advances the marquee for `title` shown `width` characters at a time.
///
/// The title is padded with `width` spaces on both sides so the text slides
/// in from blank and out to blank before the cycle repeats. Offsets past the
/// last full window wrap back to zero before slicing. Slicing works on
/// `char`s, so multi-byte characters are never cut in half.
pub fn advance(title: &str, width: usize, tick: usize) -> ScrollFrame {
    if title.is_empty() || width == 0 {
        return ScrollFrame::blank();
    }

    let padding = std::iter::repeat(' ').take(width);
    let padded: Vec<char> = padding
        .clone()
        .chain(title.chars())
        .chain(padding)
        .collect();

    let last_start = padded.len() - width;
    let tick = if tick > last_start { 0 } else { tick };
    let end = (tick + width).min(padded.len());
    let visible: String = padded[tick..end].iter().collect();

    let next_tick = if visible.is_empty() { 0 } else { tick + 1 };
    ScrollFrame { visible, next_tick }
}
