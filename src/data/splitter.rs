// ============================================================
// Layer 4 — Record Splitter
// ============================================================
// Divides a raw text blob into record blocks using a literal
// delimiter LINE (not a regex). Given the default delimiter:
//
//   Title: A            ┐
//   Type: Bug           │ block 0
//                       ┘
//   -----               ← delimiter line, stripped
//   Title: B            ┐ block 1
//   Type: Bug           ┘
//
// Two views are offered:
//
//   split()         the ordered, non-empty blocks, for callers
//                   that only read records
//   SplitDocument   every byte of the input as an ordered list
//                   of segments, so a rewrite can swap single
//                   blocks and reassemble the rest untouched
//
// Whitespace-only blocks (before the first delimiter, after the
// last one, or between two adjacent delimiters) are not records.
//
// Reference: Rust Book §8 (Strings), §13 (Iterators)

use std::fmt;

/// True when `line` (with or without its terminator) is the delimiter.
pub fn is_delimiter_line(line: &str, delimiter: &str) -> bool {
    line.trim_end_matches(['\r', '\n']) == delimiter
}

fn is_blank(block: &str) -> bool {
    block.trim().is_empty()
}

/// Split `text` into its non-empty record blocks, in source order.
///
/// Delimiter lines are removed; whitespace-only blocks are dropped.
/// A text made only of delimiters yields an empty Vec.
pub fn split<'a>(text: &'a str, delimiter: &str) -> Vec<&'a str> {
    SplitDocument::parse(text, delimiter)
        .segments
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Block(block) if !is_blank(block) => Some(block),
            _ => None,
        })
        .collect()
}

/// Join blocks back together with one delimiter line between each.
///
/// A block that does not end in a newline gets one before the
/// delimiter so the delimiter stays on its own line.
pub fn join<S: AsRef<str>>(blocks: &[S], delimiter: &str) -> String {
    let mut out = String::new();
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(delimiter);
            out.push('\n');
        }
        out.push_str(block.as_ref());
    }
    out
}

// ─── SplitDocument ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    /// Text between delimiter lines, exactly as in the source.
    Block(&'a str),
    /// A delimiter line including its terminator.
    Delimiter(&'a str),
}

/// Lossless segmentation of a document into blocks and delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitDocument<'a> {
    segments: Vec<Segment<'a>>,
}

impl<'a> SplitDocument<'a> {
    pub fn parse(text: &'a str, delimiter: &str) -> Self {
        let mut segments   = Vec::new();
        let mut block_start = 0usize;
        let mut offset      = 0usize;

        for line in text.split_inclusive('\n') {
            let line_end = offset + line.len();
            if is_delimiter_line(line, delimiter) {
                segments.push(Segment::Block(&text[block_start..offset]));
                segments.push(Segment::Delimiter(line));
                block_start = line_end;
            }
            offset = line_end;
        }
        segments.push(Segment::Block(&text[block_start..]));

        Self { segments }
    }

    /// Non-empty blocks with their segment slot, in source order.
    /// The slot is what `reassemble` uses to put a rewrite back.
    pub fn blocks(&self) -> Vec<(usize, &'a str)> {
        self.segments
            .iter()
            .enumerate()
            .filter_map(|(slot, segment)| match segment {
                Segment::Block(block) if !is_blank(block) => Some((slot, *block)),
                _ => None,
            })
            .collect()
    }

    /// Rebuild the document, using `replace(slot, block)` for every
    /// non-empty block. Delimiters and blank blocks are copied as is.
    pub fn reassemble<F>(&self, mut replace: F) -> String
    where
        F: FnMut(usize, &'a str) -> String,
    {
        let mut out = String::new();
        for (slot, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Block(block) if !is_blank(block) => out.push_str(&replace(slot, *block)),
                Segment::Block(block) | Segment::Delimiter(block) => out.push_str(block),
            }
        }
        out
    }
}

impl fmt::Display for SplitDocument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Block(text) | Segment::Delimiter(text) => f.write_str(text)?,
            }
        }
        Ok(())
    }
}
