/*!
format.rs

Plain-text formatting utilities for `log-cache-meta` human output.

Goals:
  - Aligned columns without separator characters (elastic tab stops).
  - Keep alignment logic independent of where the rows come from: text is
    buffered into a `Grid` of cells and laid out in one pass on flush.
  - Coarse duration strings (`5s`, `3m0s`, `1h0m0s`).

Layout rules (`Grid::render`):
  - A line is a sequence of cells separated by '\t'; the text after the
    last tab is the trailing cell and never takes part in alignment.
  - Adjacent lines that all have a tab-terminated cell in column N form a
    column block. Every cell of the block is padded to
    max(min_width, widest cell + padding).
  - Widths are counted in chars.

Public API Summary:
  - TabOpts { min_width, tab_width, padding, pad_char }
  - Grid::parse(text) / Grid::render(&TabOpts) -> String
  - TabWriter<W: Write>: buffers writes, lays them out on flush()
  - format_duration(TimeDelta) -> String

Usage Example:
  let mut tw = TabWriter::new(out, TabOpts { padding: 3, ..TabOpts::default() });
  writeln!(tw, "NAME\tCOUNT")?;
  writeln!(tw, "cpu\t10")?;
  tw.flush()?;

License: MIT (inherits project license)
*/

use chrono::TimeDelta;
use std::io::{self, Write};

/* -------------------------------------------------------------------------- */
/* Options                                                                     */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy)]
pub struct TabOpts {
    /// Minimal cell width, padding included.
    pub min_width: usize,
    /// Tab stop width; only used when `pad_char` is '\t'.
    pub tab_width: usize,
    /// Added to the widest cell of a column block.
    pub padding: usize,
    pub pad_char: char,
}

impl Default for TabOpts {
    fn default() -> Self {
        Self {
            min_width: 0,
            tab_width: 8,
            padding: 1,
            pad_char: ' ',
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Grid                                                                        */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    cells: Vec<String>,
    /// Whether the line ended with '\n' in the input.
    terminated: bool,
}

/// Buffered cells awaiting layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    lines: Vec<Line>,
}

impl Grid {
    /// Split tab/newline delimited text into cells.
    pub fn parse(text: &str) -> Self {
        let lines = text
            .split_inclusive('\n')
            .map(|raw| {
                let terminated = raw.ends_with('\n');
                let content = raw.strip_suffix('\n').unwrap_or(raw);
                Line {
                    cells: content.split('\t').map(str::to_string).collect(),
                    terminated,
                }
            })
            .collect();
        Grid { lines }
    }

    /// Lay out every line with column blocks padded per `opts`.
    pub fn render(&self, opts: &TabOpts) -> String {
        let mut out = String::new();
        let mut widths = Vec::new();
        self.format(opts, &mut widths, &mut out, 0, self.lines.len());
        out
    }

    /// Walk the column blocks of `widths.len()` within `line0..line1`,
    /// recursing one column deeper for each block found.
    fn format(
        &self,
        opts: &TabOpts,
        widths: &mut Vec<usize>,
        out: &mut String,
        mut line0: usize,
        line1: usize,
    ) {
        let column = widths.len();
        let mut this = line0;
        while this < line1 {
            if !self.has_column(this, column) {
                this += 1;
                continue;
            }

            self.write_lines(opts, widths, out, line0, this);
            line0 = this;

            let mut width = opts.min_width;
            while this < line1 && self.has_column(this, column) {
                let cell = &self.lines[this].cells[column];
                width = width.max(cell_width(cell) + opts.padding);
                this += 1;
            }

            widths.push(width);
            self.format(opts, widths, out, line0, this);
            widths.pop();
            line0 = this;
        }
        self.write_lines(opts, widths, out, line0, line1);
    }

    /// True when line `idx` has a tab-terminated cell in `column`.
    fn has_column(&self, idx: usize, column: usize) -> bool {
        column + 1 < self.lines[idx].cells.len()
    }

    fn write_lines(
        &self,
        opts: &TabOpts,
        widths: &[usize],
        out: &mut String,
        line0: usize,
        line1: usize,
    ) {
        for line in &self.lines[line0..line1] {
            for (j, cell) in line.cells.iter().enumerate() {
                out.push_str(cell);
                if let Some(&width) = widths.get(j) {
                    write_padding(out, cell_width(cell), width, opts);
                }
            }
            if line.terminated {
                out.push('\n');
            }
        }
    }
}

fn write_padding(out: &mut String, text_width: usize, cell_width: usize, opts: &TabOpts) {
    if opts.pad_char == '\t' {
        if opts.tab_width == 0 {
            return;
        }
        let cell_width = cell_width.div_ceil(opts.tab_width) * opts.tab_width;
        let n = cell_width.saturating_sub(text_width);
        out.extend(std::iter::repeat_n('\t', n.div_ceil(opts.tab_width)));
        return;
    }
    let n = cell_width.saturating_sub(text_width);
    out.extend(std::iter::repeat_n(opts.pad_char, n));
}

fn cell_width(s: &str) -> usize {
    s.chars().count()
}

/* -------------------------------------------------------------------------- */
/* TabWriter                                                                   */
/* -------------------------------------------------------------------------- */

/// `io::Write` adapter aligning tab-separated text on flush.
///
/// Nothing reaches the inner writer before `flush()`.
pub struct TabWriter<W: Write> {
    inner: W,
    opts: TabOpts,
    buf: Vec<u8>,
}

impl<W: Write> TabWriter<W> {
    pub fn new(inner: W, opts: TabOpts) -> Self {
        Self {
            inner,
            opts,
            buf: Vec::new(),
        }
    }
}

impl<W: Write> Write for TabWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            let text = String::from_utf8_lossy(&self.buf);
            let rendered = Grid::parse(&text).render(&self.opts);
            self.buf.clear();
            self.inner.write_all(rendered.as_bytes())?;
        }
        self.inner.flush()
    }
}

/* -------------------------------------------------------------------------- */
/* Durations                                                                   */
/* -------------------------------------------------------------------------- */

/// Render a span as hours/minutes/seconds, leading zero units omitted.
/// The sub-second part is dropped.
pub fn format_duration(d: TimeDelta) -> String {
    let secs = d.num_seconds();
    let sign = if secs < 0 { "-" } else { "" };
    let total = secs.unsigned_abs();
    let (h, m, s) = (total / 3600, total / 60 % 60, total % 60);
    if h > 0 {
        format!("{sign}{h}h{m}m{s}s")
    } else if m > 0 {
        format!("{sign}{m}m{s}s")
    } else {
        format!("{sign}{s}s")
    }
}

/* -------------------------------------------------------------------------- */
/* Tests                                                                       */
/* -------------------------------------------------------------------------- */
