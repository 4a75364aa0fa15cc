use std::borrow::Cow;
use std::fmt::Write as _;

/// Cells wider than this are cut short with an ellipsis.
pub const DEFAULT_MAX_CELL_WIDTH: usize = 60;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    render_table_with_limit(headers, rows, DEFAULT_MAX_CELL_WIDTH)
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

pub fn render_table_with_limit(headers: &[String], rows: &[Vec<String>], max_width: usize) -> String {
    let max_width = max_width.max(2);
    let columns = headers.len();
    let header_cells = prepare_row(headers, columns, max_width);
    let body = rows
        .iter()
        .map(|row| prepare_row(row, columns, max_width))
        .collect::<Vec<_>>();

    let mut widths = header_cells
        .iter()
        .map(|cell| display_width(cell).max(3))
        .collect::<Vec<_>>();
    for row in &body {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", join_padded(&header_cells, &widths));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", join_padded(&rule, &widths));
    for row in &body {
        let _ = writeln!(output, "{}", join_padded(row, &widths));
    }
    output
}

fn prepare_row(values: &[String], columns: usize, max_width: usize) -> Vec<Cow<'_, str>> {
    (0..columns)
        .map(|idx| {
            let value = values.get(idx).map(String::as_str).unwrap_or_default();
            fit_cell(value, max_width)
        })
        .collect()
}

fn join_padded<S: AsRef<str>>(cells: &[S], widths: &[usize]) -> String {
    let mut line = String::new();
    for (idx, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if idx > 0 {
            line.push_str("  ");
        }
        let cell = cell.as_ref();
        line.push_str(cell);
        let padding = width.saturating_sub(display_width(cell));
        line.extend(std::iter::repeat_n(' ', padding));
    }
    line.truncate(line.trim_end().len());
    line
}

/// Flattens control characters and shortens long values. Leading and
/// trailing spaces are made visible as `·` since they are usually the
/// difference a reader is looking for.
fn fit_cell(value: &str, max_width: usize) -> Cow<'_, str> {
    let needs_rewrite = value.contains(['\n', '\r', '\t'])
        || value.starts_with(' ')
        || value.ends_with(' ')
        || display_width(value) > max_width;
    if !needs_rewrite {
        return Cow::Borrowed(value);
    }

    let body = value.trim_matches(' ');
    let lead = value.len() - value.trim_start_matches(' ').len();
    let trail = if body.is_empty() {
        0
    } else {
        value.len() - value.trim_end_matches(' ').len()
    };

    let mut cell = String::with_capacity(value.len());
    cell.extend(std::iter::repeat_n('·', lead));
    cell.extend(body.chars().map(|ch| match ch {
        '\n' | '\r' | '\t' => ' ',
        other => other,
    }));
    cell.extend(std::iter::repeat_n('·', trail));

    if display_width(&cell) > max_width {
        let kept = cell.chars().take(max_width - 1).collect::<String>();
        cell = format!("{kept}…");
    }
    Cow::Owned(cell)
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI escape sequence, e.g. \x1b[31m
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}
