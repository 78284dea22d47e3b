use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Draw a box table. Cells wider than `max_width` display columns are
/// truncated with `…`.
pub fn render(headers: &[String], rows: &[Vec<String>], max_width: usize) -> String {
    let max_width = max_width.max(1);
    let headers: Vec<String> = headers.iter().map(|h| fit(h, max_width)).collect();
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|c| fit(c, max_width)).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.width());
            }
        }
    }

    let rule = |left: &str, mid: &str, right: &str| {
        let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{left}{}{right}", segments.join(mid))
    };
    let line = |cells: &[String]| {
        let padded: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                format!(" {cell}{} ", " ".repeat(w.saturating_sub(cell.width())))
            })
            .collect();
        format!("│{}│", padded.join("│"))
    };

    let mut out = vec![rule("┌", "┬", "┐"), line(&headers), rule("├", "┼", "┤")];
    out.extend(rows.iter().map(|r| line(r)));
    out.push(rule("└", "┴", "┘"));
    out.join("\n")
}

/// One display line, at most `max` columns wide.
fn fit(text: &str, max: usize) -> String {
    let single: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' || c == '\t' { ' ' } else { c })
        .collect();
    if single.width() <= max {
        return single;
    }
    let mut out = String::new();
    let mut used = 0;
    for c in single.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max - 1 {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}
