//! Markdown helpers shared by the report renderers.

/// A rate, or `n/a` when undefined. Never renders an undefined rate as 0.
pub fn rate(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

/// Header row plus separator. Columns flagged `true` are right-aligned.
pub fn table_header(columns: &[(&str, bool)]) -> String {
    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let aligns: Vec<&str> = columns
        .iter()
        .map(|(_, right)| if *right { "---:" } else { "---" })
        .collect();
    format!("| {} |\n| {} |\n", names.join(" | "), aligns.join(" | "))
}

pub fn table_row(cells: &[String]) -> String {
    format!("| {} |\n", cells.join(" | "))
}

/// Bulleted notes section; empty when there are no notes.
pub fn notes_section(heading: &str, notes: &[String]) -> String {
    if notes.is_empty() {
        return String::new();
    }
    let mut out = format!("\n## {heading}\n");
    for note in notes {
        out.push_str(&format!("- {note}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_rate_is_na() {
        assert_eq!(rate(None), "n/a");
        assert_eq!(rate(Some(0.6)), "0.6");
        assert_eq!(rate(Some(1.0)), "1");
        assert_eq!(rate(Some(0.0)), "0");
    }

    #[test]
    fn header_alignment() {
        let header = table_header(&[("Asset", false), ("TP", true)]);
        assert_eq!(header, "| Asset | TP |\n| --- | ---: |\n");
    }

    #[test]
    fn empty_notes_render_nothing() {
        assert_eq!(notes_section("Notes", &[]), "");
        let rendered = notes_section("Notes", &["a".to_string()]);
        assert_eq!(rendered, "\n## Notes\n- a\n");
    }
}
