// Static check of Mermaid sources, standing in for a browser renderer.
//
// Catches the failures generated diagrams most often have: an unknown or
// missing diagram type, unbalanced brackets, unterminated quotes and
// sequence arrows inside flowcharts.

use m204_common::requirements::{DiagramError, DiagramRenderer};

const DIAGRAM_TYPES: &[&str] = &[
    "graph",
    "flowchart",
    "sequenceDiagram",
    "classDiagram",
    "classDiagram-v2",
    "stateDiagram",
    "stateDiagram-v2",
    "erDiagram",
    "journey",
    "gantt",
    "pie",
    "gitGraph",
    "mindmap",
    "timeline",
    "quadrantChart",
    "requirementDiagram",
    "C4Context",
    "C4Container",
    "C4Component",
    "xychart-beta",
    "sankey-beta",
    "block-beta",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct MermaidPreflight;

impl DiagramRenderer for MermaidPreflight {
    fn render(&self, source: &str) -> Result<String, DiagramError> {
        let mut lines = source
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with("%%"));

        let Some((_, header)) = lines.next() else {
            return Err(DiagramError::Render("diagram is empty".into()));
        };
        let keyword = header.split_whitespace().next().unwrap_or_default();
        if !DIAGRAM_TYPES.contains(&keyword) {
            return Err(DiagramError::Render(format!("unknown diagram type `{keyword}`")));
        }
        let is_flowchart = keyword == "graph" || keyword == "flowchart";
        // Crow's-foot cardinality (`||--o{`) uses braces unpaired.
        let checks_brackets = keyword != "erDiagram";

        let mut statements = 0;
        let mut open = Vec::new();
        for (number, line) in lines {
            check_line(line, checks_brackets, number, &mut open)
                .map_err(|message| DiagramError::Render(format!("line {number}: {message}")))?;
            if is_flowchart && line.contains("->>") {
                return Err(DiagramError::Render(format!(
                    "line {number}: `->>` is a sequence diagram arrow, not valid in a {keyword}"
                )));
            }
            statements += 1;
        }
        if let Some((ch, number)) = open.last() {
            return Err(DiagramError::Render(format!("line {number}: unclosed `{ch}`")));
        }

        Ok(format!("{keyword} ({statements} statements)"))
    }
}

/// Quotes must close on their line; brackets may span lines (class and
/// state bodies), so `open` carries across calls.
fn check_line(line: &str, brackets: bool, number: usize, open: &mut Vec<(char, usize)>) -> Result<(), String> {
    let mut in_quote = false;
    for ch in line.chars() {
        if ch == '"' {
            in_quote = !in_quote;
            continue;
        }
        if in_quote || !brackets {
            continue;
        }
        match ch {
            '(' | '[' | '{' => open.push((ch, number)),
            ')' | ']' | '}' => {
                let expected = match ch {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if open.pop().map(|(open_ch, _)| open_ch) != Some(expected) {
                    return Err(format!("unexpected `{ch}`"));
                }
            }
            _ => {}
        }
    }
    if in_quote {
        return Err("unterminated string".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(source: &str) -> Result<String, DiagramError> {
        MermaidPreflight.render(source)
    }

    #[test]
    fn accepts_common_diagrams() {
        assert_eq!(check("graph TD\n  A[Start] --> B{Valid?}\n  B -->|yes| C(Done)\n").unwrap(), "graph (2 statements)");
        assert!(check("%% generated\nsequenceDiagram\n  Client->>Server: GET \"/data (v1)\"\n").is_ok());
        assert!(check("erDiagram\n  CUSTOMER ||--o{ ORDER : places\n").is_ok());
        assert!(check("classDiagram\n  class Account {\n    +balance\n  }\n").is_ok());
        assert!(check("pie title Files\n  \"M204\" : 12\n  \"JCL\" : 3\n").is_ok());
    }

    #[test]
    fn rejects_unknown_type() {
        let err = check("grph TD\nA-->B\n").unwrap_err();
        assert_eq!(err, DiagramError::Render("unknown diagram type `grph`".into()));
        assert!(check("\n  \n").is_err());
    }

    #[test]
    fn rejects_unbalanced_brackets_with_line_number() {
        let err = check("flowchart LR\n  A[Start --> B\n").unwrap_err();
        assert_eq!(err, DiagramError::Render("line 2: unclosed `[`".into()));
        assert!(check("graph TD\n  A] --> B\n").is_err());
    }

    #[test]
    fn rejects_sequence_arrows_in_flowcharts() {
        assert!(check("graph TD\n  A->>B\n").is_err());
    }

    #[test]
    fn brackets_inside_quotes_are_ignored() {
        assert!(check("graph TD\n  A[\"total (net\"] --> B\n").is_ok());
        assert!(check("graph TD\n  A[\"open] --> B\n").is_err());
    }
}
