use crate::consolidator::ConsolidatedStatement;
use crate::normalizer::render_token;
use crate::processor::ConsolidatedFiling;
use crate::schema::{Cell, Grid, Row, StatementType, ValueToken};

fn value_cell(token: Option<&ValueToken>) -> Cell {
    match token {
        None => Cell::Empty,
        Some(token) if token.is_restated() => Cell::Text(render_token(token)),
        Some(token) => Cell::Numeric(token.base),
    }
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

fn markdown_field(text: &str) -> String {
    text.replace('|', "\\|")
}

impl ConsolidatedStatement {
    fn header_row(&self) -> Row {
        std::iter::once(Cell::text("Line item"))
            .chain((1..=self.width()).map(|i| Cell::Text(format!("Value {}", i))))
            .collect()
    }

    fn metric_rows(&self) -> Vec<Row> {
        let width = self.width();
        self.metrics
            .iter()
            .map(|m| {
                std::iter::once(Cell::text(m.metric.canonical_label.as_str()))
                    .chain((0..width).map(|i| value_cell(m.metric.values.get(i))))
                    .collect()
            })
            .collect()
    }

    /// Title row, header row, then one row per metric. Restated figures are written as
    /// text in the `100{105}` form so their history survives.
    pub fn to_grid(&self) -> Grid {
        let mut grid = vec![vec![Cell::text(self.statement_type.title())], self.header_row()];
        grid.extend(self.metric_rows());
        grid
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        for row in std::iter::once(self.header_row()).chain(self.metric_rows()) {
            let fields: Vec<String> = row.iter().map(|c| csv_field(&c.to_string())).collect();
            output.push_str(&fields.join(","));
            output.push('\n');
        }
        output
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("## {}\n\n", self.statement_type.title()));
        if !self.periods.is_empty() {
            let labels: Vec<&str> = self.periods.iter().map(|p| p.label.as_str()).collect();
            output.push_str(&format!("**Periods:** {}\n\n", labels.join(", ")));
        }

        let header = self.header_row();
        let cells: Vec<String> = header.iter().map(|c| markdown_field(&c.to_string())).collect();
        output.push_str(&format!("| {} |\n", cells.join(" | ")));
        output.push_str(&format!("|{}\n", "---|".repeat(header.len())));

        for row in self.metric_rows() {
            let cells: Vec<String> = row.iter().map(|c| markdown_field(&c.to_string())).collect();
            output.push_str(&format!("| {} |\n", cells.join(" | ")));
        }

        output
    }
}

impl ConsolidatedFiling {
    /// Every statement's grid, income first, separated by a blank row.
    pub fn to_grid(&self) -> Grid {
        let mut grid: Grid = Vec::new();
        for statement_type in StatementType::ALL {
            let Some(statement) = self.statement(statement_type) else {
                continue;
            };
            if !grid.is_empty() {
                grid.push(Vec::new());
            }
            grid.extend(statement.to_grid());
        }
        grid
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::from("# Consolidated Statements\n\n");
        for statement_type in StatementType::ALL {
            if let Some(statement) = self.statement(statement_type) {
                output.push_str(&statement.to_markdown());
                output.push('\n');
            }
        }
        for gap in &self.gaps {
            output.push_str(&format!("- {}\n", gap));
        }
        output
    }
}
