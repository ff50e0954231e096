//! Minimal fixed-width text table rendering for terminal output.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
}

pub struct TextTableBuilder {
    alignments: Vec<Alignment>,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TextTableBuilder {
    pub fn new() -> Self {
        Self {
            alignments: Vec::new(),
            headers: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn alignments(mut self, alignments: &[Alignment]) -> Self {
        self.alignments = alignments.to_vec();
        self
    }

    pub fn headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn row<I, S>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> String {
        let column_count = self.headers.len();
        let mut widths = vec![0usize; column_count];
        for row in std::iter::once(&self.headers).chain(&self.rows) {
            for (idx, cell) in row.iter().enumerate().take(column_count) {
                widths[idx] = widths[idx].max(cell.chars().count());
            }
        }

        let mut output = String::new();
        self.push_row(&mut output, &self.headers, &widths);
        let rule: String = widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("-+-");
        output.push_str(&rule);
        output.push('\n');
        for row in &self.rows {
            self.push_row(&mut output, row, &widths);
        }
        output
    }

    fn push_row(&self, output: &mut String, row: &[String], widths: &[usize]) {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(idx, cell)| {
                let width = widths.get(idx).copied().unwrap_or(0);
                let alignment = self
                    .alignments
                    .get(idx)
                    .copied()
                    .unwrap_or(Alignment::Left);
                match alignment {
                    Alignment::Left => format!("{cell:<width$}"),
                    Alignment::Right => format!("{cell:>width$}"),
                }
            })
            .collect();
        output.push_str(cells.join(" | ").trim_end());
        output.push('\n');
    }
}

impl Default for TextTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_align_to_widest_cell() {
        let table = TextTableBuilder::new()
            .alignments(&[Alignment::Left, Alignment::Right])
            .headers(["Name", "Amount"])
            .row(["Alice", "1.00"])
            .row(["Bartholomew", "123.45"])
            .build();

        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Name        | Amount");
        assert_eq!(lines[1], "------------+-------");
        assert_eq!(lines[2], "Alice       |   1.00");
        assert_eq!(lines[3], "Bartholomew | 123.45");
    }
}
