use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

fn pretty(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unprintable: {e}>"))
}

/// Print a JSON value. Tables and CSV have no shape for arbitrary JSON, so
/// every format pretty-prints.
pub fn print_json(value: &Value, _format: &OutputFormat) {
    println!("{}", pretty(value));
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render tabular data in the requested format.
pub fn render_rows(columns: &[&str], rows: &[Vec<String>], format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL_CONDENSED);
            table.set_header(columns);
            for row in rows {
                table.add_row(row);
            }
            table.to_string()
        }
        OutputFormat::Json => {
            let json_rows: Vec<Value> = rows
                .iter()
                .map(|row| {
                    let mut map = Map::new();
                    for (i, col) in columns.iter().enumerate() {
                        map.insert(
                            (*col).to_string(),
                            Value::String(row.get(i).cloned().unwrap_or_default()),
                        );
                    }
                    Value::Object(map)
                })
                .collect();
            pretty(&json_rows)
        }
        OutputFormat::Csv => {
            let mut lines = vec![columns.join(",")];
            lines.extend(
                rows.iter()
                    .map(|row| row.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(",")),
            );
            lines.join("\n")
        }
    }
}

pub fn print_rows(columns: &[&str], rows: &[Vec<String>], format: &OutputFormat) {
    println!("{}", render_rows(columns, rows, format));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Vec<String>> {
        vec![
            vec!["login_time_pattern".into(), "로그인 시간 패턴".into()],
            vec!["odd".into(), "a,\"b\"".into()],
        ]
    }

    #[test]
    fn csv_quotes_fields_with_separators() {
        let out = render_rows(&["key", "label"], &rows(), &OutputFormat::Csv);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "key,label");
        assert_eq!(lines[1], "login_time_pattern,로그인 시간 패턴");
        assert_eq!(lines[2], "odd,\"a,\"\"b\"\"\"");
    }

    #[test]
    fn json_rows_are_keyed_by_column() {
        let out = render_rows(&["key", "label"], &rows(), &OutputFormat::Json);
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["key"], "login_time_pattern");
        assert_eq!(parsed[1]["label"], "a,\"b\"");
    }

    #[test]
    fn table_contains_headers_and_cells() {
        let out = render_rows(&["key", "label"], &rows(), &OutputFormat::Table);
        assert!(out.contains("key"));
        assert!(out.contains("login_time_pattern"));
    }
}
