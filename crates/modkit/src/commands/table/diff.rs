use clap::{Args, ValueEnum};
use itertools::Itertools;
use miette::{miette, IntoDiagnostic, Result};
use modkit_formats::any::Row;
use modkit_formats::AnyTable;
use owo_colors::OwoColorize;
use serde_json::Value;
use similar::{ChangeTag, TextDiff};
use std::fmt::Display;
use std::path::PathBuf;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum Mode {
    /// Changed fields only
    #[default]
    Semantic,
    /// Line diff of every changed entry
    Full,
}

#[derive(Debug, PartialEq, Eq)]
enum Change {
    Added(String),
    Removed(String),
    Modified(String, Vec<String>),
}

impl Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Change::Added(index) => writeln!(f, "✅ {}", index.green()),
            Change::Removed(index) => writeln!(f, "❌ {}", index.red()),
            Change::Modified(index, lines) => {
                writeln!(f, "🔃 {}", index.blue())?;
                for line in lines {
                    writeln!(f, "   {line}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Args)]
pub struct DiffArgs {
    /// An input table
    #[arg(short, long, value_name = "FILE")]
    left: PathBuf,

    /// An input table of the same format
    #[arg(short, long, value_name = "FILE")]
    right: PathBuf,

    /// Comparison mode
    #[arg(short, long, value_enum, default_value_t = Mode::Semantic)]
    mode: Mode,
}

/// Entries of `table` as JSON, next to their listing rows
fn entries(table: &AnyTable) -> Result<Vec<(Row, Value)>> {
    let value = serde_json::to_value(table).into_diagnostic()?;
    let entries = value
        .as_object()
        .and_then(|variant| variant.values().next())
        .and_then(|table| table.get("entries"))
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| miette!("{} table has no entry list", table.kind()))?;

    Ok(table.rows().into_iter().zip(entries).collect())
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl DiffArgs {
    fn fields(&self, left: &Value, right: &Value) -> Vec<String> {
        let (Some(left), Some(right)) = (left.as_object(), right.as_object()) else {
            return vec![format!("{} vs {}", render(left).red(), render(right).green())];
        };

        left.keys()
            .chain(right.keys().filter(|k| !left.contains_key(k.as_str())))
            .filter_map(|key| {
                let old = left.get(key).unwrap_or(&Value::Null);
                let new = right.get(key).unwrap_or(&Value::Null);
                (old != new).then(|| {
                    format!("* {}: {} vs {}", key, render(old).red(), render(new).green())
                })
            })
            .collect()
    }

    fn lines(&self, left: &Value, right: &Value) -> Result<Vec<String>> {
        let old = serde_json::to_string_pretty(left).into_diagnostic()?;
        let new = serde_json::to_string_pretty(right).into_diagnostic()?;
        let diff = TextDiff::from_lines(&old, &new);

        let mut lines = Vec::new();
        for op in diff.ops() {
            for change in diff.iter_inline_changes(op) {
                let mut line = match change.tag() {
                    ChangeTag::Insert => "+".green().to_string(),
                    ChangeTag::Delete => "-".red().to_string(),
                    ChangeTag::Equal => " ".to_string(),
                };
                for (emphasized, value) in change.iter_strings_lossy() {
                    let value = value.trim_end_matches('\n');
                    line.push_str(&match (emphasized, change.tag()) {
                        (true, ChangeTag::Insert) => value.green().underline().to_string(),
                        (true, _) => value.red().underline().to_string(),
                        (false, _) => value.dimmed().to_string(),
                    });
                }
                lines.push(line);
            }
        }
        Ok(lines)
    }

    fn compare(&self, left: &AnyTable, right: &AnyTable) -> Result<Vec<Change>> {
        let left = entries(left)?;
        let right = entries(right)?;
        let find = |entries: &[(Row, Value)], index: &str| {
            entries
                .iter()
                .find(|(row, _)| row.index == index)
                .map(|(_, value)| value.clone())
        };

        let mut changes = Vec::new();
        for (row, old) in &left {
            match find(&right, &row.index) {
                None => changes.push(Change::Removed(row.index.clone())),
                Some(new) if new != *old => {
                    let lines = match self.mode {
                        Mode::Semantic => self.fields(old, &new),
                        Mode::Full => self.lines(old, &new)?,
                    };
                    changes.push(Change::Modified(row.index.clone(), lines));
                }
                Some(_) => {}
            }
        }

        right
            .iter()
            .filter(|(row, _)| find(&left, &row.index).is_none())
            .map(|(row, _)| Change::Added(row.index.clone()))
            .for_each(|c| changes.push(c));

        Ok(changes)
    }

    pub fn handle(&self) -> Result<()> {
        let left = super::open(&self.left)?;
        let right = super::open(&self.right)?;
        if left.kind() != right.kind() {
            return Err(miette!(
                "cannot compare a {} table with a {} table",
                left.kind(),
                right.kind()
            ));
        }

        let changes = self.compare(&left, &right)?;
        let count = |f: fn(&Change) -> bool| changes.iter().filter(|c| f(c)).count();
        println!(
            "{}: {} added, {} removed, {} modified",
            left.kind(),
            count(|c| matches!(c, Change::Added(_))),
            count(|c| matches!(c, Change::Removed(_))),
            count(|c| matches!(c, Change::Modified(..))),
        );
        print!("{}", changes.iter().join(""));
        Ok(())
    }
}
