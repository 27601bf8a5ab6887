use std::io::{self, IsTerminal, Write};
use std::sync::Mutex;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use crossterm::style::{Stylize, style};
use indicatif::{ProgressBar, ProgressStyle};
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Row, Table, Widget};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::{ListResult, ProgressEvent, ProgressSink};
use crate::fetch::ProgressScale;
use crate::styles::SchemaStyles;

const DEFAULT_WIDTH: u16 = 100;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Console,
    Json,
}

/// Human output: styled messages, download bars and tables.
#[derive(Default)]
pub struct ConsoleOutput {
    download: Mutex<Option<Download>>,
}

struct Download {
    bar: ProgressBar,
    scale: Option<ProgressScale>,
}

impl ConsoleOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print_listing(&self, result: &ListResult) {
        let rows = result
            .entries
            .iter()
            .map(|entry| {
                vec![
                    entry.schema.clone().unwrap_or_else(|| "-".to_string()),
                    entry.name.clone(),
                    bytes_to_human(entry.size),
                    entry.modified.map(format_time).unwrap_or_default(),
                ]
            })
            .collect::<Vec<_>>();
        if rows.is_empty() {
            println!(" {}", style(format!("No {} files.", result.kind)).dark_grey());
            return;
        }
        print_table(&["schema", "filename", "size", "created at"], &rows);
    }

    pub fn print_styles(&self, styles: &[SchemaStyles]) {
        let rows = styles
            .iter()
            .map(|entry| {
                vec![
                    entry.schema.to_string(),
                    entry.source.to_string(),
                    entry.styles.join(", "),
                    entry.default_style.to_string(),
                ]
            })
            .collect::<Vec<_>>();
        print_table(&["schema", "source", "styles", "default"], &rows);
    }

    fn finish_download(&self, ok: bool) {
        let Ok(mut guard) = self.download.lock() else {
            return;
        };
        if let Some(download) = guard.take() {
            if ok {
                download.bar.finish();
            } else {
                download.bar.abandon();
            }
        }
    }

    fn progress(&self, received: u64, total: Option<u64>) {
        let Ok(mut guard) = self.download.lock() else {
            return;
        };
        let download = guard.get_or_insert_with(|| Download {
            bar: ProgressBar::new_spinner(),
            scale: None,
        });
        if let (None, Some(total)) = (download.scale, total) {
            let scale = ProgressScale::for_total(total);
            download.bar.set_length(scale.max_steps);
            download.bar.set_style(bar_style(scale.unit()));
            download.scale = Some(scale);
        }
        match download.scale {
            Some(scale) => download.bar.set_position(scale.position(received)),
            None => download.bar.set_position(received),
        }
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Title(title) => {
                println!();
                let underline = "=".repeat(title.chars().count());
                println!("{}", style(title).bold());
                println!("{}", style(underline).bold());
            }
            ProgressEvent::Info(message) => println!(" {} {message}", style("[INFO]").green()),
            ProgressEvent::Success(message) => {
                println!(" {}", style(format!("[OK] {message}")).black().on_green())
            }
            ProgressEvent::Warning(message) => {
                println!(" {}", style(format!("[WARNING] {message}")).black().on_yellow())
            }
            ProgressEvent::DownloadStarted { url, destination } => {
                println!(" {} {url} -> {destination}", style("[GET]").cyan());
            }
            ProgressEvent::DownloadProgress { received, total } => self.progress(received, total),
            ProgressEvent::DownloadFinished { ok, .. } => self.finish_download(ok),
        }
    }
}

/// Machine output: events go to the log, results to stdout as JSON.
pub struct JsonOutput;

impl JsonOutput {
    pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Title(message)
            | ProgressEvent::Info(message)
            | ProgressEvent::Success(message) => info!("{message}"),
            ProgressEvent::Warning(message) => warn!("{message}"),
            ProgressEvent::DownloadStarted { url, destination } => {
                info!(%url, %destination, "download started")
            }
            ProgressEvent::DownloadProgress { .. } => {}
            ProgressEvent::DownloadFinished { destination, ok } => {
                debug!(%destination, ok, "download finished")
            }
        }
    }
}

fn bar_style(unit: &str) -> ProgressStyle {
    let template = format!(
        " {{pos}}/{{len}} {unit} [{{bar:40}}] {{percent:>3}}% {{elapsed_precise}}/{{eta_precise}}"
    );
    ProgressStyle::with_template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Prints a table: drawn with borders on a terminal, tab separated when
/// piped.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    if io::stdout().is_terminal() {
        let width = crossterm::terminal::size()
            .map(|(width, _)| width)
            .unwrap_or(DEFAULT_WIDTH);
        for line in render_table(headers, rows, width) {
            println!("{line}");
        }
    } else {
        for row in rows {
            println!("{}", row.join("\t"));
        }
    }
}

/// Renders the table into plain text lines of at most `width` columns.
pub fn render_table(headers: &[&str], rows: &[Vec<String>], width: u16) -> Vec<String> {
    let widths = (0..headers.len())
        .map(|column| {
            let content = rows
                .iter()
                .filter_map(|row| row.get(column))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(headers[column].chars().count()))
                .max()
                .unwrap_or(0);
            Constraint::Length(u16::try_from(content).unwrap_or(u16::MAX))
        })
        .collect::<Vec<_>>();

    let header = Row::new(headers.iter().map(|header| Cell::from(header.to_string())))
        .style(Style::default().add_modifier(Modifier::BOLD));
    let body = rows
        .iter()
        .map(|row| Row::new(row.iter().map(|cell| Cell::from(cell.clone()))));
    let table = Table::new(body, widths)
        .header(header)
        .column_spacing(2)
        .block(Block::default().borders(Borders::ALL));

    let height = u16::try_from(rows.len() + 3).unwrap_or(u16::MAX);
    let area = Rect::new(0, 0, width, height);
    let mut buffer = Buffer::empty(area);
    table.render(area, &mut buffer);

    (0..height)
        .map(|y| {
            (0..width)
                .map(|x| buffer[(x, y)].symbol())
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect()
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

pub fn bytes_to_human(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let value = bytes as f64;
    if value >= GB {
        format!("{:.1} GB", value / GB)
    } else if value >= MB {
        format!("{:.1} MB", value / MB)
    } else if value >= KB {
        format!("{:.1} KB", value / KB)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_sizes() {
        assert_eq!(bytes_to_human(512), "512 B");
        assert_eq!(bytes_to_human(2048), "2.0 KB");
        assert_eq!(bytes_to_human(5 * 1024 * 1024 * 1024), "5.0 GB");
    }

    #[test]
    fn table_has_header_and_rows() {
        let lines = render_table(
            &["schema", "filename"],
            &[vec!["shortbread".to_string(), "monaco".to_string()]],
            40,
        );
        assert_eq!(lines.len(), 4);
        assert!(lines[1].contains("schema"));
        assert!(lines[1].contains("filename"));
        assert!(lines[2].contains("shortbread"));
        assert!(lines[2].contains("monaco"));
    }
}
