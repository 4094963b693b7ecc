//! Terminal output for the `imgdb` binary: colors, status lines, tables, progress

use crate::storage::DbStats;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::{OwoColorize, Style};
use std::sync::OnceLock;
use tabled::{Table, Tabled, settings::Style as TableStyle};

static THEME: OnceLock<Theme> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub warn: Style,
    pub dim: Style,
}

impl Theme {
    pub fn detect() -> Self {
        if !console::Term::stdout().is_term() {
            return Self::plain();
        }
        Self {
            header: Style::new().cyan().bold(),
            success: Style::new().green().bold(),
            warn: Style::new().yellow().bold(),
            dim: Style::new().white().dimmed(),
        }
    }

    pub fn plain() -> Self {
        Self {
            header: Style::new(),
            success: Style::new(),
            warn: Style::new(),
            dim: Style::new(),
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}

pub struct Icons;

impl Icons {
    pub const DISK: &str = "💽";
    pub const CHECK: &str = "✅";
    pub const WARN: &str = "⚠️";
    pub const DATABASE: &str = "🗄️";
    pub const STATS: &str = "📊";
}

pub fn header(text: &str) {
    println!("{} {}", Icons::DISK, text.style(theme().header.clone()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Table")]
    label: &'static str,
    #[tabled(rename = "Rows")]
    value: String,
}

/// Render store statistics as a rounded table
pub fn stats_table(stats: &DbStats) -> String {
    let layout = stats
        .layout_runs
        .map_or_else(|| "not tracked".to_string(), |n| n.to_string());
    let rows = vec![
        StatRow { label: "Objects", value: stats.objects.to_string() },
        StatRow { label: "Images", value: stats.images.to_string() },
        StatRow { label: "Volume systems", value: stats.volume_systems.to_string() },
        StatRow { label: "Volumes", value: stats.volumes.to_string() },
        StatRow { label: "Filesystems", value: stats.filesystems.to_string() },
        StatRow { label: "Files", value: stats.files.to_string() },
        StatRow { label: "Carved files", value: stats.carved_files.to_string() },
        StatRow { label: "Layout runs", value: layout },
    ];
    Table::new(rows).with(TableStyle::rounded()).to_string()
}

/// Progress bar over `total` files, hidden when stdout is not a terminal
pub fn file_progress(total: u64) -> ProgressBar {
    if !console::Term::stdout().is_term() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} files {msg}") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}
