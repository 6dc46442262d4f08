use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::Local;
use unicode_width::UnicodeWidthStr;
use uuid::Uuid;

use crate::config::Config;
use crate::project::Project;
use crate::stats::BoardStats;
use crate::task::{self, Priority, Task};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn print_task_table(&self, tasks: &[Task]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_task_table(&mut out, tasks)
    }

    pub fn write_task_table<W: Write>(&self, out: W, tasks: &[Task]) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Status".to_string(),
            "Pri".to_string(),
            "Title".to_string(),
            "Tags".to_string(),
            "Category".to_string(),
        ];

        let rows = tasks
            .iter()
            .map(|task| {
                vec![
                    self.paint(&task.short_id(), "33"),
                    task.status.clone(),
                    self.priority(task.priority),
                    self.title(task),
                    format_tags(&task.tags),
                    task.category.clone(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    /// One section per column, in column order, cards in display order.
    #[tracing::instrument(skip_all, fields(project = %project.id))]
    pub fn print_board(
        &self,
        project: &Project,
        columns: &[(String, Vec<Task>)],
        filtered: bool,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_board(&mut out, project, columns, filtered)
    }

    pub fn write_board<W: Write>(
        &self,
        mut out: W,
        project: &Project,
        columns: &[(String, Vec<Task>)],
        filtered: bool,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&project.title, "1"))?;
        if !project.description.is_empty() {
            writeln!(out, "{}", project.description)?;
        }
        if filtered {
            writeln!(out, "{}", self.paint("(filtered)", "2"))?;
        }

        for (label, tasks) in columns {
            writeln!(out)?;
            writeln!(out, "{} ({})", self.paint(label, "1;4"), tasks.len())?;
            if tasks.is_empty() {
                writeln!(out, "  -")?;
                continue;
            }
            for task in tasks {
                let mut line = format!(
                    "  {} {} {}",
                    self.paint(&task.short_id(), "33"),
                    self.priority(task.priority),
                    self.title(task)
                );
                if !task.tags.is_empty() {
                    line.push(' ');
                    line.push_str(&self.paint(&format_tags(&task.tags), "36"));
                }
                writeln!(out, "{line}")?;
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_info(&self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "title     {}", self.title(task))?;
        if !task.description.is_empty() {
            writeln!(out, "desc      {}", task.description)?;
        }
        writeln!(out, "status    {}", task.status)?;
        writeln!(out, "position  {}", task.order_index)?;
        writeln!(out, "priority  {}", self.priority(task.priority))?;
        writeln!(out, "tags      {}", task.tags.join(", "))?;
        writeln!(out, "category  {}", task.category)?;
        if let Some(color) = &task.color {
            writeln!(out, "color     {color}")?;
        }
        writeln!(
            out,
            "created   {}",
            task.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        )?;
        writeln!(
            out,
            "modified  {}",
            task.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        )?;

        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn print_stats(&self, stats: &BoardStats) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "total       {}", stats.total)?;
        writeln!(
            out,
            "completed   {} ({}%)",
            stats.completed, stats.completion_percent
        )?;
        writeln!(out)?;

        let headers = vec!["Column".to_string(), "Tasks".to_string(), "%".to_string()];
        let rows = stats
            .columns
            .iter()
            .map(|c| vec![c.label.clone(), c.count.to_string(), format!("{}%", c.percent)])
            .collect();
        write_table(&mut out, headers, rows)?;
        writeln!(out)?;

        let headers = vec!["Priority".to_string(), "Tasks".to_string()];
        let rows = Priority::ALL
            .iter()
            .map(|p| vec![self.priority(*p), stats.priorities.get(*p).to_string()])
            .collect();
        write_table(&mut out, headers, rows)?;

        if stats.unplaced > 0 {
            writeln!(out)?;
            writeln!(
                out,
                "{}",
                self.paint(
                    &format!("{} task(s) in columns no longer on the board", stats.unplaced),
                    "31"
                )
            )?;
        }

        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn print_projects(&self, projects: &[Project], active: Option<Uuid>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            " ".to_string(),
            "ID".to_string(),
            "Title".to_string(),
            "Columns".to_string(),
            "Created".to_string(),
        ];
        let rows = projects
            .iter()
            .map(|project| {
                let marker = if Some(project.id) == active { "*" } else { "" };
                vec![
                    marker.to_string(),
                    self.paint(&project.short_id(), "33"),
                    project.title.clone(),
                    project.columns.join(" | "),
                    project
                        .created_at
                        .with_timezone(&Local)
                        .format("%Y-%m-%d")
                        .to_string(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)
    }

    /// Numbered one-per-line listing, used for columns, tags and categories.
    pub fn print_list(&self, items: &[String]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        for (idx, item) in items.iter().enumerate() {
            writeln!(out, "{:>3}  {item}", idx)?;
        }
        Ok(())
    }

    fn priority(&self, priority: Priority) -> String {
        let code = match priority {
            Priority::Low => "32",
            Priority::Medium => "33",
            Priority::High => "38;5;208",
            Priority::Urgent => "1;31",
        };
        self.paint(priority.as_str(), code)
    }

    fn title(&self, task: &Task) -> String {
        match task.color.as_deref().and_then(task::color_rgb) {
            Some((r, g, b)) => self.paint(&task.title, &format!("38;2;{r};{g};{b}")),
            None => task.title.clone(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("+{tag}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn task(title: &str, status: &str) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            title: title.to_string(),
            description: String::new(),
            status: status.to_string(),
            priority: Priority::High,
            tags: vec!["ui".to_string()],
            category: "general".to_string(),
            color: Some("#ff0000".to_string()),
            order_index: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn strip_ansi_keeps_visible_text() {
        assert_eq!(strip_ansi("\x1b[38;2;255;0;0mred\x1b[0m!"), "red!");
    }

    #[test]
    fn table_pads_by_display_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["A".to_string(), "B".to_string()],
            vec![
                vec!["日本".to_string(), "x".to_string()],
                vec!["ab".to_string(), "y".to_string()],
            ],
        )
        .expect("table");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "A    B ");
        assert_eq!(lines[2], "日本 x ");
        assert_eq!(lines[3], "ab   y ");
    }

    #[test]
    fn board_lists_every_column_with_counts() {
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "Launch".to_string(),
            description: String::new(),
            columns: crate::columns::default_columns(),
            created_at: now,
            updated_at: now,
        };
        let columns = vec![
            ("To Do".to_string(), vec![task("write copy", "To Do")]),
            ("Doing".to_string(), vec![]),
        ];
        let mut buf = Vec::new();
        Renderer::plain()
            .write_board(&mut buf, &project, &columns, false)
            .expect("board");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("To Do (1)"));
        assert!(text.contains("Doing (0)"));
        assert!(text.contains("high write copy +ui"));
        assert!(!text.contains('\x1b'));
    }
}
