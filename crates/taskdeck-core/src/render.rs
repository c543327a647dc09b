use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_deadline;
use crate::notice::Notice;
use crate::task::{Priority, Profile, Status, Task, UserSummary};

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
    pub fn print_task_table(&self, tasks: &[&Task], today: NaiveDate) -> anyhow::Result<()> {
        self.write_task_table(io::stdout().lock(), tasks, today)
    }

    pub fn write_task_table<W: Write>(
        &self,
        mut out: W,
        tasks: &[&Task],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No tasks found.")?;
            return Ok(());
        }

        let headers = [
            "ID", "Status", "Deadline", "Priority", "Title", "Created by", "Assigned to",
        ]
        .map(String::from)
        .to_vec();

        let rows = tasks
            .iter()
            .map(|task| {
                let deadline = format_deadline(task.deadline);
                let deadline = if task.status == Status::Pending && task.deadline < today {
                    self.paint(&deadline, "31")
                } else {
                    deadline
                };

                vec![
                    self.paint(&task.id.to_string(), "33"),
                    self.status_cell(task.status),
                    deadline,
                    self.priority_cell(task.priority),
                    task.title.clone(),
                    username(task.created_by.as_ref()),
                    username(task.assigned_to.as_ref()),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        writeln!(out)?;
        writeln!(out, "{} task{}", tasks.len(), if tasks.len() == 1 { "" } else { "s" })?;
        Ok(())
    }

    pub fn print_profile(&self, profile: &Profile) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "id        {}", profile.id)?;
        writeln!(out, "username  {}", self.paint(&profile.username, "1"))?;
        writeln!(
            out,
            "picture   {}",
            profile.profile_picture.as_deref().unwrap_or("-")
        )?;
        Ok(())
    }

    pub fn print_users(&self, users: &[UserSummary]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if users.is_empty() {
            writeln!(out, "No users found.")?;
            return Ok(());
        }
        let rows = users
            .iter()
            .map(|u| vec![self.paint(&u.id.to_string(), "33"), u.username.clone()])
            .collect();
        write_table(&mut out, vec!["ID".to_string(), "Username".to_string()], rows)?;
        Ok(())
    }

    pub fn print_notice(&self, notice: &Notice) -> anyhow::Result<()> {
        let code = if notice.title == "Success" || notice.title == "Deleted" {
            "32"
        } else {
            "31"
        };
        let mut out = io::stdout().lock();
        writeln!(out, "{}: {}", self.paint(&notice.title, code), notice.message)?;
        Ok(())
    }

    fn status_cell(&self, status: Status) -> String {
        match status {
            Status::Completed => self.paint(status.as_str(), "32"),
            Status::Pending => status.as_str().to_string(),
        }
    }

    fn priority_cell(&self, priority: Priority) -> String {
        match priority {
            Priority::High => self.paint(priority.as_str(), "31"),
            Priority::Medium => self.paint(priority.as_str(), "33"),
            Priority::Low => priority.as_str().to_string(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn username(user: Option<&UserSummary>) -> String {
    user.map(|u| u.username.clone()).unwrap_or_else(|| "-".to_string())
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|h| UnicodeWidthStr::width(h.as_str()))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!("{h:w$}"))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{}", header_line.trim_end())?;

    let rule = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{rule}")?;

    for row in rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| {
                let visible = UnicodeWidthStr::width(strip_ansi(cell).as_str());
                format!("{cell}{}", " ".repeat(w.saturating_sub(visible)))
            })
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, "{}", line.trim_end())?;
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
    use super::*;

    fn task(id: u64, title: &str) -> Task {
        Task {
            id,
            title: title.to_string(),
            description: String::new(),
            status: Status::Pending,
            deadline: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            priority: Priority::High,
            created_by: Some(UserSummary {
                id: 5,
                username: "ana".to_string(),
            }),
            assigned_to: None,
        }
    }

    fn render(renderer: &Renderer, tasks: &[&Task]) -> String {
        let mut buf = Vec::new();
        let today = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        renderer.write_task_table(&mut buf, tasks, today).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn columns_align_on_display_width() {
        let wide = task(1, "日本語");
        let narrow = task(12, "milk");
        let out = render(&Renderer::plain(), &[&wide, &narrow]);
        let lines: Vec<&str> = out.lines().collect();

        assert!(lines[0].starts_with("ID Status"));
        let col = |line: &str| line.find("ana").map(|byte| UnicodeWidthStr::width(&line[..byte]));
        assert_eq!(col(lines[2]), col(lines[3]));
        assert!(out.ends_with("2 tasks\n"));
    }

    #[test]
    fn empty_list_says_so() {
        assert_eq!(render(&Renderer::plain(), &[]), "No tasks found.\n");
    }

    #[test]
    fn overdue_pending_deadline_is_painted() {
        let renderer = Renderer { color: true };
        let overdue = task(1, "late");
        let out = render(&renderer, &[&overdue]);
        assert!(out.contains("\x1b[31m2026-03-01\x1b[0m"));
        assert_eq!(strip_ansi(&out), render(&Renderer::plain(), &[&overdue]));
    }

    #[test]
    fn invalid_color_setting_is_rejected() {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("color".to_string(), "sometimes".to_string())]);
        assert!(Renderer::new(&cfg).is_err());
    }
}
