use std::path::Path;

use chrono::{Duration, Local, NaiveDate};
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::*;

use crate::app::errors::Result;
use crate::app::export::{export_tasks, ExportError, TAG_DELIMITER};
use crate::app::models::{Priority, Status, Task, TaskFilter};
use crate::app::repository::TaskRepository;

use super::ui::App;

// Possible task list sorting orders
#[derive(PartialEq, Clone, Copy)]
pub enum SortedBy {
    ByDueDate,
    ByName,
    ByPriority,
}

pub struct TaskList<'a> {
    pub state: ListState,
    pub items: Vec<Task>,
    pub filter: TaskFilter,
    repo: TaskRepository<'a>,
    sorted_by: Option<SortedBy>,
    reversed: bool,
}

impl<'a> TaskList<'a> {
    // Initialize a task list with every task in the database
    pub fn with_items_from_repository(repo: TaskRepository<'a>) -> Result<TaskList<'a>> {
        let items = repo.list(&TaskFilter::default())?;
        Ok(TaskList {
            state: ListState::default(),
            items,
            filter: TaskFilter::default(),
            repo,
            sorted_by: None,
            reversed: false,
        })
    }

    pub fn repository(&self) -> &TaskRepository<'a> {
        &self.repo
    }

    // Reload the items through the active filter, keeping the sort order
    pub fn update_items(&mut self) -> Result<()> {
        self.items = self.repo.list(&self.filter)?;
        self.apply_sort();
        if self.items.is_empty() {
            self.state.select(None);
        } else if let Some(i) = self.state.selected() {
            self.state.select(Some(i.min(self.items.len() - 1)));
        }
        Ok(())
    }

    // Move the selection to the next item
    pub fn next(&mut self) {
        let i = match self.state.selected() {
            Some(i) => {
                if self.items.is_empty() || i >= self.items.len() - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    // Move the selection to the previous item
    pub fn previous(&mut self) {
        let i = match self.state.selected() {
            Some(i) => {
                if self.items.is_empty() {
                    0
                } else if i == 0 {
                    self.items.len() - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn unselect(&mut self) {
        self.state.select(None);
    }

    // Change the status of the selected task; save in database.
    pub fn set_selected_status(&mut self, status: Status) -> Result<()> {
        if let Some(id) = self.get_selected().map(|task| task.id) {
            self.repo.set_status(id, status)?;
            self.update_items()?;
        }
        Ok(())
    }

    // Delete the selected task from database; update the items
    pub fn delete_selected(&mut self) -> Result<()> {
        if let Some(id) = self.get_selected().map(|task| task.id) {
            self.repo.remove(id)?;
            self.update_items()?;
        }
        Ok(())
    }

    // Get the selected task
    pub fn get_selected(&self) -> Option<&Task> {
        self.state.selected().and_then(|i| self.items.get(i))
    }

    // Step the status filter: all -> todo -> doing -> done -> all
    pub fn cycle_status_filter(&mut self) -> Result<()> {
        self.filter.status = match self.filter.status {
            None => Some(Status::Todo),
            Some(Status::Todo) => Some(Status::Doing),
            Some(Status::Doing) => Some(Status::Done),
            Some(Status::Done) => None,
        };
        self.update_items()
    }

    // Step the priority filter: all -> low -> med -> high -> all
    pub fn cycle_priority_filter(&mut self) -> Result<()> {
        self.filter.priority = match self.filter.priority {
            None => Some(Priority::Low),
            Some(Priority::Low) => Some(Priority::Med),
            Some(Priority::Med) => Some(Priority::High),
            Some(Priority::High) => None,
        };
        self.update_items()
    }

    // Export every task, not only the shown ones; the format follows the extension
    pub fn export_all(&self, path: &Path) -> Result<usize, ExportError> {
        export_tasks(&self.repo, path, None)
    }

    pub fn set_query(&mut self, query: Option<String>) -> Result<()> {
        self.filter.query = query.filter(|query| !query.trim().is_empty());
        self.update_items()
    }

    // Tasks that are not done yet
    pub fn get_open(&self) -> Vec<&Task> {
        self.items
            .iter()
            .filter(|task| task.status != Status::Done)
            .collect()
    }

    // Open tasks due within the next week
    pub fn get_due_next_week(&self) -> Vec<&Task> {
        let next_week = today() + Duration::weeks(1);
        self.items
            .iter()
            .filter(|task| task.status != Status::Done && task.due.is_some_and(|due| due < next_week))
            .collect()
    }

    // Open tasks whose due date has passed
    pub fn get_late(&self) -> Vec<&Task> {
        let today = today();
        self.items
            .iter()
            .filter(|task| task.status != Status::Done && task.due.is_some_and(|due| due < today))
            .collect()
    }

    // Sort the items by the given order; choosing the same order again reverses it
    pub fn set_sort(&mut self, sorted_by: SortedBy) {
        if self.sorted_by == Some(sorted_by) {
            self.reversed = !self.reversed;
        } else {
            self.sorted_by = Some(sorted_by);
            self.reversed = false;
        }
        self.apply_sort();
    }

    fn apply_sort(&mut self) {
        match self.sorted_by {
            Some(SortedBy::ByName) => self.items.sort_by(|a, b| a.title.cmp(&b.title)),
            Some(SortedBy::ByPriority) => self.items.sort_by(|a, b| b.priority.cmp(&a.priority)),
            // Undated tasks go last
            Some(SortedBy::ByDueDate) => self
                .items
                .sort_by_key(|task| (task.due.is_none(), task.due)),
            None => return,
        }
        if self.reversed {
            self.items.reverse();
        }
    }
}

// Due dates are calendar days of the user, so "today" is the local date
fn today() -> NaiveDate {
    Local::now().date_naive()
}

// Build the UI (list) for task list
pub fn get_list_items_ui(tasks: &[Task]) -> Vec<ListItem<'_>> {
    tasks
        .iter()
        .map(|task| {
            let mut lines = Vec::new();

            let title_color = match task.priority {
                Priority::Med => Color::Yellow,
                Priority::High => Color::Red,
                Priority::Low => Color::White,
            };
            let marker = match task.status {
                Status::Todo => "[ ] ",
                Status::Doing => "[~] ",
                Status::Done => "[x] ",
            };

            lines.push(Line::from(vec![
                Span::from(format!("#{:<4}", task.id)),
                Span::from(marker),
                Span::from(task.title.as_str()).fg(title_color),
            ]));

            let due = task
                .due
                .map(|due| due.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string());
            let mut details = vec![Span::from(format!("      Due: {due}"))];
            if !task.tags.is_empty() {
                details.push(Span::from(format!(" Tags: {}", task.tags.join(TAG_DELIMITER))));
            }
            if let Some(notes) = &task.notes {
                details.push(Span::from(format!(" Notes: {notes}")));
            }
            lines.push(Line::from(details));
            ListItem::new(lines).style(Style::default().fg(Color::White))
        })
        .collect()
}

// Build the UI (lines) for statistics infobox
pub fn get_statistics_ui<'a>(app: &'a App<'a>) -> Vec<Line<'a>> {
    let filter = &app.items.filter;
    let mut lines = vec![
        Line::from(format!("Shown tasks: {}", app.items.items.len())),
        Line::from(format!("Open tasks: {}", app.items.get_open().len())),
        Line::from(format!("Due next week: {}", app.items.get_due_next_week().len())),
        Line::from(format!("Late: {}", app.items.get_late().len())),
        Line::raw(""),
        Line::from(format!(
            "Status filter: {}",
            filter.status.map_or("all", |status| status.as_str())
        )),
        Line::from(format!(
            "Priority filter: {}",
            filter.priority.map_or("all", |priority| priority.as_str())
        )),
        Line::from(format!(
            "Search: {}",
            filter.query.as_deref().unwrap_or("-")
        )),
    ];
    if let Some(message) = &app.status_message {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::from(message.as_str()).fg(Color::Yellow)));
    }
    lines
}

// Build the UI (lines) for instructions infobox
pub fn get_instructions_ui<'a>() -> Vec<Line<'a>> {
    vec![
        "Enter - mark done".into(),
        "w - mark doing, t - mark todo".into(),
        "a - add a task".into(),
        "e - edit a task".into(),
        "x - delete a task".into(),
        "s - filter by status".into(),
        "p - filter by priority".into(),
        "/ - search title and notes".into(),
        "o - export all tasks (.csv or .json)".into(),
        "d - sort by due date".into(),
        "f - sort by title".into(),
        "g - sort by priority".into(),
        "q - quit".into(),
    ]
}
