use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::app::errors::{Result, TaskError};
use crate::app::export::TAG_DELIMITER;
use crate::app::models::{parse_date, parse_tags, Priority, Task, TaskInput};
use crate::app::repository::TaskRepository;
use derivative::Derivative;

use super::ui::App;

const TITLE_LINE: usize = 0;
const NOTES_LINE: usize = 1;
const DUE_LINE: usize = 2;
const PRIORITY_LINE: usize = 3;
const TAGS_LINE: usize = 4;
const LAST_LINE: usize = TAGS_LINE;

// State object for the task edit dialog
// Keeps track of the state of the dialog and the content of the task being edited
#[derive(Derivative)]
#[derivative(Default)]
pub struct TaskEditDialogState {
    pub dialog_active: bool,
    task_id: Option<i64>,
    content: TaskEditDialogContent,
    error_message: Option<String>,
    // (char position in the line, line)
    #[derivative(Default(value = "(0, TITLE_LINE)"))]
    cursor_position: (usize, usize),
}

// Current content of the task being edited/created, as typed
#[derive(Derivative)]
#[derivative(Default)]
struct TaskEditDialogContent {
    title: String,
    notes: String,
    due: String,
    #[derivative(Default(value = "Priority::Med"))]
    priority: Priority,
    tags: String,
}

impl TaskEditDialogContent {
    // The editable text of a line; the priority line is not free text
    fn text_at(&self, line: usize) -> Option<&String> {
        match line {
            TITLE_LINE => Some(&self.title),
            NOTES_LINE => Some(&self.notes),
            DUE_LINE => Some(&self.due),
            TAGS_LINE => Some(&self.tags),
            _ => None,
        }
    }

    fn text_at_mut(&mut self, line: usize) -> Option<&mut String> {
        match line {
            TITLE_LINE => Some(&mut self.title),
            NOTES_LINE => Some(&mut self.notes),
            DUE_LINE => Some(&mut self.due),
            TAGS_LINE => Some(&mut self.tags),
            _ => None,
        }
    }

    // Turn the typed text into repository input
    fn to_input(&self) -> std::result::Result<TaskInput, String> {
        let due = match self.due.trim() {
            "" => None,
            typed => Some(parse_date(typed).map_err(|err| err.to_string())?),
        };
        let notes = Some(self.notes.trim().to_string()).filter(|notes| !notes.is_empty());
        Ok(TaskInput {
            title: self.title.trim().to_string(),
            notes,
            due,
            priority: self.priority,
            tags: parse_tags(&self.tags),
        })
    }
}

impl TaskEditDialogState {
    // Opens the dialog and prepares to accept an input for the new task
    pub fn create_a_new_task(&mut self) {
        *self = TaskEditDialogState {
            dialog_active: true,
            ..Default::default()
        };
    }

    // Opens the dialog and prepares to accept an input for the existing task
    pub fn edit_task(&mut self, task: &Task) {
        *self = TaskEditDialogState {
            dialog_active: true,
            task_id: Some(task.id),
            content: TaskEditDialogContent {
                title: task.title.clone(),
                notes: task.notes.clone().unwrap_or_default(),
                due: task
                    .due
                    .map(|due| due.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                priority: task.priority,
                tags: task.tags.join(TAG_DELIMITER),
            },
            ..Default::default()
        };
    }

    pub fn close(&mut self) {
        self.dialog_active = false;
        self.error_message = None;
    }

    fn line_len(&self, line: usize) -> usize {
        self.content
            .text_at(line)
            .map(|text| text.chars().count())
            .unwrap_or(0)
    }

    // Move the cursor one line BELOW the current one.
    // The horizontal cursor position is kept if the line is long enough
    pub fn move_cursor_down(&mut self) {
        let (x, y) = self.cursor_position;
        let y = (y + 1).min(LAST_LINE);
        self.cursor_position = (x.min(self.line_len(y)), y);
    }

    // Move the cursor one line ABOVE the current one.
    pub fn move_cursor_up(&mut self) {
        let (x, y) = self.cursor_position;
        let y = y.saturating_sub(1);
        self.cursor_position = (x.min(self.line_len(y)), y);
    }

    // Move the cursor one char LEFT; the line does not change
    pub fn move_cursor_left(&mut self) {
        let (x, y) = self.cursor_position;
        self.cursor_position = (x.saturating_sub(1), y);
    }

    // Move the cursor one char RIGHT; the line does not change
    pub fn move_cursor_right(&mut self) {
        let (x, y) = self.cursor_position;
        self.cursor_position = ((x + 1).min(self.line_len(y)), y);
    }

    // Delete the char before the cursor
    pub fn delete_char(&mut self) {
        let (x, y) = self.cursor_position;
        if x == 0 {
            return;
        }
        if let Some(text) = self.content.text_at_mut(y) {
            let at = byte_index(text, x - 1);
            text.remove(at);
            self.move_cursor_left();
        }
    }

    // Handles the input of a char by inserting it at the cursor of the active field.
    // On the priority line l/m/h pick a priority and space cycles through them.
    pub fn input(&mut self, to_insert: char) {
        let (x, y) = self.cursor_position;
        if y == PRIORITY_LINE {
            self.content.priority = match to_insert {
                'l' => Priority::Low,
                'm' => Priority::Med,
                'h' => Priority::High,
                ' ' => self.content.priority.next(),
                _ => self.content.priority,
            };
            return;
        }
        if let Some(text) = self.content.text_at_mut(y) {
            let at = byte_index(text, x);
            text.insert(at, to_insert);
            self.move_cursor_right();
        }
    }

    // Saves the task through the repository.
    // Bad input keeps the dialog open with a message; storage errors are returned.
    pub fn save_task(&mut self, repo: &TaskRepository<'_>) -> Result<()> {
        let input = match self.content.to_input() {
            Ok(input) => input,
            Err(message) => {
                self.error_message = Some(message);
                return Ok(());
            }
        };

        let saved = match self.task_id {
            Some(id) => repo.edit(id, &input).map(|task| task.is_some()),
            None => repo.add(&input).map(|_| true),
        };
        match saved {
            Ok(true) => self.close(),
            Ok(false) => self.error_message = Some("Task no longer exists".to_string()),
            Err(TaskError::Validation(err)) => self.error_message = Some(err.to_string()),
            Err(err) => return Err(err),
        }
        Ok(())
    }
}

// Byte offset of the char at `char_index`, or the end of the string
fn byte_index(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map(|(at, _)| at)
        .unwrap_or(text.len())
}

// Returns the UI content for the task edit dialog
pub fn get_task_edit_ui<'a>(app: &'a App<'a>) -> Vec<Line<'a>> {
    const GRAY_TEXT: Style = Style::new().fg(Color::Rgb(62, 62, 62));
    const WHITE_TEXT: Style = Style::new().fg(Color::White);
    const BLACK_ON_WHITE: Style = Style::new().fg(Color::Black).bg(Color::White);
    let state = &app.task_edit_dialog_state;
    let content = &state.content;
    let mut text = Vec::new();

    struct TextDialogInputLine<'a> {
        prefix: &'static str,
        placeholder: &'static str,
        value: &'a str,
    }

    // Define the lines (input fields) of the dialog, in line order
    let lines = [
        TextDialogInputLine {
            prefix: "Title:    ",
            placeholder: "My task name",
            value: &content.title,
        },
        TextDialogInputLine {
            prefix: "Notes:    ",
            placeholder: "Optional notes",
            value: &content.notes,
        },
        TextDialogInputLine {
            prefix: "Due date: ",
            placeholder: "2024-11-23",
            value: &content.due,
        },
        TextDialogInputLine {
            prefix: "Priority: ",
            placeholder: "med",
            value: content.priority.as_str(),
        },
        TextDialogInputLine {
            prefix: "Tags:     ",
            placeholder: "work, home",
            value: &content.tags,
        },
    ];

    let (cursor_x, cursor_y) = state.cursor_position;

    for (i, line) in lines.iter().enumerate() {
        let mut spans = vec![Span::styled(line.prefix, WHITE_TEXT)];

        if i == PRIORITY_LINE {
            // Not free text: the whole value is highlighted while selected
            let style = if cursor_y == i { BLACK_ON_WHITE } else { WHITE_TEXT };
            spans.push(Span::styled(line.value, style));
        } else if line.value.is_empty() {
            if cursor_y == i {
                // Line is selected. First char is highlighted, the rest is gray
                spans.push(Span::styled(
                    line.placeholder.chars().take(1).collect::<String>(),
                    BLACK_ON_WHITE,
                ));
                spans.push(Span::styled(
                    line.placeholder.chars().skip(1).collect::<String>(),
                    GRAY_TEXT,
                ));
            } else {
                spans.push(Span::styled(line.placeholder, GRAY_TEXT));
            }
        } else if cursor_y == i {
            // All chars are white, except for the one at the cursor position which is highlighted
            spans.push(Span::styled(
                line.value.chars().take(cursor_x).collect::<String>(),
                WHITE_TEXT,
            ));
            spans.push(Span::styled(
                line.value.chars().skip(cursor_x).take(1).collect::<String>(),
                BLACK_ON_WHITE,
            ));
            spans.push(Span::styled(
                line.value.chars().skip(cursor_x + 1).collect::<String>(),
                WHITE_TEXT,
            ));
            if cursor_x == line.value.chars().count() {
                spans.push(Span::styled(" ", BLACK_ON_WHITE));
            }
        } else {
            spans.push(Span::styled(line.value, WHITE_TEXT));
        }

        text.push(Line::from(spans));
    }

    text.push(Line::raw(""));

    // Display the error message if there is one
    if let Some(error_message) = &state.error_message {
        text.push(Line::from(vec![Span::styled(
            error_message.as_str(),
            Style::new().fg(Color::Red),
        )]));
        text.push(Line::raw(""));
    }

    text.push(Line::from(vec![Span::styled(
        "Priority: l/m/h or space. Enter - save, Esc - cancel",
        WHITE_TEXT,
    )]));

    text
}
