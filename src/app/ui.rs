use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::*, widgets::*};
use std::{
    io,
    path::Path,
    time::{Duration, Instant},
};

use crate::app::models::Status;
use crate::app::repository::TaskRepository;
use crate::app::storage::Storage;
use crate::app::{task_edit::*, task_list::*};

// One-line input shown above the task list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Search,
    Export,
}

pub struct Prompt {
    pub kind: PromptKind,
    pub text: String,
}

pub struct App<'a> {
    pub items: TaskList<'a>,
    pub task_edit_dialog_state: TaskEditDialogState,
    // Some while a search or export line is being typed
    pub prompt: Option<Prompt>,
    // Result of the last export, shown under the statistics
    pub status_message: Option<String>,
}

impl<'a> App<'a> {
    pub fn new(storage: &'a Storage) -> anyhow::Result<App<'a>> {
        Ok(App {
            items: TaskList::with_items_from_repository(TaskRepository::new(storage))?,
            task_edit_dialog_state: TaskEditDialogState::default(),
            prompt: None,
            status_message: None,
        })
    }

    pub fn export_to(&mut self, path: &str) {
        let path = path.trim();
        self.status_message = Some(match self.items.export_all(Path::new(path)) {
            Ok(count) => format!("Exported {count} task(s) -> {path}"),
            Err(err) => {
                tracing::warn!(error = %err, path, "export failed");
                format!("Export failed: {err}")
            }
        });
    }
}

// Keeps the redraw cadence; the deadline restarts once a tick has passed
struct Ticker {
    tick_rate: Duration,
    last_tick: Instant,
}

impl Ticker {
    fn new(tick_rate: Duration) -> Self {
        Ticker {
            tick_rate,
            last_tick: Instant::now(),
        }
    }

    fn timeout(&mut self) -> Duration {
        if self.last_tick.elapsed() >= self.tick_rate {
            self.last_tick = Instant::now();
        }
        self.tick_rate.saturating_sub(self.last_tick.elapsed())
    }
}

// Open the window on the terminal and run it until the user quits.
// Based on https://github.com/ratatui-org/ratatui/blob/main/examples/list.rs
pub fn launch(storage: &Storage) -> anyhow::Result<()> {
    let app = App::new(storage)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create an app with 250 ms tick
    let tick_rate = Duration::from_millis(250);
    let res = run_app(&mut terminal, app, tick_rate);

    // Restore previous terminal state after exit
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        tracing::error!(error = %err, "window closed with an error");
    }
    res
}

pub fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    tick_rate: Duration,
) -> anyhow::Result<()> {
    let mut ticker = Ticker::new(tick_rate);
    loop {
        terminal.draw(|f| draw_ui(f, &mut app))?;

        if !crossterm::event::poll(ticker.timeout())? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if !handle_key(&mut app, key.code)? {
            return Ok(());
        }
    }
}

// Apply one key press; returns false when the user quits
fn handle_key(app: &mut App, code: KeyCode) -> anyhow::Result<bool> {
    if app.task_edit_dialog_state.dialog_active {
        // Handle input for the task edit dialog
        match code {
            KeyCode::Down | KeyCode::Tab => app.task_edit_dialog_state.move_cursor_down(),
            KeyCode::Up | KeyCode::BackTab => app.task_edit_dialog_state.move_cursor_up(),
            KeyCode::Esc => app.task_edit_dialog_state.close(),
            KeyCode::Enter => {
                app.task_edit_dialog_state
                    .save_task(app.items.repository())?;
                app.items.update_items()?;
            }
            KeyCode::Left => app.task_edit_dialog_state.move_cursor_left(),
            KeyCode::Right => app.task_edit_dialog_state.move_cursor_right(),
            KeyCode::Backspace => app.task_edit_dialog_state.delete_char(),
            KeyCode::Char(to_insert) => app.task_edit_dialog_state.input(to_insert),
            _ => {}
        }
    } else if let Some(prompt) = app.prompt.as_mut() {
        // Handle input for the search or export line
        match code {
            KeyCode::Char(c) => prompt.text.push(c),
            KeyCode::Backspace => {
                prompt.text.pop();
            }
            KeyCode::Enter => match app.prompt.take() {
                Some(Prompt {
                    kind: PromptKind::Search,
                    text,
                }) => app.items.set_query(Some(text))?,
                Some(Prompt {
                    kind: PromptKind::Export,
                    text,
                }) => app.export_to(&text),
                None => {}
            },
            KeyCode::Esc => {
                if prompt.kind == PromptKind::Search {
                    app.items.set_query(None)?;
                }
                app.prompt = None;
            }
            _ => {}
        }
    } else {
        // Handle input for the task list navigation, filtering, sorting and status change
        match code {
            KeyCode::Char('q') => return Ok(false),
            KeyCode::Char('x') => app.items.delete_selected()?,
            KeyCode::Left => app.items.unselect(),
            KeyCode::Down => app.items.next(),
            KeyCode::Up => app.items.previous(),
            KeyCode::Char('a') => app.task_edit_dialog_state.create_a_new_task(),
            KeyCode::Char('e') => {
                if let Some(task) = app.items.get_selected() {
                    app.task_edit_dialog_state.edit_task(task);
                }
            }
            KeyCode::Char('s') => app.items.cycle_status_filter()?,
            KeyCode::Char('p') => app.items.cycle_priority_filter()?,
            KeyCode::Char('/') => {
                app.prompt = Some(Prompt {
                    kind: PromptKind::Search,
                    text: app.items.filter.query.clone().unwrap_or_default(),
                })
            }
            KeyCode::Char('o') => {
                app.prompt = Some(Prompt {
                    kind: PromptKind::Export,
                    text: String::new(),
                })
            }
            KeyCode::Char('d') => app.items.set_sort(SortedBy::ByDueDate),
            KeyCode::Char('f') => app.items.set_sort(SortedBy::ByName),
            KeyCode::Char('g') => app.items.set_sort(SortedBy::ByPriority),
            KeyCode::Char('t') => app.items.set_selected_status(Status::Todo)?,
            KeyCode::Char('w') => app.items.set_selected_status(Status::Doing)?,
            KeyCode::Enter => app.items.set_selected_status(Status::Done)?,
            _ => {}
        }
    }
    Ok(true)
}

// Draws the whole user interface
fn draw_ui(f: &mut Frame, app: &mut App) {
    // Create two chunks of screen in 60-40 ratio
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(f.size());

    // DRAW LEFT PART
    // Prompt line on top while typing, the task list below it
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(if app.prompt.is_some() { 3 } else { 0 }),
            Constraint::Min(0),
        ])
        .split(chunks[0]);

    if let Some(prompt) = &app.prompt {
        let title = match prompt.kind {
            PromptKind::Search => "Search (Enter - apply, Esc - clear)",
            PromptKind::Export => "Export to file (Enter - write, Esc - cancel)",
        };
        let prompt_line = Paragraph::new(format!("{}_", prompt.text))
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(prompt_line, left[0]);
    }

    // Create a List from the shown tasks and highlight the currently selected one
    let task_list = List::new(get_list_items_ui(app.items.items.as_slice()))
        .block(Block::default().borders(Borders::ALL).title("Tasks"))
        .highlight_style(
            Style::default()
                .bg(Color::LightGreen)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    f.render_stateful_widget(task_list, left[1], &mut app.items.state);

    // DRAW RIGHT PART
    if app.task_edit_dialog_state.dialog_active {
        let create_or_edit_task = Paragraph::new(get_task_edit_ui(app))
            .block(Block::new().title("Add/Edit Task").borders(Borders::ALL))
            .style(Style::new().white());

        f.render_widget(create_or_edit_task, chunks[1]);
    } else {
        // If not editing, display instructions and statistics in vertically split layout
        let right_side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[1]);

        let instructions = Paragraph::new(get_instructions_ui())
            .block(Block::new().title("Commands").borders(Borders::ALL))
            .style(Style::new().white());

        let statistics = Paragraph::new(get_statistics_ui(app))
            .block(Block::new().title("Statistics").borders(Borders::ALL))
            .style(Style::new().white());

        f.render_widget(instructions, right_side[0]);
        f.render_widget(statistics, right_side[1]);
    }
}
