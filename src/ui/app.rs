use std::mem;
use std::path::Path;

use anyhow::{Context, Error, Result};
use chrono::Local;
use crossterm::event::KeyCode;
use open::that as open_path;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap};
use ratatui::Frame;
use rusqlite::Connection;
use tracing::warn;

use crate::config::AppConfig;
use crate::db::{
    add_grade, add_lesson, add_message, add_payment, create_student, delete_lesson,
    delete_student, get_student, list_students, mark_message_read, update_student,
};
use crate::error::StoreError;
use crate::models::Student;
use crate::photos::import_photo;
use crate::reports::{export_payments_csv, export_students_csv, write_bulletin};

use super::forms::{
    grade_form, lesson_form, message_form, parse_grade, parse_lesson, parse_message,
    parse_payment, parse_student, payment_form, student_form, DeleteTarget, Form, NotesEditor,
};
use super::helpers::{centered_rect, key_hints, surface_error};
use super::screens::{DetailView, Focus, SelectionContext, StudentList, Tab};

/// Tab bar height, borders included.
const HEADER_HEIGHT: u16 = 3;
/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Width share of the student list.
const STUDENT_PANE_PERCENT: u16 = 35;
const PAGE: isize = 5;

const SELECT_STUDENT: &str = "Sélectionnez un élève.";

/// Fine-grained modes layered over the main screen.
enum Mode {
    Normal,
    Searching(SearchState),
    Editing { target: FormTarget, form: Form },
    EditingNotes { student_id: i64, editor: NotesEditor },
    ConfirmDelete(DeleteTarget),
}

/// What a submitted form writes. Edits carry the id of the row being edited,
/// so the target travels with the form instead of living on `App`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FormTarget {
    NewStudent,
    EditStudent(i64),
    Lesson { student_id: i64 },
    Grade { student_id: i64 },
    Payment { student_id: i64 },
    Message { student_id: i64 },
}

impl FormTarget {
    fn title(self) -> &'static str {
        match self {
            FormTarget::NewStudent => "Formulaire inscription",
            FormTarget::EditStudent(_) => "Modifier l'élève",
            FormTarget::Lesson { .. } => "Ajouter leçon",
            FormTarget::Grade { .. } => "Ajouter contrôle / note",
            FormTarget::Payment { .. } => "Ajouter paiement",
            FormTarget::Message { .. } => "Nouveau message",
        }
    }
}

/// Result of a successful form write: the student to keep selected and the
/// status line to show.
struct Saved {
    focus_id: Option<i64>,
    message: String,
}

impl Saved {
    fn new(focus_id: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            focus_id,
            message: message.into(),
        }
    }
}

/// State for an active live search.
struct SearchState {
    query: String,
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
#[derive(Debug, PartialEq, Eq)]
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    conn: Connection,
    config: AppConfig,
    list: StudentList,
    detail: DetailView,
    tab: Tab,
    focus: Focus,
    mode: Mode,
    status: Option<StatusMessage>,
}

impl App {
    /// Build the UI state and load the first page of students.
    pub fn load(conn: Connection, config: AppConfig) -> Result<Self> {
        let mut app = Self {
            conn,
            config,
            list: StudentList::default(),
            detail: DetailView::default(),
            tab: Tab::Info,
            focus: Focus::Students,
            mode: Mode::Normal,
            status: None,
        };
        app.reload_students(None)?;
        Ok(app)
    }

    /// Process one key press. Returns `true` when the user asked to quit.
    /// Failed actions end up in the status line; they never stop the loop.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        let next = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit),
            Mode::Searching(state) => self.handle_search(code, state),
            Mode::Editing { target, form } => self.handle_form(code, target, form),
            Mode::EditingNotes { student_id, editor } => {
                Ok(self.handle_notes(code, student_id, editor))
            }
            Mode::ConfirmDelete(target) => Ok(self.handle_confirm_delete(code, target)),
        };

        self.mode = match next {
            Ok(mode) => mode,
            Err(err) => {
                self.report(err);
                Mode::Normal
            }
        };
        Ok(exit)
    }

    /// Ctrl+S saves the planning notes being edited.
    pub(crate) fn handle_ctrl_s(&mut self) -> Result<()> {
        let Mode::EditingNotes { student_id, editor } = &self.mode else {
            return Ok(());
        };
        let student_id = *student_id;
        let text = editor.text.clone();

        match self.save_notes(student_id, &text) {
            Ok(()) => {
                self.mode = Mode::Normal;
                if let Err(err) = self.reload_students(Some(student_id)) {
                    self.report(err);
                } else {
                    self.set_status("Notes enregistrées.", StatusKind::Info);
                }
            }
            Err(err) => self.report(err),
        }
        Ok(())
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let ctx = self.selection();
        match code {
            KeyCode::Char('q') => *exit = true,
            KeyCode::Tab => self.switch_tab(self.tab.offset(1)),
            KeyCode::BackTab => self.switch_tab(self.tab.offset(-1)),
            KeyCode::Char(ch @ '1'..='6') => {
                let idx = ch as usize - '1' as usize;
                self.switch_tab(Tab::ALL[idx]);
            }
            KeyCode::Up => self.move_cursor(-1)?,
            KeyCode::Down => self.move_cursor(1)?,
            KeyCode::PageUp => self.move_cursor(-PAGE)?,
            KeyCode::PageDown => self.move_cursor(PAGE)?,
            KeyCode::Home => self.jump(false)?,
            KeyCode::End => self.jump(true)?,
            KeyCode::Left => self.focus = Focus::Students,
            KeyCode::Right => {
                if self.tab.has_rows() {
                    self.focus = Focus::Detail;
                }
            }
            KeyCode::Esc => {
                if self.list.filter_query().is_some() {
                    self.list.filter = None;
                    self.reload_students(ctx.student_id)?;
                    self.set_status("Recherche effacée.", StatusKind::Info);
                } else {
                    self.focus = Focus::Students;
                }
            }
            KeyCode::Char('/') | KeyCode::Char('f') => {
                self.clear_status();
                return Ok(Mode::Searching(SearchState {
                    query: self.list.filter.clone().unwrap_or_default(),
                }));
            }
            KeyCode::Char('r') => {
                self.reload_students(ctx.student_id)?;
                self.set_status("Liste rafraîchie.", StatusKind::Info);
            }
            KeyCode::Char('a') | KeyCode::Char('+') => {
                self.clear_status();
                self.switch_tab(Tab::Registration);
                return Ok(Mode::Editing {
                    target: FormTarget::NewStudent,
                    form: student_form(None),
                });
            }
            KeyCode::Char('e') => return Ok(self.start_edit_student(ctx)),
            KeyCode::Char('d') | KeyCode::Char('-') => return Ok(self.confirm_delete_student(ctx)),
            KeyCode::Enter if self.tab == Tab::Planning => return Ok(self.start_notes(ctx)),
            KeyCode::Char(ch) => return self.handle_tab_key(ch, ctx),
            _ => {}
        }
        Ok(Mode::Normal)
    }

    /// Shortcuts that only exist on one tab.
    fn handle_tab_key(&mut self, ch: char, ctx: SelectionContext) -> Result<Mode> {
        match (self.tab, ch) {
            (Tab::Lessons, 'l') => Ok(self.start_form(ctx, |student_id| {
                (
                    FormTarget::Lesson { student_id },
                    lesson_form(&today()),
                )
            })),
            (Tab::Lessons, 'g') => Ok(self.start_form(ctx, |student_id| {
                (FormTarget::Grade { student_id }, grade_form())
            })),
            (Tab::Lessons, 'x') => Ok(self.confirm_delete_lesson(ctx)),
            (Tab::Messages, 'm') => Ok(self.start_form(ctx, |student_id| {
                (FormTarget::Message { student_id }, message_form())
            })),
            (Tab::Messages, 'o') => {
                self.mark_read(ctx)?;
                Ok(Mode::Normal)
            }
            (Tab::Reports, 'p') => Ok(self.start_form(ctx, |student_id| {
                (
                    FormTarget::Payment { student_id },
                    payment_form(&today()),
                )
            })),
            (Tab::Reports, 'c') => {
                let path = export_students_csv(&self.conn, &self.config.export_dir)?;
                self.set_status(format!("CSV créé: {}", path.display()), StatusKind::Info);
                Ok(Mode::Normal)
            }
            (Tab::Reports, 'v') => {
                let path = export_payments_csv(&self.conn, &self.config.export_dir)?;
                self.set_status(format!("CSV créé: {}", path.display()), StatusKind::Info);
                Ok(Mode::Normal)
            }
            (Tab::Reports, 'b') => {
                self.generate_bulletin(ctx)?;
                Ok(Mode::Normal)
            }
            (Tab::Reports, 'h') => {
                open_path(&self.config.photos_dir).context("failed to open photos directory")?;
                self.set_status("Dossier photos ouvert.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            (Tab::Planning, 'n') => Ok(self.start_notes(ctx)),
            _ => Ok(Mode::Normal),
        }
    }

    fn handle_search(&mut self, code: KeyCode, mut state: SearchState) -> Result<Mode> {
        let focus_id = self.selection().student_id;
        match code {
            KeyCode::Esc => {
                self.list.filter = None;
                self.reload_students(focus_id)?;
                return Ok(Mode::Normal);
            }
            KeyCode::Enter => {
                let count = self.list.students.len();
                self.set_status(format!("{count} élève(s) trouvé(s)."), StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Up | KeyCode::Down => {
                let offset = if code == KeyCode::Up { -1 } else { 1 };
                self.list.move_selection(offset);
                self.refresh_detail()?;
                return Ok(Mode::Searching(state));
            }
            KeyCode::Backspace => {
                state.query.pop();
            }
            KeyCode::Char(ch) if !ch.is_control() => state.query.push(ch),
            _ => return Ok(Mode::Searching(state)),
        }

        self.list.filter = Some(state.query.clone());
        self.reload_students(focus_id)?;
        Ok(Mode::Searching(state))
    }

    fn handle_form(&mut self, code: KeyCode, target: FormTarget, mut form: Form) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Saisie annulée.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_form(target, &form) {
                Ok(saved) => {
                    self.reload_students(saved.focus_id)?;
                    self.set_status(saved.message, StatusKind::Info);
                    return Ok(Mode::Normal);
                }
                Err(err) => {
                    let message = surface_error(&err);
                    warn!(error = %err, ?target, "form rejected");
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::Editing { target, form })
    }

    fn handle_notes(&mut self, code: KeyCode, student_id: i64, mut editor: NotesEditor) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status("Notes non enregistrées.", StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Enter => editor.newline(),
            KeyCode::Backspace => editor.backspace(),
            KeyCode::Char(ch) => editor.push_char(ch),
            _ => {}
        }
        Mode::EditingNotes { student_id, editor }
    }

    fn handle_confirm_delete(&mut self, code: KeyCode, target: DeleteTarget) -> Mode {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Suppression annulée.", StatusKind::Info);
                Mode::Normal
            }
            KeyCode::Enter
            | KeyCode::Char('y')
            | KeyCode::Char('Y')
            | KeyCode::Char('o')
            | KeyCode::Char('O') => match self.perform_delete(&target) {
                Ok(focus_id) => {
                    if let Err(err) = self.reload_students(focus_id) {
                        self.report(err);
                    }
                    Mode::Normal
                }
                Err(err) => {
                    self.report(err);
                    Mode::ConfirmDelete(target)
                }
            },
            _ => Mode::ConfirmDelete(target),
        }
    }

    /// Snapshot of the highlighted rows, passed to every action.
    fn selection(&self) -> SelectionContext {
        let student_id = self.list.current().map(|s| s.id);
        SelectionContext {
            student_id,
            lesson_id: student_id.and(self.detail.current_lesson().map(|l| l.id)),
            message_id: student_id.and(self.detail.current_message().map(|m| m.id)),
        }
    }

    fn student_for(&self, ctx: SelectionContext) -> Option<&Student> {
        let id = ctx.student_id?;
        self.list.students.iter().find(|s| s.id == id)
    }

    /// Open a per-student form, or prompt for a selection when none is made.
    fn start_form(
        &mut self,
        ctx: SelectionContext,
        build: impl FnOnce(i64) -> (FormTarget, Form),
    ) -> Mode {
        match ctx.student_id {
            Some(student_id) => {
                self.clear_status();
                let (target, form) = build(student_id);
                Mode::Editing { target, form }
            }
            None => {
                self.set_status(SELECT_STUDENT, StatusKind::Info);
                Mode::Normal
            }
        }
    }

    fn start_edit_student(&mut self, ctx: SelectionContext) -> Mode {
        let Some(student) = self.student_for(ctx).cloned() else {
            self.set_status("Sélectionnez un élève à modifier.", StatusKind::Info);
            return Mode::Normal;
        };
        self.clear_status();
        self.switch_tab(Tab::Registration);
        Mode::Editing {
            target: FormTarget::EditStudent(student.id),
            form: student_form(Some(&student)),
        }
    }

    fn start_notes(&mut self, ctx: SelectionContext) -> Mode {
        let Some(student) = self.student_for(ctx) else {
            self.set_status(SELECT_STUDENT, StatusKind::Info);
            return Mode::Normal;
        };
        let mode = Mode::EditingNotes {
            student_id: student.id,
            editor: NotesEditor::new(&student.notes),
        };
        self.clear_status();
        mode
    }

    fn confirm_delete_student(&mut self, ctx: SelectionContext) -> Mode {
        match self.student_for(ctx) {
            Some(student) => Mode::ConfirmDelete(DeleteTarget::Student {
                id: student.id,
                label: student.list_label(),
            }),
            None => {
                self.set_status("Sélectionnez un élève à supprimer.", StatusKind::Info);
                Mode::Normal
            }
        }
    }

    fn confirm_delete_lesson(&mut self, ctx: SelectionContext) -> Mode {
        let lesson = ctx
            .lesson_id
            .and_then(|id| self.detail.lessons.iter().find(|l| l.id == id));
        match lesson {
            Some(lesson) => Mode::ConfirmDelete(DeleteTarget::Lesson {
                id: lesson.id,
                label: lesson.list_label(),
            }),
            None => {
                self.set_status("Sélectionnez une leçon.", StatusKind::Info);
                Mode::Normal
            }
        }
    }

    fn save_form(&mut self, target: FormTarget, form: &Form) -> Result<Saved> {
        match target {
            FormTarget::NewStudent => {
                let mut fields = parse_student(form, "")?;
                fields.photo = self.resolve_photo(fields.photo.as_deref(), None)?;
                let id = create_student(&self.conn, &fields)?;
                Ok(Saved::new(Some(id), "Élève enregistré."))
            }
            FormTarget::EditStudent(id) => {
                let existing = get_student(&self.conn, id)?.ok_or(StoreError::NotFound("Élève"))?;
                let mut fields = parse_student(form, &existing.notes)?;
                fields.photo =
                    self.resolve_photo(fields.photo.as_deref(), existing.photo.as_deref())?;
                update_student(&self.conn, id, &fields)?;
                Ok(Saved::new(Some(id), "Élève enregistré."))
            }
            FormTarget::Lesson { student_id } => {
                let lesson = parse_lesson(form)?;
                add_lesson(
                    &self.conn,
                    student_id,
                    &lesson.date,
                    &lesson.topic,
                    lesson.duration,
                    &lesson.note,
                )?;
                Ok(Saved::new(Some(student_id), "Leçon ajoutée."))
            }
            FormTarget::Grade { student_id } => {
                let (title, grade) = parse_grade(form)?;
                add_grade(&self.conn, student_id, &today(), &title, &grade)?;
                Ok(Saved::new(Some(student_id), "Note enregistrée."))
            }
            FormTarget::Payment { student_id } => {
                let payment = parse_payment(form)?;
                add_payment(
                    &self.conn,
                    student_id,
                    &payment.date,
                    payment.amount,
                    &payment.method,
                    &payment.note,
                )?;
                Ok(Saved::new(Some(student_id), "Paiement enregistré."))
            }
            FormTarget::Message { student_id } => {
                let (sender, content) = parse_message(form)?;
                add_message(&self.conn, student_id, &sender, &content)?;
                Ok(Saved::new(
                    Some(student_id),
                    "Message envoyé aux parents/élève.",
                ))
            }
        }
    }

    /// Copy a newly chosen photo into the photo directory. An unchanged path
    /// is kept as-is.
    fn resolve_photo(&self, typed: Option<&str>, current: Option<&str>) -> Result<Option<String>> {
        match typed {
            None => Ok(None),
            Some(path) if Some(path) == current => Ok(Some(path.to_string())),
            Some(path) => {
                let dest = import_photo(&self.config.photos_dir, Path::new(path))?;
                Ok(Some(dest.to_string_lossy().into_owned()))
            }
        }
    }

    fn save_notes(&mut self, student_id: i64, text: &str) -> Result<()> {
        let student = get_student(&self.conn, student_id)?.ok_or(StoreError::NotFound("Élève"))?;
        let mut fields = student.fields();
        fields.notes = text.to_string();
        update_student(&self.conn, student_id, &fields)
    }

    /// Run the confirmed delete. Returns the student to keep selected once
    /// the list is reloaded.
    fn perform_delete(&mut self, target: &DeleteTarget) -> Result<Option<i64>> {
        match target {
            DeleteTarget::Student { id, .. } => {
                delete_student(&mut self.conn, *id)?;
                self.set_status("Élève supprimé.", StatusKind::Info);
                Ok(None)
            }
            DeleteTarget::Lesson { id, .. } => {
                delete_lesson(&self.conn, *id)?;
                self.set_status("Leçon supprimée.", StatusKind::Info);
                Ok(self.detail.student_id)
            }
        }
    }

    fn mark_read(&mut self, ctx: SelectionContext) -> Result<()> {
        if ctx.student_id.is_none() {
            self.set_status(SELECT_STUDENT, StatusKind::Info);
            return Ok(());
        }
        let Some(message_id) = ctx.message_id else {
            self.set_status("Sélectionnez un message.", StatusKind::Info);
            return Ok(());
        };
        mark_message_read(&self.conn, message_id)?;
        self.refresh_detail()?;
        self.set_status("Message marqué comme lu.", StatusKind::Info);
        Ok(())
    }

    fn generate_bulletin(&mut self, ctx: SelectionContext) -> Result<()> {
        let Some(student_id) = ctx.student_id else {
            self.set_status(SELECT_STUDENT, StatusKind::Info);
            return Ok(());
        };
        let path = write_bulletin(&self.conn, student_id, &self.config.export_dir)?;
        match open_path(&path) {
            Ok(()) => {
                self.set_status(format!("Bulletin HTML: {}", path.display()), StatusKind::Info)
            }
            Err(err) => {
                warn!(error = %err, path = %path.display(), "could not open bulletin");
                self.set_status(
                    format!(
                        "Bulletin créé ({}) mais impossible de l'ouvrir : {err}",
                        path.display()
                    ),
                    StatusKind::Error,
                );
            }
        }
        Ok(())
    }

    fn switch_tab(&mut self, tab: Tab) {
        self.tab = tab;
        if !tab.has_rows() {
            self.focus = Focus::Students;
        }
    }

    fn move_cursor(&mut self, offset: isize) -> Result<()> {
        match self.focus {
            Focus::Students => {
                self.list.move_selection(offset);
                self.refresh_detail()
            }
            Focus::Detail => {
                self.detail.move_selection(self.tab, offset);
                Ok(())
            }
        }
    }

    fn jump(&mut self, to_end: bool) -> Result<()> {
        match self.focus {
            Focus::Students => {
                if to_end {
                    self.list.select_last();
                } else {
                    self.list.select_first();
                }
                self.refresh_detail()
            }
            Focus::Detail => {
                let len = match self.tab {
                    Tab::Lessons => self.detail.lessons.len(),
                    Tab::Messages => self.detail.messages.len(),
                    Tab::Reports => self.detail.payments.len(),
                    _ => 0,
                } as isize;
                self.detail
                    .move_selection(self.tab, if to_end { len } else { -len });
                Ok(())
            }
        }
    }

    fn reload_students(&mut self, focus_id: Option<i64>) -> Result<()> {
        let students = list_students(&self.conn, self.list.filter_query())?;
        self.list.set_students(students, focus_id);
        self.refresh_detail()
    }

    fn refresh_detail(&mut self) -> Result<()> {
        match self.list.current().map(|s| s.id) {
            Some(id) => self.detail.load(&self.conn, id),
            None => {
                self.detail.clear();
                Ok(())
            }
        }
    }

    fn report(&mut self, err: Error) {
        warn!(error = %err, "action failed");
        self.set_status(surface_error(&err), StatusKind::Error);
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(HEADER_HEIGHT),
                Constraint::Min(0),
                Constraint::Length(FOOTER_HEIGHT),
            ])
            .split(area);

        self.draw_tabs(frame, chunks[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(STUDENT_PANE_PERCENT),
                Constraint::Percentage(100 - STUDENT_PANE_PERCENT),
            ])
            .split(chunks[1]);
        self.draw_student_list(frame, body[0]);
        match self.tab {
            Tab::Info => self.draw_info(frame, body[1]),
            Tab::Lessons => self.draw_lessons(frame, body[1]),
            Tab::Messages => self.draw_messages(frame, body[1]),
            Tab::Registration => self.draw_registration(frame, body[1]),
            Tab::Reports => self.draw_reports(frame, body[1]),
            Tab::Planning => self.draw_planning(frame, body[1]),
        }

        self.draw_footer(frame, chunks[2]);

        match &self.mode {
            Mode::Searching(state) => self.draw_search_bar(frame, body[0], state),
            Mode::Editing { target, form } => self.draw_form(frame, area, target.title(), form),
            Mode::EditingNotes { editor, .. } => self.draw_notes_editor(frame, area, editor),
            Mode::ConfirmDelete(target) => self.draw_confirm(frame, area, target),
            Mode::Normal => {}
        }
    }

    fn draw_tabs(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = Tab::ALL
            .iter()
            .enumerate()
            .map(|(idx, tab)| Line::from(format!("{} {}", idx + 1, tab.title())))
            .collect();
        let tabs = Tabs::new(titles)
            .select(self.tab.index())
            .block(Block::default().borders(Borders::ALL).title(" COURS PRIVÉ "))
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(tabs, area);
    }

    fn pane_block(&self, title: impl Into<String>, focused: bool) -> Block<'static> {
        let border = if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let title: String = title.into();
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(title)
    }

    fn draw_student_list(&self, frame: &mut Frame, area: Rect) {
        let title = match self.list.filter_query() {
            Some(query) => format!("Liste des élèves • recherche: {query}"),
            None => "Liste des élèves".to_string(),
        };
        let block = self.pane_block(title, self.focus == Focus::Students);

        if self.list.students.is_empty() {
            let text = if self.list.filter_query().is_some() {
                "Aucun élève ne correspond à la recherche."
            } else {
                "Aucun élève. Appuyez sur 'a' pour en inscrire un."
            };
            draw_placeholder(frame, area, block, text);
            return;
        }

        let items = self
            .list
            .students
            .iter()
            .map(|s| ListItem::new(s.list_label()))
            .collect();
        render_list(frame, area, block, items, self.list.selected);
    }

    fn draw_info(&self, frame: &mut Frame, area: Rect) {
        let block = self.pane_block(Tab::Info.title(), false);
        let Some(student) = self.list.current() else {
            draw_placeholder(frame, area, block, "Sélectionnez un élève...");
            return;
        };

        let unread = self.detail.messages.iter().filter(|m| !m.read).count();
        let mut lines = vec![
            Line::from(Span::styled(
                format!("Code: {}", student.code),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(format!("Nom: {}", student.full_name())),
            Line::from(format!(
                "Classe: {} | Cycle: {} | Année: {}",
                student.classe, student.cycle, student.year
            )),
            Line::from(format!(
                "Téléphone: {}",
                student.phone.as_deref().unwrap_or("")
            )),
            Line::from(format!(
                "Photo: {}",
                student.photo.as_deref().unwrap_or("Aucune photo")
            )),
            Line::from(format!(
                "Total payé: {} | Messages non lus: {unread}",
                self.detail.total_paid()
            )),
            Line::from(""),
            Line::from("Notes:"),
        ];
        lines.extend(student.notes.lines().map(|line| Line::from(line.to_string())));

        let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn draw_lessons(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);

        let block = self.pane_block("Historique des cours", self.focus == Focus::Detail);
        if self.list.current().is_none() {
            draw_placeholder(frame, chunks[0], block, "Sélectionnez un élève...");
        } else if self.detail.lessons.is_empty() {
            draw_placeholder(frame, chunks[0], block, "Aucune leçon enregistrée.");
        } else {
            let items = self
                .detail
                .lessons
                .iter()
                .map(|l| ListItem::new(l.list_label()))
                .collect();
            render_list(frame, chunks[0], block, items, self.detail.lesson_cursor);
        }

        let readout = if self.list.current().is_some() {
            self.detail.average.to_string()
        } else {
            "Sélectionnez un élève...".to_string()
        };
        let summary = Paragraph::new(vec![
            Line::from(Span::styled(
                readout,
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            key_hints(&[("l", "Ajouter leçon")]),
            key_hints(&[("g", "Ajouter contrôle / note")]),
            key_hints(&[("x", "Supprimer leçon")]),
        ])
        .block(self.pane_block("Calculs & Bulletins", false))
        .wrap(Wrap { trim: true });
        frame.render_widget(summary, chunks[1]);
    }

    fn draw_messages(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        let block = self.pane_block("Messages", self.focus == Focus::Detail);
        if self.list.current().is_none() {
            draw_placeholder(frame, chunks[0], block, "Sélectionnez un élève...");
        } else if self.detail.messages.is_empty() {
            draw_placeholder(frame, chunks[0], block, "Aucun message.");
        } else {
            let items = self
                .detail
                .messages
                .iter()
                .map(|m| {
                    let style = if m.read {
                        Style::default()
                    } else {
                        Style::default().fg(Color::Yellow)
                    };
                    ListItem::new(m.list_label()).style(style)
                })
                .collect();
            render_list(frame, chunks[0], block, items, self.detail.message_cursor);
        }

        let lines = match self.detail.current_message() {
            Some(message) => {
                let mut lines = vec![
                    Line::from(format!("De: {}", message.sender)),
                    Line::from(format!("Date: {}", message.date)),
                    Line::from(if message.read { "Lu" } else { "Non lu" }),
                    Line::from(""),
                ];
                lines.extend(message.content.lines().map(|l| Line::from(l.to_string())));
                lines
            }
            None => vec![Line::from("Aucun message sélectionné.")],
        };
        let paragraph = Paragraph::new(lines)
            .block(self.pane_block("Contenu", false))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, chunks[1]);
    }

    fn draw_registration(&self, frame: &mut Frame, area: Rect) {
        let block = self.pane_block(Tab::Registration.title(), false);
        let mut lines = vec![
            Line::from(Span::styled(
                "Formulaire inscription",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from("Champs: Code*, Prénom*, Nom, Classe, Cycle, Année, Téléphone parent, Photo"),
            Line::from(""),
            key_hints(&[("a", "Nouvel élève"), ("e", "Modifier l'élève sélectionné")]),
            Line::from(""),
        ];
        if let Some(student) = self.list.current() {
            lines.push(Line::from(format!("Élève sélectionné: {student}")));
            lines.push(Line::from(format!(
                "Photo: {}",
                student.photo.as_deref().unwrap_or("Aucune photo")
            )));
        }
        let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn draw_reports(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(6), Constraint::Min(0)])
            .split(area);

        let actions = Paragraph::new(vec![
            key_hints(&[("c", "Exporter élèves CSV"), ("v", "Exporter paiements CSV")]),
            key_hints(&[("b", "Générer bulletin (HTML)"), ("p", "Ajouter paiement")]),
            key_hints(&[("h", "Ouvrir dossier photos")]),
            Line::from(format!("Exports: {}", self.config.export_dir.display())),
        ])
        .block(self.pane_block("Exports & paiements", false))
        .wrap(Wrap { trim: true });
        frame.render_widget(actions, chunks[0]);

        let title = format!("Paiements • total: {}", self.detail.total_paid());
        let block = self.pane_block(title, self.focus == Focus::Detail);
        if self.list.current().is_none() {
            draw_placeholder(frame, chunks[1], block, "Sélectionnez un élève...");
        } else if self.detail.payments.is_empty() {
            draw_placeholder(frame, chunks[1], block, "Aucun paiement enregistré.");
        } else {
            let items = self
                .detail
                .payments
                .iter()
                .map(|p| ListItem::new(p.list_label()))
                .collect();
            render_list(frame, chunks[1], block, items, self.detail.payment_cursor);
        }
    }

    fn draw_planning(&self, frame: &mut Frame, area: Rect) {
        let block = self.pane_block("Planning simple", false);
        let Some(student) = self.list.current() else {
            draw_placeholder(frame, area, block, "Sélectionnez un élève...");
            return;
        };
        let text = if student.notes.is_empty() {
            "Aucune note. Appuyez sur 'n' pour écrire le planning.".to_string()
        } else {
            student.notes.clone()
        };
        let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("Prêt")
        };

        let paragraph =
            Paragraph::new(vec![status_line, self.footer_instructions()]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        match &self.mode {
            Mode::Searching(_) => key_hints(&[
                ("↑↓", "Élève"),
                ("Entrée", "Valider"),
                ("Échap", "Effacer"),
            ]),
            Mode::Editing { .. } => key_hints(&[
                ("Tab", "Champ suivant"),
                ("Entrée", "Enregistrer"),
                ("Échap", "Annuler"),
            ]),
            Mode::EditingNotes { .. } => key_hints(&[
                ("Ctrl+S", "Enregistrer"),
                ("Entrée", "Nouvelle ligne"),
                ("Échap", "Annuler"),
            ]),
            Mode::ConfirmDelete(_) => key_hints(&[("o/y", "Confirmer"), ("n/Échap", "Annuler")]),
            Mode::Normal => match self.tab {
                Tab::Lessons => key_hints(&[
                    ("l", "Leçon"),
                    ("g", "Note"),
                    ("x", "Supprimer leçon"),
                    ("←→", "Panneau"),
                    ("Tab", "Onglet"),
                    ("q", "Quitter"),
                ]),
                Tab::Messages => key_hints(&[
                    ("m", "Écrire"),
                    ("o", "Marquer lu"),
                    ("←→", "Panneau"),
                    ("Tab", "Onglet"),
                    ("q", "Quitter"),
                ]),
                Tab::Reports => key_hints(&[
                    ("p", "Paiement"),
                    ("c", "CSV élèves"),
                    ("v", "CSV paiements"),
                    ("b", "Bulletin"),
                    ("h", "Photos"),
                    ("Tab", "Onglet"),
                    ("q", "Quitter"),
                ]),
                Tab::Planning => key_hints(&[
                    ("n", "Modifier le planning"),
                    ("Tab", "Onglet"),
                    ("q", "Quitter"),
                ]),
                Tab::Info | Tab::Registration => key_hints(&[
                    ("↑↓", "Élève"),
                    ("/", "Rechercher"),
                    ("a", "Ajouter"),
                    ("e", "Modifier"),
                    ("d", "Supprimer"),
                    ("r", "Rafraîchir"),
                    ("Tab", "Onglet"),
                    ("q", "Quitter"),
                ]),
            },
        }
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect, state: &SearchState) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let block = Block::default().borders(Borders::ALL).title("Recherche");
        let paragraph = Paragraph::new(Span::raw(format!("Recherche: {}", state.query)))
            .block(block.clone())
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x + "Recherche: ".chars().count() as u16 + state.query.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn draw_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &Form) {
        let popup_area = centered_rect(60, 60, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title.to_string()).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = (0..form.fields.len()).map(|idx| form.build_line(idx)).collect();
        lines.push(Line::from(""));
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Entrée pour enregistrer • Tab pour changer de champ • Échap pour annuler",
                Style::default().fg(Color::Gray),
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let cursor_x = inner.x + form.cursor_offset() as u16;
        let cursor_y = inner.y + form.active as u16;
        frame.set_cursor_position((cursor_x, cursor_y));
    }

    fn draw_notes_editor(&self, frame: &mut Frame, area: Rect, editor: &NotesEditor) {
        let popup_area = centered_rect(70, 70, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Planning • Ctrl+S pour enregistrer, Échap pour annuler")
            .borders(Borders::ALL);
        let inner = block.inner(popup_area);
        let paragraph = Paragraph::new(editor.text.clone()).block(block);
        frame.render_widget(paragraph, popup_area);

        let (col, row) = editor.cursor();
        frame.set_cursor_position((inner.x + col as u16, inner.y + row as u16));
    }

    fn draw_confirm(&self, frame: &mut Frame, area: Rect, target: &DeleteTarget) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Confirmer").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(target.prompt()),
            Line::from(target.warning()),
            Line::from(""),
            Line::from(Span::styled(
                "O / Y pour confirmer, N / Échap pour annuler.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }
}

fn render_list(
    frame: &mut Frame,
    area: Rect,
    block: Block<'static>,
    items: Vec<ListItem<'static>>,
    selected: usize,
) {
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .highlight_symbol("> ");
    let mut state = ListState::default().with_selected(Some(selected));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_placeholder(frame: &mut Frame, area: Rect, block: Block<'static>, text: &'static str) {
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(block);
    frame.render_widget(paragraph, area);
}

fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use crate::db::{list_lessons, list_messages, open_in_memory};
    use crate::models::StudentFields;

    fn scratch(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("cours-prive-app-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn test_app(name: &str) -> App {
        let root = scratch(name);
        let config = AppConfig::with_data_dir(root.join("data"), root.join("exports"));
        config.prepare().unwrap();
        App::load(open_in_memory().unwrap(), config).unwrap()
    }

    fn press(app: &mut App, code: KeyCode) {
        assert!(!app.handle_key(code).unwrap());
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    fn seed_student(app: &mut App, code: &str, first: &str) -> i64 {
        let fields = StudentFields {
            code: code.into(),
            first_name: first.into(),
            last_name: "Diallo".into(),
            ..StudentFields::default()
        };
        let id = create_student(&app.conn, &fields).unwrap();
        app.reload_students(Some(id)).unwrap();
        id
    }

    fn status_text(app: &App) -> &str {
        app.status.as_ref().map(|s| s.text.as_str()).unwrap_or("")
    }

    #[test]
    fn registers_student_through_form() {
        let mut app = test_app("register");
        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.tab, Tab::Registration);
        type_text(&mut app, "E01");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "Awa");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "Diallo");
        press(&mut app, KeyCode::Enter);

        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(status_text(&app), "Élève enregistré.");
        let student = app.list.current().unwrap();
        assert_eq!(student.code, "E01");
        assert_eq!(student.full_name(), "Awa Diallo");
    }

    #[test]
    fn duplicate_code_keeps_form_open() {
        let mut app = test_app("duplicate");
        seed_student(&mut app, "E01", "Awa");

        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "E01");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "Moussa");
        press(&mut app, KeyCode::Enter);

        match &app.mode {
            Mode::Editing { form, .. } => {
                assert_eq!(form.error.as_deref(), Some("Le code élève E01 existe déjà."))
            }
            _ => panic!("form should stay open"),
        }
        assert_eq!(app.list.students.len(), 1);
    }

    #[test]
    fn actions_without_selection_prompt() {
        let mut app = test_app("no-selection");
        press(&mut app, KeyCode::Char('2'));
        press(&mut app, KeyCode::Char('l'));
        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(status_text(&app), "Sélectionnez un élève.");

        press(&mut app, KeyCode::Char('e'));
        assert_eq!(status_text(&app), "Sélectionnez un élève à modifier.");
    }

    #[test]
    fn edit_keeps_target_in_form_mode() {
        let mut app = test_app("edit");
        let id = seed_student(&mut app, "E01", "Awa");

        press(&mut app, KeyCode::Char('e'));
        assert!(matches!(
            app.mode,
            Mode::Editing {
                target: FormTarget::EditStudent(target),
                ..
            } if target == id
        ));
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, " Marie");
        press(&mut app, KeyCode::Enter);

        assert_eq!(get_student(&app.conn, id).unwrap().unwrap().first_name, "Awa Marie");
    }

    #[test]
    fn grade_entry_updates_average() {
        let mut app = test_app("grade");
        let id = seed_student(&mut app, "E01", "Awa");

        press(&mut app, KeyCode::Char('2'));
        press(&mut app, KeyCode::Char('g'));
        type_text(&mut app, "Contrôle 1");
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Backspace);
        type_text(&mut app, "15");
        press(&mut app, KeyCode::Enter);

        assert_eq!(list_lessons(&app.conn, id).unwrap().len(), 1);
        assert_eq!(app.detail.average.to_string(), "Moyenne: 15.00 (1 notes)");
    }

    #[test]
    fn deleting_student_after_confirmation_cascades() {
        let mut app = test_app("delete");
        let id = seed_student(&mut app, "E01", "Awa");
        add_lesson(&app.conn, id, "2025-10-01", "Fractions", 60, "").unwrap();
        add_message(&app.conn, id, "Prof", "Bonjour").unwrap();

        press(&mut app, KeyCode::Char('d'));
        assert!(matches!(app.mode, Mode::ConfirmDelete(_)));
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.list.students.len(), 1);

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('o'));
        assert!(app.list.students.is_empty());
        assert!(list_lessons(&app.conn, id).unwrap().is_empty());
        assert!(list_messages(&app.conn, id).unwrap().is_empty());
    }

    #[test]
    fn confirmed_delete_closes_dialog_even_if_reload_fails() {
        let mut app = test_app("delete-reload");
        let id = seed_student(&mut app, "E01", "Awa");
        add_lesson(&app.conn, id, "2025-10-01", "Fractions", 60, "").unwrap();
        app.reload_students(Some(id)).unwrap();
        app.conn.execute_batch("DROP TABLE messages").unwrap();

        press(&mut app, KeyCode::Char('2'));
        press(&mut app, KeyCode::Char('x'));
        assert!(matches!(app.mode, Mode::ConfirmDelete(_)));
        press(&mut app, KeyCode::Char('o'));

        assert!(matches!(app.mode, Mode::Normal));
        assert!(list_lessons(&app.conn, id).unwrap().is_empty());
        assert_eq!(app.status.as_ref().map(|s| &s.kind), Some(&StatusKind::Error));
    }

    #[test]
    fn live_search_filters_and_escape_clears() {
        let mut app = test_app("search");
        seed_student(&mut app, "E01", "Awa");
        seed_student(&mut app, "E02", "Moussa");

        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "Mou");
        assert_eq!(app.list.students.len(), 1);
        assert_eq!(app.list.current().unwrap().code, "E02");

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.list.students.len(), 1);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.list.students.len(), 2);
    }

    #[test]
    fn marks_selected_message_read() {
        let mut app = test_app("messages");
        let id = seed_student(&mut app, "E01", "Awa");
        add_message(&app.conn, id, "Prof", "Bonjour").unwrap();
        app.reload_students(Some(id)).unwrap();

        press(&mut app, KeyCode::Char('3'));
        press(&mut app, KeyCode::Char('o'));
        assert_eq!(status_text(&app), "Message marqué comme lu.");
        assert!(list_messages(&app.conn, id).unwrap()[0].read);
    }

    #[test]
    fn planning_notes_are_saved_with_ctrl_s() {
        let mut app = test_app("planning");
        let id = seed_student(&mut app, "E01", "Awa");

        press(&mut app, KeyCode::Char('6'));
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "Lundi 18h");
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "Jeudi 17h");
        app.handle_ctrl_s().unwrap();

        assert!(matches!(app.mode, Mode::Normal));
        let student = get_student(&app.conn, id).unwrap().unwrap();
        assert_eq!(student.notes, "Lundi 18h\nJeudi 17h");
        assert_eq!(student.code, "E01");
    }

    #[test]
    fn exports_students_from_reports_tab() {
        let mut app = test_app("export");
        seed_student(&mut app, "E01", "Awa");

        press(&mut app, KeyCode::Char('5'));
        press(&mut app, KeyCode::Char('c'));
        let path = app.config.export_dir.join("students_export.csv");
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("code,last_name,first_name"));
        assert!(status_text(&app).starts_with("CSV créé: "));
    }

    #[test]
    fn quit_key_exits() {
        let mut app = test_app("quit");
        assert!(app.handle_key(KeyCode::Char('q')).unwrap());
    }
}
