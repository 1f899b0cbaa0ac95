use std::io::{self, BufRead, Write};
use std::str::FromStr;

use timetable_engine::editing::{EditDefaults, EditError, EditingSession, RowState};
use timetable_engine::persistence::{
    PersistenceError, export_class_agenda_csv, load_snapshot_from_json, save_snapshot_to_json,
};
use timetable_engine::period::parse_clock_time;
use timetable_engine::school_week::parse_weekday;
use timetable_engine::{
    AcademicYear, ClassId, EngineConfig, FacultyAssignment, MemoryScheduleStore, Period,
    PeriodType, ScheduleError, ScheduleKey, ScheduleStore, SubjectId, TeacherId, TimetableEngine,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Error: {0}")]
    Failed(String),
}

impl From<ScheduleError> for CliError {
    fn from(value: ScheduleError) -> Self {
        CliError::Failed(value.to_string())
    }
}

impl From<EditError> for CliError {
    fn from(value: EditError) -> Self {
        CliError::Failed(value.to_string())
    }
}

impl From<PersistenceError> for CliError {
    fn from(value: PersistenceError) -> Self {
        CliError::Failed(value.to_string())
    }
}

type CliResult = Result<(), CliError>;

fn render_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (cell, width) in cells.zip(widths) {
        line.push(' ');
        line.push_str(cell);
        line.push_str(&" ".repeat(width.saturating_sub(cell.len())));
        line.push_str(" |");
    }
    line
}

fn render_text_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (ci, cell) in row.iter().enumerate() {
            if cell.len() > widths[ci] {
                widths[ci] = cell.len();
            }
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&render_line(headers.iter().copied(), &widths));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in rows {
        out.push_str(&render_line(row.iter().map(String::as_str), &widths));
        out.push('\n');
    }
    out.push_str(&sep);
    out
}

fn period_cells(period: &Period) -> Vec<String> {
    vec![
        period.period_number.to_string(),
        period.time_range_label(),
        period.period_type.to_string(),
        period.subject_id.as_ref().map(ToString::to_string).unwrap_or_default(),
        period.teacher_id.as_ref().map(ToString::to_string).unwrap_or_default(),
        period.room.clone().unwrap_or_default(),
    ]
}

fn render_session(session: &EditingSession) -> String {
    let rows: Vec<Vec<String>> = session
        .rows()
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let state = match row.state() {
                RowState::Locked => "locked",
                RowState::Editing => "editing",
            };
            let mut cells = vec![index.to_string(), state.to_string()];
            cells.extend(period_cells(row.period()));
            cells
        })
        .collect();
    let marker = if session.has_unsaved_changes() { " (unsaved changes)" } else { "" };
    format!(
        "{} - version {}{marker}\n{}",
        session.key(),
        session.base_version(),
        render_text_table(
            &["row", "state", "no", "time", "type", "subject", "teacher", "room"],
            &rows
        )
    )
}

fn print_help() {
    println!(
        "Commands:\n  help                                  Show this help\n  year [<year>]                         Show or switch the academic year\n  open <class> <weekday>                Open a class's day for editing\n  show                                  Show the open day\n  add                                   Append a new row (editing)\n  edit <row>                            Unlock a row\n  lock <row>                            Stop editing a row, dropping unsaved edits\n  discard <row>                         Restore a row to its saved values\n  delete <row>                          Remove a row\n  set <row> time <HH:MM> <HH:MM>        Set start and end\n  set <row> type <class|break|assembly> Set the period type\n  set <row> subject <subject>           Set the subject\n  set <row> teacher <teacher>           Set the teacher\n  set <row> room <room|->               Set or clear the room\n  set <row> number <n>                  Set the period number\n  save                                  Validate and save the open day\n  choices                               Subjects and teachers for the open class\n  assign <class> <subject> <teacher>    Record a faculty assignment\n  agenda class <class>                  Weekly agenda of a class\n  agenda teacher <teacher>              Weekly agenda of a teacher\n  export json <path>                    Write the year's snapshot\n  import json <path>                    Load a snapshot through validation\n  export csv <class> <path>             Write a class agenda as CSV\n  quit|exit                             Exit"
    );
}

struct Repl<S> {
    engine: TimetableEngine<S>,
    year: AcademicYear,
    defaults: EditDefaults,
    session: Option<EditingSession>,
}

impl<S: ScheduleStore> Repl<S> {
    fn session_mut(&mut self) -> Result<&mut EditingSession, CliError> {
        self.session
            .as_mut()
            .ok_or_else(|| CliError::Failed("no day is open; use 'open <class> <weekday>'".into()))
    }

    fn show_session(&self) {
        if let Some(session) = &self.session {
            println!("{}", render_session(session));
        }
    }

    fn execute(&mut self, cmd: &str, args: &[&str]) -> CliResult {
        match cmd {
            "help" => print_help(),
            "year" => self.year_command(args)?,
            "open" => self.open(args)?,
            "show" => {
                self.session_mut()?;
                self.show_session();
            }
            "add" => {
                let index = self.session_mut()?.append_row();
                println!("Added row {index}.");
                self.show_session();
            }
            "edit" | "lock" | "discard" | "delete" => self.row_command(cmd, args)?,
            "set" => self.set(args)?,
            "save" => self.save()?,
            "choices" => self.choices()?,
            "assign" => self.assign(args)?,
            "agenda" => self.agenda(args)?,
            "export" => self.export(args)?,
            "import" => self.import(args)?,
            _ => println!("Unknown command. Type 'help'."),
        }
        Ok(())
    }

    fn year_command(&mut self, args: &[&str]) -> CliResult {
        if let Some(year) = args.first() {
            self.year = AcademicYear::new(*year);
            self.session = None;
        }
        println!("Academic year: {}", self.year);
        Ok(())
    }

    fn open(&mut self, args: &[&str]) -> CliResult {
        let [class, weekday] = args else {
            return Err(CliError::Usage("open <class> <weekday>"));
        };
        let weekday = parse_weekday(weekday)?;
        self.engine.school_week().ensure_teaching_day(weekday)?;
        let key = ScheduleKey::new(*class, weekday, self.year.clone());
        let session = EditingSession::open(&self.engine, key)?.with_defaults(self.defaults);
        println!("Opened {}.", session.key());
        self.session = Some(session);
        self.show_session();
        Ok(())
    }

    fn row_command(&mut self, cmd: &str, args: &[&str]) -> CliResult {
        let index = parse_row(args.first().copied())?;
        let session = self.session_mut()?;
        match cmd {
            "edit" => {
                session.unlock_row(index)?;
                println!("Row {index} unlocked.");
            }
            "lock" => {
                session.lock_row(index)?;
                println!("Row {index} locked.");
            }
            "discard" => {
                session.discard_row_edits(index)?;
                println!("Row {index} restored.");
            }
            _ => {
                session.delete_row(index)?;
                println!("Row {index} deleted.");
            }
        }
        self.show_session();
        Ok(())
    }

    fn set(&mut self, args: &[&str]) -> CliResult {
        const USAGE: &str = "set <row> <time|type|subject|teacher|room|number> <value...>";
        let (Some(row), Some(field)) = (args.first(), args.get(1)) else {
            return Err(CliError::Usage(USAGE));
        };
        let index = parse_row(Some(row))?;
        let values = &args[2..];
        let session = self.session_mut()?;
        match (*field, values) {
            ("time", [start, end]) => {
                let start = parse_time(start)?;
                let end = parse_time(end)?;
                session.set_times(index, start, end)?;
            }
            ("type", [value]) => {
                let period_type = PeriodType::from_str(value).map_err(|_| {
                    CliError::Failed(format!("unknown period type '{value}'"))
                })?;
                session.set_period_type(index, period_type)?;
            }
            ("subject", [value]) => session.set_subject(index, SubjectId::new(*value))?,
            ("teacher", [value]) => session.set_teacher(index, TeacherId::new(*value))?,
            ("room", ["-"]) => session.set_room(index, None)?,
            ("room", words) if !words.is_empty() => {
                session.set_room(index, Some(words.join(" ")))?
            }
            ("number", [value]) => {
                let number = value
                    .parse::<u32>()
                    .map_err(|_| CliError::Failed(format!("invalid period number '{value}'")))?;
                session.set_period_number(index, number)?;
            }
            _ => return Err(CliError::Usage(USAGE)),
        }
        println!("Row {index} {field} set.");
        self.show_session();
        Ok(())
    }

    fn save(&mut self) -> CliResult {
        let Some(session) = self.session.as_mut() else {
            return Err(CliError::Failed("no day is open; use 'open <class> <weekday>'".into()));
        };
        match session.save(&self.engine) {
            Ok(saved) => {
                println!("Saved {} as version {}.", saved.key(), saved.version);
                self.show_session();
                Ok(())
            }
            Err(err) => Err(CliError::Failed(format!(
                "save rejected, nothing was written: {err}"
            ))),
        }
    }

    fn choices(&mut self) -> CliResult {
        let session = self.session_mut()?;
        let rows: Vec<Vec<String>> = session
            .choices()
            .subjects
            .iter()
            .map(|(subject, teachers)| {
                let teachers: Vec<&str> = teachers.iter().map(|t| t.as_str()).collect();
                vec![subject.to_string(), teachers.join(", ")]
            })
            .collect();
        println!("{}", render_text_table(&["subject", "teachers"], &rows));
        Ok(())
    }

    fn assign(&mut self, args: &[&str]) -> CliResult {
        let [class, subject, teacher] = args else {
            return Err(CliError::Usage("assign <class> <subject> <teacher>"));
        };
        let assignment = FacultyAssignment::new(*class, *subject, *teacher);
        if self.engine.record_assignment(&self.year, &assignment)? {
            println!("Assignment recorded.");
        } else {
            println!("Assignment already present.");
        }
        let reopen = self
            .session
            .as_ref()
            .filter(|s| s.key().class_id == assignment.class_id && !s.has_unsaved_changes())
            .map(|s| s.key().clone());
        if let Some(key) = reopen {
            self.session = Some(EditingSession::open(&self.engine, key)?.with_defaults(self.defaults));
        }
        Ok(())
    }

    fn agenda(&mut self, args: &[&str]) -> CliResult {
        match args {
            ["class", class] => {
                let agenda = self.engine.weekly_agenda(&ClassId::new(*class), &self.year)?;
                let rows: Vec<Vec<String>> = agenda
                    .days
                    .iter()
                    .flat_map(|day| {
                        day.periods.iter().map(move |period| {
                            let mut cells = vec![day.weekday.to_string()];
                            cells.extend(period_cells(period));
                            cells
                        })
                    })
                    .collect();
                println!("Agenda of class {} ({})", agenda.class_id, agenda.academic_year);
                println!(
                    "{}",
                    render_text_table(
                        &["day", "no", "time", "type", "subject", "teacher", "room"],
                        &rows
                    )
                );
            }
            ["teacher", teacher] => {
                let agenda = self
                    .engine
                    .teacher_agenda(&TeacherId::new(*teacher), &self.year)?;
                let rows: Vec<Vec<String>> = agenda
                    .days
                    .iter()
                    .flat_map(|day| {
                        day.periods.iter().map(move |entry| {
                            vec![
                                day.weekday.to_string(),
                                entry.class_id.to_string(),
                                entry.period.period_number.to_string(),
                                entry.period.time_range_label(),
                                entry.subject_id().map(ToString::to_string).unwrap_or_default(),
                                entry.period.room.clone().unwrap_or_default(),
                            ]
                        })
                    })
                    .collect();
                println!(
                    "Agenda of teacher {} ({})",
                    agenda.teacher_id, agenda.academic_year
                );
                println!(
                    "{}",
                    render_text_table(&["day", "class", "no", "time", "subject", "room"], &rows)
                );
            }
            _ => return Err(CliError::Usage("agenda class <class> | agenda teacher <teacher>")),
        }
        Ok(())
    }

    fn export(&mut self, args: &[&str]) -> CliResult {
        match args {
            ["json", path] => {
                let snapshot = self.engine.export_snapshot(&self.year)?;
                save_snapshot_to_json(&snapshot, path)?;
                println!(
                    "Exported {} schedules and {} assignments to {path}",
                    snapshot.schedules.len(),
                    snapshot.assignments.len()
                );
            }
            ["csv", class, path] => {
                let agenda = self.engine.weekly_agenda(&ClassId::new(*class), &self.year)?;
                export_class_agenda_csv(&agenda, path)?;
                println!("Agenda of class {class} exported to {path}");
            }
            _ => return Err(CliError::Usage("export json <path> | export csv <class> <path>")),
        }
        Ok(())
    }

    fn import(&mut self, args: &[&str]) -> CliResult {
        let ["json", path] = args else {
            return Err(CliError::Usage("import json <path>"));
        };
        let snapshot = load_snapshot_from_json(path)?;
        let year = snapshot.academic_year.clone();
        let summary = self.engine.import_snapshot(snapshot)?;
        println!(
            "Imported {} schedules and {} new assignments for {year} from {path}",
            summary.schedules_saved, summary.assignments_added
        );
        if year != self.year {
            self.year = year;
            self.session = None;
            println!("Academic year: {}", self.year);
        }
        Ok(())
    }
}

fn parse_row(raw: Option<&str>) -> Result<usize, CliError> {
    let raw = raw.ok_or(CliError::Usage("<command> <row>"))?;
    raw.parse::<usize>()
        .map_err(|_| CliError::Failed(format!("invalid row '{raw}'")))
}

fn parse_time(raw: &str) -> Result<chrono::NaiveTime, CliError> {
    parse_clock_time(raw).ok_or_else(|| CliError::Failed(format!("invalid time '{raw}' (HH:MM)")))
}

fn run<S: ScheduleStore>(config: &EngineConfig, store: S) {
    let mut repl = Repl {
        engine: TimetableEngine::with_school_week(store, config.school_week.clone()),
        year: config.academic_year.clone(),
        defaults: config.edit_defaults(),
        session: None,
    };

    println!("Timetable (CLI) - academic year {} - type 'help' for commands\n", repl.year);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let Some(Ok(line)) = lines.next() else {
            break;
        };
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            continue;
        };
        if matches!(cmd, "quit" | "exit") {
            break;
        }
        let args: Vec<&str> = parts.collect();
        if let Err(err) = repl.execute(cmd, &args) {
            println!("{err}");
        }
    }
}

fn main() {
    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match &config.db_path {
        #[cfg(feature = "sqlite")]
        Some(path) => match timetable_engine::SqliteScheduleStore::new(path) {
            Ok(store) => run(&config, store),
            Err(err) => {
                eprintln!("cannot open {}: {err}", path.display());
                std::process::exit(1);
            }
        },
        #[cfg(not(feature = "sqlite"))]
        Some(_) => {
            eprintln!("TIMETABLE_DB_PATH is set but the sqlite feature is disabled");
            std::process::exit(2);
        }
        None => run(&config, MemoryScheduleStore::new()),
    }
}
