use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::info;
use tracing_subscriber::EnvFilter;

use qgrid::app::{App, AppConfig, Focus};
use qgrid::grid::{GridDims, GridModel};
use qgrid::menu::GATE_MENU;
use qgrid::project::{Project, read_program};
use qgrid::sync::SyncController;
use qgrid::{codegen, parser, render};

/// Terminal quantum circuit editor with a live program view
#[derive(Parser)]
#[command(name = "qgrid")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Write logs to this file (the terminal belongs to the editor)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Number of qubits for a new circuit
    #[arg(long, default_value = "3")]
    qubits: usize,

    /// Number of time steps for a new circuit
    #[arg(long, default_value = "16")]
    steps: usize,

    /// Open a saved project (JSON)
    #[arg(long, conflicts_with = "program")]
    project: Option<PathBuf>,

    /// Import a program text file into a new circuit
    #[arg(long)]
    program: Option<PathBuf>,

    /// Quiet period before edited program text is applied
    #[arg(long, default_value = "600")]
    debounce_ms: u64,

    /// Keep at most this many undo snapshots
    #[arg(long)]
    history_limit: Option<usize>,

    /// Where Ctrl+E writes the program text
    #[arg(long, default_value = "circuit.qasm")]
    export_path: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the program text of a saved project
    Export {
        /// Project file (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build a project from program text
    Import {
        /// Program text file
        #[arg(short, long)]
        input: PathBuf,

        /// Output project file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Grid qubits
        #[arg(long, default_value = "3")]
        qubits: usize,

        /// Grid steps
        #[arg(long, default_value = "16")]
        steps: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    match &cli.command {
        Some(Commands::Export { input, output }) => export(input, output.as_deref()),
        Some(Commands::Import {
            input,
            output,
            qubits,
            steps,
        }) => import(input, output.as_deref(), *qubits, *steps),
        None => run_editor(&cli),
    }
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let Some(path) = &cli.log_file else {
        return Ok(());
    };
    let file = File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();
    Ok(())
}

fn export(input: &Path, output: Option<&Path>) -> Result<()> {
    let model = Project::load(input)?.into_model(None)?;
    let text = codegen::generate(model.dims(), &model.snapshot());
    match output {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("cannot write {}", path.display()))?;
            info!(path = %path.display(), "exported program");
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn import(input: &Path, output: Option<&Path>, qubits: usize, steps: usize) -> Result<()> {
    let dims = GridDims::new(qubits, steps)?;
    let text = read_program(input)?;
    let placements = parser::parse(&text, dims)
        .with_context(|| format!("cannot import {}", input.display()))?;
    let model = GridModel::from_placements(dims, placements, None)?;
    let project = Project::from_model(&model);
    match output {
        Some(path) => project.save(path)?,
        None => println!("{}", project.to_json()?),
    }
    Ok(())
}

fn build_controller(cli: &Cli) -> Result<SyncController> {
    let model = if let Some(path) = &cli.project {
        Project::load(path)?.into_model(cli.history_limit)?
    } else {
        let dims = GridDims::new(cli.qubits, cli.steps)?;
        let placements = match &cli.program {
            Some(path) => parser::parse(&read_program(path)?, dims)
                .with_context(|| format!("cannot import {}", path.display()))?,
            None => Vec::new(),
        };
        GridModel::from_placements(dims, placements, cli.history_limit)?
    };
    Ok(SyncController::new(model))
}

fn run_editor(cli: &Cli) -> Result<()> {
    let sync = build_controller(cli)?;
    let config = AppConfig {
        debounce: Duration::from_millis(cli.debounce_ms),
        project_path: cli.project.clone().unwrap_or_else(|| PathBuf::from("circuit.json")),
        export_path: cli.export_path.clone(),
    };
    let mut app = App::new(sync, config);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        app.tick(Instant::now());
        terminal.draw(|f| render::render(f, app))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        app.status_msg.clear();

        let code = key.code;
        let mods = key.modifiers;

        // Global: Ctrl+C always quits
        if code == KeyCode::Char('c') && mods.contains(KeyModifiers::CONTROL) {
            return Ok(());
        }

        match app.focus {
            Focus::Circuit => {
                if handle_circuit_keys(app, code, mods) {
                    return Ok(());
                }
            }
            Focus::Editor => handle_editor_keys(app, code),
            Focus::Menu => handle_menu_keys(app, code),
            Focus::SelectTarget => handle_select_target_keys(app, code),
            Focus::InputParam => handle_input_param_keys(app, code),
        }
    }
}

// ── Focus::Circuit ─────────────────────────────────────────────────────────────

fn handle_circuit_keys(app: &mut App, code: KeyCode, mods: KeyModifiers) -> bool {
    let ctrl = mods.contains(KeyModifiers::CONTROL);
    match code {
        KeyCode::Char('q') => return true,
        KeyCode::Tab => app.focus = Focus::Editor,
        KeyCode::Char('s') if ctrl => app.save_project(),
        KeyCode::Char('e') if ctrl => app.export_program(),
        KeyCode::Up | KeyCode::Char('k') => app.move_cursor(-1, 0),
        KeyCode::Down | KeyCode::Char('j') => app.move_cursor(1, 0),
        KeyCode::Left | KeyCode::Char('h') => app.move_cursor(0, -1),
        KeyCode::Right | KeyCode::Char('l') => app.move_cursor(0, 1),
        KeyCode::Char('a') if app.carrying.is_none() => app.open_menu(),
        KeyCode::Char('m') => app.pick_or_drop(),
        KeyCode::Esc => app.carrying = None,
        KeyCode::Backspace | KeyCode::Delete => app.delete_at_cursor(),
        KeyCode::Char('u') => app.undo(),
        KeyCode::Char('U') => app.redo(),
        KeyCode::Char('r') => app.run_simulation(),
        _ => {}
    }
    false
}

// ── Focus::Editor ──────────────────────────────────────────────────────────────

fn handle_editor_keys(app: &mut App, code: KeyCode) {
    if matches!(code, KeyCode::Tab | KeyCode::Esc) {
        app.flush_editor();
        app.focus = Focus::Circuit;
        return;
    }
    let editor = &mut app.editor;
    match code {
        KeyCode::Left => editor.move_left(),
        KeyCode::Right => editor.move_right(),
        KeyCode::Up => editor.move_up(),
        KeyCode::Down => editor.move_down(),
        KeyCode::Home => editor.move_home(),
        KeyCode::End => editor.move_end(),
        KeyCode::Backspace => editor.backspace(),
        KeyCode::Delete => editor.delete_forward(),
        KeyCode::Enter => editor.insert_char('\n'),
        KeyCode::Char(c) => editor.insert_char(c),
        _ => {}
    }
}

// ── Focus::Menu ────────────────────────────────────────────────────────────────

fn handle_menu_keys(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc => app.focus = Focus::Circuit,
        KeyCode::Up | KeyCode::Char('k') => {
            app.menu_item = app.menu_item.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            let max = GATE_MENU[app.menu_cat].items.len().saturating_sub(1);
            if app.menu_item < max {
                app.menu_item += 1;
            }
        }
        KeyCode::Left | KeyCode::Char('h') => {
            if app.menu_cat > 0 {
                app.menu_cat -= 1;
                app.menu_item = 0;
            }
        }
        KeyCode::Right | KeyCode::Char('l') => {
            if app.menu_cat + 1 < GATE_MENU.len() {
                app.menu_cat += 1;
                app.menu_item = 0;
            }
        }
        KeyCode::Enter => app.choose_menu_item(),
        _ => {}
    }
}

// ── Focus::SelectTarget ─────────────────────────────────────────────────────────

fn handle_select_target_keys(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc => app.cancel_pending(),
        KeyCode::Up | KeyCode::Char('k') => app.step_target(-1),
        KeyCode::Down | KeyCode::Char('j') => app.step_target(1),
        KeyCode::Enter => app.place_pending(Some(app.target_qubit)),
        _ => {}
    }
}

// ── Focus::InputParam ──────────────────────────────────────────────────────────

fn handle_input_param_keys(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc => app.cancel_pending(),
        KeyCode::Backspace => {
            app.param_input.pop();
        }
        KeyCode::Enter => app.confirm_param(),
        KeyCode::Char(c) => app.handle_param_char(c),
        _ => {}
    }
}
