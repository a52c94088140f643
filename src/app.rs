use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::{CircuitError, SimulationError};
use crate::gate::{GateKind, GatePlacement};
use crate::grid::{CellInfo, CircuitGrid, GridDims};
use crate::menu::GATE_MENU;
use crate::params::parse_param_expr;
use crate::project::{Project, export_program};
use crate::quantum::{StateVector, StateVectorSimulator};
use crate::sync::{RenderSurface, Surfaces, SyncController, TextSurface};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Focus {
    Circuit,
    Editor,
    Menu,
    SelectTarget,
    InputParam,
}

/// Settings the binary passes through from the command line.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub debounce: Duration,
    pub project_path: PathBuf,
    pub export_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(600),
            project_path: PathBuf::from("circuit.json"),
            export_path: PathBuf::from("circuit.qasm"),
        }
    }
}

/// The program text pane. Holds the text as the user sees it, which may
/// differ from the last text the grid accepted.
#[derive(Debug, Default)]
pub struct CodeEditor {
    pub text: String,
    pub cursor: usize, // byte offset into text
    pub scroll: u16,
    pub error: Option<String>,
    edited_at: Option<Instant>,
}

impl TextSurface for CodeEditor {
    fn show_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.text.len();
        self.scroll = 0;
        self.edited_at = None;
    }

    fn show_error(&mut self, error: Option<&CircuitError>) {
        self.error = error.map(ToString::to_string);
    }
}

impl CodeEditor {
    pub fn is_dirty(&self) -> bool {
        self.edited_at.is_some()
    }

    fn touch(&mut self) {
        self.edited_at = Some(Instant::now());
    }

    /// True once the text has been quiet for `debounce`.
    pub fn settled(&self, now: Instant, debounce: Duration) -> bool {
        self.edited_at
            .is_some_and(|t| now.saturating_duration_since(t) >= debounce)
    }

    pub fn insert_char(&mut self, ch: char) {
        self.text.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
        self.touch();
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let pos = self.prev_boundary();
        self.text.remove(pos);
        self.cursor = pos;
        self.touch();
    }

    pub fn delete_forward(&mut self) {
        if self.cursor >= self.text.len() {
            return;
        }
        self.text.remove(self.cursor);
        self.touch();
    }

    fn prev_boundary(&self) -> usize {
        let mut pos = self.cursor.saturating_sub(1);
        while pos > 0 && !self.text.is_char_boundary(pos) {
            pos -= 1;
        }
        pos
    }

    pub fn cursor_row_col(&self) -> (usize, usize) {
        let cursor = self.cursor.min(self.text.len());
        let before = &self.text[..cursor];
        let row = before.bytes().filter(|&b| b == b'\n').count();
        let col = match before.rfind('\n') {
            Some(p) => before.len() - p - 1,
            None => before.len(),
        };
        (row, col)
    }

    pub fn move_left(&mut self) {
        if self.cursor > 0 {
            self.cursor = self.prev_boundary();
        }
    }

    pub fn move_right(&mut self) {
        if let Some(ch) = self.text[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    pub fn move_up(&mut self) {
        let (row, col) = self.cursor_row_col();
        if row > 0 {
            self.cursor = self.offset_of(row - 1, col);
        }
    }

    pub fn move_down(&mut self) {
        let (row, col) = self.cursor_row_col();
        if row + 1 < self.text.split('\n').count() {
            self.cursor = self.offset_of(row + 1, col);
        }
    }

    /// Byte offset of `(row, col)`, with `col` clamped to the line.
    fn offset_of(&self, row: usize, col: usize) -> usize {
        let mut off = 0;
        for (r, line) in self.text.split('\n').enumerate() {
            if r == row {
                let mut col = col.min(line.len());
                while !line.is_char_boundary(col) {
                    col -= 1;
                }
                return off + col;
            }
            off += line.len() + 1;
        }
        self.text.len()
    }

    pub fn move_home(&mut self) {
        let before = &self.text[..self.cursor];
        self.cursor = before.rfind('\n').map_or(0, |p| p + 1);
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text[self.cursor..]
            .find('\n')
            .map_or(self.text.len(), |p| self.cursor + p);
    }
}

/// The grid pane. Redrawn from controller snapshots only.
#[derive(Debug)]
pub struct CircuitView {
    pub dims: GridDims,
    grid: CircuitGrid,
}

impl CircuitView {
    pub fn new(dims: GridDims) -> Self {
        Self {
            dims,
            grid: CircuitGrid::new(),
        }
    }

    pub fn cell_info(&self, qubit: usize, step: usize) -> CellInfo {
        self.grid.cell_info(qubit, step)
    }

    pub fn gate_count(&self) -> usize {
        self.grid.len()
    }
}

impl RenderSurface for CircuitView {
    fn redraw(&mut self, dims: GridDims, placements: &[GatePlacement]) {
        self.dims = dims;
        self.grid = CircuitGrid::new();
        for gate in placements {
            if let Err(err) = self.grid.place(dims, gate.clone()) {
                warn!(error = %err, "snapshot placement rejected by view");
            }
        }
    }
}

pub struct App {
    pub sync: SyncController,
    pub editor: CodeEditor,
    pub view: CircuitView,
    pub config: AppConfig,
    pub cursor_qubit: usize,
    pub cursor_step: usize,
    pub focus: Focus,
    pub status_msg: String,

    // Menu state
    pub menu_cat: usize,
    pub menu_item: usize,

    // Gate placement pending state
    pub pending: Option<GateKind>,
    pub target_qubit: usize,
    pub param_input: String,
    pending_param: Option<f64>,

    /// Source cell of a gate picked up for moving.
    pub carrying: Option<(usize, usize)>,

    simulator: Arc<StateVectorSimulator>,
    sim_rx: Option<Receiver<Result<StateVector, SimulationError>>>,
    pub sim_result: Option<Result<StateVector, SimulationError>>,
}

impl App {
    pub fn new(sync: SyncController, config: AppConfig) -> Self {
        let dims = sync.dims();
        let mut app = App {
            sync,
            editor: CodeEditor::default(),
            view: CircuitView::new(dims),
            config,
            cursor_qubit: 0,
            cursor_step: 0,
            focus: Focus::Circuit,
            status_msg: String::new(),
            menu_cat: 0,
            menu_item: 0,
            pending: None,
            target_qubit: 0,
            param_input: String::new(),
            pending_param: None,
            carrying: None,
            simulator: Arc::new(StateVectorSimulator::default()),
            sim_rx: None,
            sim_result: None,
        };
        let mut s = Surfaces::new(&mut app.editor, &mut app.view);
        app.sync.grid_changed(&mut s);
        app
    }

    pub fn dims(&self) -> GridDims {
        self.sync.dims()
    }

    pub fn move_cursor(&mut self, dq: isize, ds: isize) {
        let dims = self.dims();
        self.cursor_qubit = self
            .cursor_qubit
            .saturating_add_signed(dq)
            .min(dims.num_qubits - 1);
        self.cursor_step = self
            .cursor_step
            .saturating_add_signed(ds)
            .min(dims.num_steps - 1);
    }

    pub fn open_menu(&mut self) {
        self.focus = Focus::Menu;
        self.menu_cat = 0;
        self.menu_item = 0;
    }

    /// Picks the highlighted palette entry and walks through whatever
    /// prompts it needs before placing.
    pub fn choose_menu_item(&mut self) {
        let item = &GATE_MENU[self.menu_cat].items[self.menu_item];
        self.pending = Some(item.kind);
        self.pending_param = None;
        self.param_input.clear();
        if item.needs_param() {
            self.focus = Focus::InputParam;
        } else {
            self.after_param();
        }
    }

    pub fn confirm_param(&mut self) {
        match parse_param_expr(&self.param_input) {
            Some(v) if v.is_finite() => {
                self.pending_param = Some(v);
                self.after_param();
            }
            _ => {
                self.status_msg = "Invalid parameter, use numbers or pi expressions (pi/2, 3*pi/4)".to_string();
            }
        }
    }

    fn after_param(&mut self) {
        let Some(kind) = self.pending else {
            self.focus = Focus::Circuit;
            return;
        };
        if kind.is_two_qubit() {
            let nq = self.dims().num_qubits;
            if nq < 2 {
                self.status_msg = format!("{kind} needs two qubits");
                self.cancel_pending();
                return;
            }
            self.target_qubit = if self.cursor_qubit + 1 < nq {
                self.cursor_qubit + 1
            } else {
                self.cursor_qubit - 1
            };
            self.focus = Focus::SelectTarget;
        } else {
            self.place_pending(None);
        }
    }

    pub fn step_target(&mut self, direction: isize) {
        let nq = self.dims().num_qubits as isize;
        let mut q = self.target_qubit as isize;
        loop {
            q += direction;
            if q < 0 || q >= nq {
                return;
            }
            if q as usize != self.cursor_qubit {
                self.target_qubit = q as usize;
                return;
            }
        }
    }

    pub fn place_pending(&mut self, target: Option<usize>) {
        let Some(kind) = self.pending else {
            return;
        };
        let mut s = Surfaces::new(&mut self.editor, &mut self.view);
        match self.sync.place(
            kind,
            self.cursor_qubit,
            self.cursor_step,
            target,
            self.pending_param,
            &mut s,
        ) {
            Ok(_) => {
                if self.cursor_step + 1 < self.dims().num_steps {
                    self.cursor_step += 1;
                }
            }
            Err(err) => self.status_msg = format!("Cannot place: {err}"),
        }
        self.cancel_pending();
    }

    pub fn cancel_pending(&mut self) {
        self.pending = None;
        self.pending_param = None;
        self.param_input.clear();
        self.focus = Focus::Circuit;
    }

    pub fn handle_param_char(&mut self, ch: char) {
        if matches!(ch, '0'..='9' | '.' | '-' | 'e' | 'E' | '+' | 'p' | 'i' | '*' | '/') {
            self.param_input.push(ch);
        }
    }

    pub fn delete_at_cursor(&mut self) {
        let mut s = Surfaces::new(&mut self.editor, &mut self.view);
        if !self.sync.remove(self.cursor_qubit, self.cursor_step, &mut s) {
            self.status_msg = "No gate here".to_string();
        }
    }

    /// First press picks up the gate under the cursor, second press drops it.
    pub fn pick_or_drop(&mut self) {
        let here = (self.cursor_qubit, self.cursor_step);
        match self.carrying.take() {
            None => match self.view.cell_info(here.0, here.1).gate {
                Some(gate) => {
                    self.carrying = Some((gate.qubit(), gate.step()));
                    self.status_msg = format!("Moving {}, m to drop, Esc to cancel", gate.kind());
                }
                None => self.status_msg = "No gate here".to_string(),
            },
            Some(from) => {
                let mut s = Surfaces::new(&mut self.editor, &mut self.view);
                if let Err(err) = self.sync.move_gate(from, here, &mut s) {
                    self.status_msg = format!("Cannot move: {err}");
                }
            }
        }
    }

    pub fn undo(&mut self) {
        let mut s = Surfaces::new(&mut self.editor, &mut self.view);
        if !self.sync.undo(&mut s) {
            self.status_msg = "Nothing to undo".to_string();
        }
    }

    pub fn redo(&mut self) {
        let mut s = Surfaces::new(&mut self.editor, &mut self.view);
        if !self.sync.redo(&mut s) {
            self.status_msg = "Nothing to redo".to_string();
        }
    }

    /// Hands the editor text to the controller if it changed since the
    /// last flush.
    pub fn flush_editor(&mut self) {
        if !self.editor.is_dirty() {
            return;
        }
        self.editor.edited_at = None;
        let text = self.editor.text.clone();
        let mut s = Surfaces::new(&mut self.editor, &mut self.view);
        // The controller already published the error to the editor.
        let _ = self.sync.text_changed(&text, &mut s);
    }

    /// Called once per event-loop iteration.
    pub fn tick(&mut self, now: Instant) {
        if self.editor.settled(now, self.config.debounce) {
            self.flush_editor();
        }
        self.poll_simulation();
    }

    pub fn run_simulation(&mut self) {
        self.sim_rx = Some(self.sync.simulate(Arc::clone(&self.simulator)));
        self.status_msg = "Simulating...".to_string();
    }

    pub fn simulation_pending(&self) -> bool {
        self.sim_rx.is_some()
    }

    pub fn poll_simulation(&mut self) {
        let Some(rx) = &self.sim_rx else {
            return;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err(SimulationError::Disconnected),
        };
        if let Err(err) = &result {
            self.status_msg = format!("Simulation failed: {err}");
        }
        self.sim_result = Some(result);
        self.sim_rx = None;
    }

    pub fn save_project(&mut self) {
        let project = Project::from_model(self.sync.model());
        self.status_msg = match project.save(&self.config.project_path) {
            Ok(()) => format!("Saved {}", self.config.project_path.display()),
            Err(e) => format!("Save error: {e}"),
        };
    }

    pub fn export_program(&mut self) {
        self.status_msg = match export_program(self.sync.model(), &self.config.export_path) {
            Ok(()) => format!("Exported {}", self.config.export_path.display()),
            Err(e) => format!("Export error: {e}"),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridModel;

    fn app(q: usize, s: usize) -> App {
        let model = GridModel::new(GridDims::new(q, s).unwrap());
        let config = AppConfig {
            debounce: Duration::from_millis(50),
            ..AppConfig::default()
        };
        App::new(SyncController::new(model), config)
    }

    fn select(app: &mut App, kind: GateKind) {
        let (cat, item) = GATE_MENU
            .iter()
            .enumerate()
            .find_map(|(c, cat)| cat.items.iter().position(|i| i.kind == kind).map(|i| (c, i)))
            .unwrap();
        app.open_menu();
        app.menu_cat = cat;
        app.menu_item = item;
        app.choose_menu_item();
    }

    #[test]
    fn starts_with_generated_header() {
        let app = app(3, 4);
        assert!(app.editor.text.contains("qreg q[3];"));
        assert!(!app.editor.is_dirty());
    }

    #[test]
    fn palette_places_two_qubit_gate_after_target_prompt() {
        let mut app = app(3, 4);
        select(&mut app, GateKind::Cx);
        assert_eq!(app.focus, Focus::SelectTarget);
        assert_eq!(app.target_qubit, 1);
        app.step_target(1);
        app.place_pending(Some(app.target_qubit));
        assert_eq!(app.focus, Focus::Circuit);
        assert!(app.editor.text.ends_with("cx q[0], q[2];\n"));
        assert!(app.view.cell_info(1, 0).pass_through);
        assert_eq!(app.cursor_step, 1);
    }

    #[test]
    fn parameter_prompt_rejects_garbage() {
        let mut app = app(1, 2);
        select(&mut app, GateKind::Rz);
        assert_eq!(app.focus, Focus::InputParam);
        app.param_input = "pi//".to_string();
        app.confirm_param();
        assert_eq!(app.focus, Focus::InputParam);
        app.param_input = "pi/4".to_string();
        app.confirm_param();
        assert!(app.editor.text.ends_with("rz(pi/4) q[0];\n"));
    }

    #[test]
    fn edits_apply_after_quiet_period() {
        let mut app = app(2, 4);
        app.editor.move_end();
        for ch in "x q[1];\n".chars() {
            app.editor.insert_char(ch);
        }
        let typed = Instant::now();
        app.tick(typed);
        assert_eq!(app.view.gate_count(), 0);
        app.tick(typed + Duration::from_millis(100));
        assert_eq!(app.view.gate_count(), 1);
        assert!(!app.editor.is_dirty());
    }

    #[test]
    fn bad_edit_shows_error_and_keeps_text() {
        let mut app = app(2, 4);
        app.editor.move_end();
        for ch in "bogus q[0];".chars() {
            app.editor.insert_char(ch);
        }
        app.flush_editor();
        assert!(app.editor.error.as_deref().is_some_and(|e| e.contains("bogus")));
        assert!(app.editor.text.ends_with("bogus q[0];"));
        assert_eq!(app.view.gate_count(), 0);
    }

    #[test]
    fn pick_up_and_drop_moves_gate() {
        let mut app = app(2, 4);
        select(&mut app, GateKind::H);
        app.cursor_step = 0;
        app.pick_or_drop();
        assert_eq!(app.carrying, Some((0, 0)));
        app.move_cursor(1, 2);
        app.pick_or_drop();
        assert!(app.carrying.is_none());
        assert!(app.view.cell_info(0, 0).gate.is_none());
        assert!(app.view.cell_info(1, 2).gate.is_some());
        app.undo();
        assert!(app.view.cell_info(0, 0).gate.is_some());
    }

    #[test]
    fn cursor_stays_on_grid() {
        let mut app = app(2, 3);
        app.move_cursor(-1, -1);
        assert_eq!((app.cursor_qubit, app.cursor_step), (0, 0));
        app.move_cursor(5, 5);
        assert_eq!((app.cursor_qubit, app.cursor_step), (1, 2));
    }

    #[test]
    fn simulation_result_arrives() {
        let mut app = app(1, 2);
        select(&mut app, GateKind::X);
        app.run_simulation();
        for _ in 0..200 {
            app.poll_simulation();
            if !app.simulation_pending() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let state = app.sim_result.as_ref().unwrap().as_ref().unwrap();
        assert!((state.distribution()["1"] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn editor_cursor_moves_by_line() {
        let mut ed = CodeEditor::default();
        ed.show_text("ab\ncdef\ng");
        ed.move_up();
        assert_eq!(ed.cursor_row_col(), (1, 1));
        ed.move_end();
        assert_eq!(ed.cursor_row_col(), (1, 4));
        ed.move_down();
        assert_eq!(ed.cursor_row_col(), (2, 1));
        ed.move_home();
        ed.backspace();
        assert_eq!(ed.text, "ab\ncdefg");
        assert!(ed.is_dirty());
    }
}
