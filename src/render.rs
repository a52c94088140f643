use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use crate::app::{App, Focus};
use crate::gate::GateKind;
use crate::grid::CellInfo;
use crate::menu::GATE_MENU;
use crate::params::format_param;

// ── Colors ─────────────────────────────────────────────────────────────────

const BLUE: Color = Color::Rgb(122, 162, 247);
const PURPLE: Color = Color::Rgb(187, 154, 247);
const GREEN: Color = Color::Rgb(158, 206, 106);
const ORANGE: Color = Color::Rgb(255, 158, 100);
const CYAN: Color = Color::Rgb(115, 218, 202);
const YELLOW: Color = Color::Rgb(224, 175, 104);
const DIM: Color = Color::Rgb(86, 95, 137);
const RED: Color = Color::Rgb(247, 118, 142);
const DARK_BLUE: Color = Color::Rgb(192, 202, 245);

// ── Layout constants ────────────────────────────────────────────────────────

const CELL_W: usize = 11;
const LABEL_W: usize = 7; // "q[N]  ──"
const GATE_NAME_W: usize = 5;

pub fn render(f: &mut Frame, app: &mut App) {
    let size = f.area();

    let ctrl_height = 3u16;
    let avail_h = size.height.saturating_sub(ctrl_height);

    let code_w = (size.width / 3).max(30).min(size.width.saturating_sub(20));
    let left_w = size.width.saturating_sub(code_w);

    let sim_h = if avail_h < 20 { avail_h / 3 } else { 13 }
        .max(4)
        .min(avail_h.saturating_sub(3));
    let circuit_h = avail_h.saturating_sub(sim_h).max(1);

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(avail_h), Constraint::Length(ctrl_height)])
        .split(size);

    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(left_w), Constraint::Min(code_w)])
        .split(main_chunks[0]);

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(circuit_h), Constraint::Min(sim_h)])
        .split(top_chunks[0]);

    render_circuit_panel(f, app, left_chunks[0]);
    render_simulation_panel(f, app, left_chunks[1]);
    render_code_panel(f, app, top_chunks[1]);
    render_controls_panel(f, app, main_chunks[1]);

    match app.focus {
        Focus::Menu => render_menu_overlay(f, app),
        Focus::InputParam => render_param_input_overlay(f, app),
        _ => {}
    }
}

// ── Circuit Panel ─────────────────────────────────────────────────────────────

fn render_circuit_panel(f: &mut Frame, app: &App, area: Rect) {
    let active = app.focus != Focus::Editor;
    let border_color = if active { ORANGE } else { BLUE };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(Span::styled(
            "Quantum Circuit",
            Style::default().fg(ORANGE).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let lines = build_circuit_lines(app, inner.width as usize);
    let text: Vec<Line> = lines.into_iter().map(Line::raw).collect();
    f.render_widget(Paragraph::new(Text::from(text)), inner);
}

fn build_circuit_lines(app: &App, width: usize) -> Vec<String> {
    let dims = app.view.dims;
    let mut lines: Vec<String> = Vec::new();

    let avail = width.saturating_sub(LABEL_W + 2);
    let max_steps = (avail / CELL_W).max(1);
    let start_step = (app.cursor_step + 1).saturating_sub(max_steps);
    let end_step = (start_step + max_steps).min(dims.num_steps);

    let mut step_hdr = " ".repeat(LABEL_W);
    for step in start_step..end_step {
        step_hdr.push_str(&pad_center(&format!("{step}"), CELL_W));
    }
    lines.push(step_hdr);

    let show_cursor = app.focus != Focus::Editor;
    for qubit in 0..dims.num_qubits {
        let mut top_line = " ".repeat(LABEL_W);
        let mut mid_line = format!("{:<5}", format!("q[{qubit}]")) + "──";
        let mut bot_line = " ".repeat(LABEL_W);

        for step in start_step..end_step {
            let info = app.view.cell_info(qubit, step);
            let here = step == app.cursor_step;
            let is_cursor = show_cursor && here && qubit == app.cursor_qubit;
            let is_target_sel =
                here && qubit == app.target_qubit && app.focus == Focus::SelectTarget;
            let is_carried = app.carrying.is_some_and(|(q, s)| {
                s == step && info.gate.as_ref().is_some_and(|g| g.qubit() == q && g.step() == s)
            });

            let (top, mid, bot) = render_cell(&info, is_cursor || is_target_sel, is_carried);
            top_line.push_str(&top);
            mid_line.push_str(&mid);
            bot_line.push_str(&bot);
        }

        lines.push(top_line);
        lines.push(mid_line);
        lines.push(bot_line);
    }

    match app.focus {
        Focus::SelectTarget => {
            let gate = app.pending.map(|k| k.to_string()).unwrap_or_default();
            lines.push(format!(
                "  {gate} Select target: q[{}]  ↑↓ Move  Enter Confirm  Esc Cancel",
                app.target_qubit
            ));
        }
        _ => {
            let mut status = format!(
                "  Position: Step {}, Qubit {}",
                app.cursor_step, app.cursor_qubit
            );
            if let Some(gate) = app.view.cell_info(app.cursor_qubit, app.cursor_step).gate {
                if let Some(theta) = gate.parameter() {
                    status.push_str(&format!("  │  {}({})", gate.kind(), format_param(theta)));
                }
            }
            if !app.status_msg.is_empty() {
                status.push_str(&format!("  │  {}", app.status_msg));
            }
            lines.push(status);
        }
    }

    lines
}

fn render_cell(info: &CellInfo, highlighted: bool, carried: bool) -> (String, String, String) {
    let empty = " ".repeat(CELL_W);
    let half = CELL_W / 2;
    let vert_row = " ".repeat(half) + "│" + &" ".repeat(CELL_W - half - 1);

    let dash_l = (CELL_W - 1) / 2;
    let dash_r = CELL_W - dash_l - 1;

    if highlighted {
        let inner_w = CELL_W - 2;
        let dleft = (inner_w - 1) / 2;
        let dright = inner_w - dleft - 1;
        let (h, v) = if carried { ("┅", "┇") } else { ("═", "║") };
        let top = format!("╔{}╗", h.repeat(inner_w));
        let bot = format!("╚{}╝", h.repeat(inner_w));

        let mid = match &info.gate {
            Some(gate) if info.is_control => {
                format!("{v}{}{}{}{v}", "─".repeat(dleft), control_symbol(gate.kind()), "─".repeat(dright))
            }
            Some(gate) if info.is_target => {
                format!("{v}{}{}{}{v}", "─".repeat(dleft), target_symbol(gate.kind()), "─".repeat(dright))
            }
            Some(gate) => format!("{v}─┤{}├─{v}", pad_center(&gate_display_name(gate.kind()), GATE_NAME_W)),
            None if info.pass_through => format!("{v}{}┼{}{v}", "─".repeat(dleft), "─".repeat(dright)),
            None => format!("{v}{}{v}", "─".repeat(inner_w)),
        };
        return (top, mid, bot);
    }

    let Some(gate) = &info.gate else {
        if info.pass_through {
            let mid = "─".repeat(dash_l) + "┼" + &"─".repeat(dash_r);
            return (vert_row.clone(), mid, vert_row);
        }
        let top = if info.vert_above { vert_row.clone() } else { empty.clone() };
        let bot = if info.vert_below { vert_row } else { empty };
        return (top, "─".repeat(CELL_W), bot);
    };

    if info.is_control || info.is_target {
        let sym = if info.is_control {
            control_symbol(gate.kind())
        } else {
            target_symbol(gate.kind())
        };
        let top = if info.vert_above { vert_row.clone() } else { empty.clone() };
        let mid = "─".repeat(dash_l) + sym + &"─".repeat(dash_r);
        let bot = if info.vert_below { vert_row } else { empty };
        return (top, mid, bot);
    }

    let margin = (CELL_W - GATE_NAME_W - 2) / 2;
    let rmargin = CELL_W - margin - GATE_NAME_W - 2;
    let name = pad_center(&gate_display_name(gate.kind()), GATE_NAME_W);
    let edge = if carried { "┄" } else { "─" };
    let top = " ".repeat(margin) + "┌" + &edge.repeat(GATE_NAME_W) + "┐" + &" ".repeat(rmargin);
    let mid = "─".repeat(margin) + "┤" + &name + "├" + &"─".repeat(rmargin);
    let bot = " ".repeat(margin) + "└" + &edge.repeat(GATE_NAME_W) + "┘" + &" ".repeat(rmargin);
    (top, mid, bot)
}

fn control_symbol(kind: GateKind) -> &'static str {
    if kind == GateKind::Swap { "×" } else { "●" }
}

fn target_symbol(kind: GateKind) -> &'static str {
    match kind {
        GateKind::Cz => "●",
        GateKind::Swap => "×",
        GateKind::Cy => "Y",
        GateKind::Ch => "H",
        _ => "⊕",
    }
}

fn gate_display_name(kind: GateKind) -> String {
    match kind {
        GateKind::Measure => "M".to_string(),
        GateKind::Sdg => "S†".to_string(),
        GateKind::Tdg => "T†".to_string(),
        GateKind::Sx => "√X".to_string(),
        other => other.to_string(),
    }
}

fn pad_center(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.chars().take(width).collect();
    }
    let total = width - len;
    let left = total / 2;
    let right = total - left;
    " ".repeat(left) + s + &" ".repeat(right)
}

// ── Simulation Panel ──────────────────────────────────────────────────────────

fn render_simulation_panel(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(RED))
        .title(Span::styled(
            "Probabilities",
            Style::default().fg(ORANGE).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut text_lines: Vec<Line> = Vec::new();
    match &app.sim_result {
        _ if app.simulation_pending() => {
            text_lines.push(Line::styled("Running...", Style::default().fg(DIM)));
        }
        None => {
            text_lines.push(Line::styled("Press r to simulate the circuit", Style::default().fg(DIM)));
        }
        Some(Err(err)) => {
            text_lines.push(Line::styled(err.to_string(), Style::default().fg(RED)));
        }
        Some(Ok(state)) => {
            let mut outcomes: Vec<(String, f64)> = state.distribution().into_iter().collect();
            outcomes.sort_by(|a, b| b.1.total_cmp(&a.1));

            let bar_width = (inner.width as usize).saturating_sub(30).max(10);
            for (bits, prob) in outcomes.iter().take(16) {
                let fill = ((prob * bar_width as f64).round() as usize).min(bar_width);
                let bar = "█".repeat(fill) + &"░".repeat(bar_width - fill);
                text_lines.push(Line::styled(
                    format!("|{bits}⟩: P={prob:.2} [{bar}]"),
                    Style::default().fg(YELLOW),
                ));
            }
            if outcomes.len() > 16 {
                text_lines.push(Line::styled(
                    format!("... and {} more states", outcomes.len() - 16),
                    Style::default().fg(DIM),
                ));
            }

            text_lines.push(Line::default());
            for (q, p) in state.qubit_probabilities().iter().enumerate() {
                let [x, y, z] = state.bloch_vector(q);
                text_lines.push(Line::styled(
                    format!("q[{q}] P(1)={:.2} bloch ({x:+.2}, {y:+.2}, {z:+.2})", p.prob1),
                    Style::default().fg(CYAN),
                ));
            }
        }
    }

    let p = Paragraph::new(Text::from(text_lines)).wrap(Wrap { trim: false });
    f.render_widget(p, inner);
}

// ── Code Panel ────────────────────────────────────────────────────────────────

fn render_code_panel(f: &mut Frame, app: &mut App, area: Rect) {
    let active = app.focus == Focus::Editor;
    let border_color = if active { ORANGE } else { PURPLE };
    let title = match (active, app.editor.is_dirty()) {
        (true, true) => "Program [ACTIVE] *",
        (true, false) => "Program [ACTIVE]",
        (false, _) => "Program",
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(Span::styled(title, Style::default().fg(ORANGE).add_modifier(Modifier::BOLD)));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let (text_area, error_area) = match &app.editor.error {
        Some(_) if inner.height > 3 => {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(1), Constraint::Length(2)])
                .split(inner);
            (chunks[0], Some(chunks[1]))
        }
        _ => (inner, None),
    };

    if let (Some(area), Some(err)) = (error_area, &app.editor.error) {
        let p = Paragraph::new(Span::styled(err.as_str(), Style::default().fg(RED)))
            .wrap(Wrap { trim: true });
        f.render_widget(p, area);
    }

    let inner_h = text_area.height as usize;
    if !active {
        let p = Paragraph::new(app.editor.text.as_str())
            .style(Style::default().fg(DARK_BLUE))
            .scroll((app.editor.scroll, 0));
        f.render_widget(p, text_area);
        return;
    }

    let (cursor_row, cursor_col) = app.editor.cursor_row_col();

    // Keep cursor in view
    if cursor_row < app.editor.scroll as usize {
        app.editor.scroll = cursor_row as u16;
    }
    if inner_h > 0 && cursor_row >= app.editor.scroll as usize + inner_h {
        app.editor.scroll = (cursor_row + 1 - inner_h) as u16;
    }
    let scroll = app.editor.scroll as usize;

    let mut lines: Vec<Line> = Vec::new();
    for (i, line_str) in app.editor.text.split('\n').enumerate().skip(scroll).take(inner_h) {
        if i != cursor_row {
            lines.push(Line::styled(line_str, Style::default().fg(DARK_BLUE)));
            continue;
        }
        let col = cursor_col.min(line_str.len());
        let before = &line_str[..col];
        let (cur_ch, after) = match line_str[col..].chars().next() {
            Some(ch) => {
                let end = col + ch.len_utf8();
                (&line_str[col..end], &line_str[end..])
            }
            None => (" ", ""),
        };
        lines.push(Line::from(vec![
            Span::styled(before, Style::default().fg(DARK_BLUE)),
            Span::styled(cur_ch, Style::default().fg(Color::Black).bg(DARK_BLUE)),
            Span::styled(after, Style::default().fg(DARK_BLUE)),
        ]));
    }

    f.render_widget(Paragraph::new(Text::from(lines)), text_area);
}

// ── Controls Panel ─────────────────────────────────────────────────────────────

fn render_controls_panel(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(GREEN));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let help = match app.focus {
        Focus::Editor => "Program:  Tab Apply & exit editor  Type to edit (applied after a pause)",
        _ if app.carrying.is_some() => "Move: ↑↓←→ Choose cell  m Drop  Esc Cancel",
        _ => "↑↓/jk Qubit  ←→/hl Step  a Add  Bksp Del  m Move  u/U Undo/Redo  r Run  Tab Code  Ctrl+S Save  Ctrl+E Export  q Quit",
    };

    f.render_widget(Paragraph::new(Span::styled(help, Style::default().fg(YELLOW))), inner);
}

// ── Menu Overlay ──────────────────────────────────────────────────────────────

fn render_menu_overlay(f: &mut Frame, app: &App) {
    let area = overlay_rect(f.area(), 60, 16);
    f.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ORANGE))
        .title(Span::styled("Add Gate", Style::default().fg(ORANGE).add_modifier(Modifier::BOLD)));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();

    let mut cat_line: Vec<Span> = Vec::new();
    for (i, cat) in GATE_MENU.iter().enumerate() {
        let name = format!(" {} ", cat.name);
        if i == app.menu_cat {
            cat_line.push(Span::styled(name, Style::default().fg(ORANGE).add_modifier(Modifier::BOLD)));
        } else {
            cat_line.push(Span::styled(name, Style::default().fg(DIM)));
        }
        if i < GATE_MENU.len() - 1 {
            cat_line.push(Span::styled("│", Style::default().fg(DIM)));
        }
    }
    lines.push(Line::from(cat_line));
    lines.push(Line::styled("─".repeat(42), Style::default().fg(DIM)));

    for (i, item) in GATE_MENU[app.menu_cat].items.iter().enumerate() {
        let mut spans: Vec<Span> = Vec::new();
        if i == app.menu_item {
            let sel = Style::default().fg(ORANGE).add_modifier(Modifier::BOLD);
            spans.push(Span::styled(" ▸ ", sel));
            spans.push(Span::styled(format!("{:<18}", item.name), sel));
            spans.push(Span::styled(item.symbol, Style::default().fg(CYAN).add_modifier(Modifier::BOLD)));
        } else {
            spans.push(Span::raw("   "));
            spans.push(Span::styled(format!("{:<18}", item.name), Style::default().fg(DARK_BLUE)));
            spans.push(Span::styled(item.symbol, Style::default().fg(DIM)));
        }
        if item.needs_target() {
            spans.push(Span::styled(" →target", Style::default().fg(DIM)));
        }
        if let Some(hint) = item.param_hint {
            spans.push(Span::styled(format!(" ({hint})"), Style::default().fg(DIM)));
        }
        lines.push(Line::from(spans));
    }

    lines.push(Line::styled("↑↓ Select  ←→ Cat  ⏎ Ok  Esc ✕", Style::default().fg(DIM)));

    f.render_widget(Paragraph::new(Text::from(lines)), inner);
}

fn render_param_input_overlay(f: &mut Frame, app: &App) {
    let area = overlay_rect(f.area(), 40, 7);
    f.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ORANGE))
        .title(Span::styled(
            "Enter Angle",
            Style::default().fg(ORANGE).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let lines = vec![
        Line::default(),
        Line::styled(format!("Value: {}_", app.param_input), Style::default().fg(DARK_BLUE)),
        Line::default(),
        Line::styled("Examples: pi/2, 3*pi/4, 1.57", Style::default().fg(DIM)),
    ];

    f.render_widget(Paragraph::new(Text::from(lines)), inner);
}

fn overlay_rect(screen: Rect, min_w: u16, min_h: u16) -> Rect {
    let w = min_w.min(screen.width.saturating_sub(4));
    let h = min_h.min(screen.height.saturating_sub(4));
    Rect {
        x: 2,
        y: 2,
        width: w,
        height: h,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppConfig;
    use crate::grid::{GridDims, GridModel};
    use crate::sync::SyncController;
    use ratatui::{Terminal, backend::TestBackend};

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buf = terminal.backend().buffer();
        buf.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn draws_gates_and_program() {
        let mut model = GridModel::new(GridDims::new(2, 4).unwrap());
        model.add_gate(GateKind::H, 0, 0, None, None).unwrap();
        model.add_gate(GateKind::Cx, 0, 1, Some(1), None).unwrap();
        let mut app = App::new(SyncController::new(model), AppConfig::default());

        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| render(f, &mut app)).unwrap();
        let screen = buffer_text(&terminal);
        assert!(screen.contains("Quantum Circuit"));
        assert!(screen.contains("┤  H  ├"));
        assert!(screen.contains("⊕"));
        assert!(screen.contains("cx q[0], q[1];"));
        assert!(screen.contains("Press r to simulate"));
    }

    #[test]
    fn simulation_panel_lists_per_qubit_probabilities() {
        use crate::quantum::{Simulator, StateVectorSimulator};

        let mut model = GridModel::new(GridDims::new(2, 2).unwrap());
        model.add_gate(GateKind::X, 1, 0, None, None).unwrap();
        let result = StateVectorSimulator::default().run(model.dims(), &model.snapshot());
        let mut app = App::new(SyncController::new(model), AppConfig::default());
        app.sim_result = Some(result);

        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| render(f, &mut app)).unwrap();
        let screen = buffer_text(&terminal);
        assert!(screen.contains("|10⟩: P=1.00"));
        assert!(screen.contains("q[0] P(1)=0.00"));
        assert!(screen.contains("q[1] P(1)=1.00"));
    }

    #[test]
    fn cell_drawing_connects_two_qubit_gates() {
        let mut model = GridModel::new(GridDims::new(3, 1).unwrap());
        model.add_gate(GateKind::Swap, 0, 0, Some(2), None).unwrap();
        let grid = model.grid();
        let (_, mid, bot) = render_cell(&grid.cell_info(0, 0), false, false);
        assert!(mid.contains('×'));
        assert!(bot.contains('│'));
        let (top, mid, _) = render_cell(&grid.cell_info(1, 0), false, false);
        assert!(mid.contains('┼'));
        assert!(top.contains('│'));
    }
}
