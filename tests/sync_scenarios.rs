//! End-to-end grid ⇄ text scenarios through the controller.

use qgrid::{
    CircuitError, GateKind, GatePlacement, GridDims, GridModel, RenderSurface, Surfaces,
    SyncController, TextSurface,
};

#[derive(Default)]
struct Editor {
    text: String,
    error: Option<String>,
}

impl TextSurface for Editor {
    fn show_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    fn show_error(&mut self, error: Option<&CircuitError>) {
        self.error = error.map(ToString::to_string);
    }
}

#[derive(Default)]
struct View(Vec<GatePlacement>);

impl RenderSurface for View {
    fn redraw(&mut self, _dims: GridDims, placements: &[GatePlacement]) {
        self.0 = placements.to_vec();
    }
}

fn controller(q: usize, s: usize) -> SyncController {
    SyncController::new(GridModel::new(GridDims::new(q, s).unwrap()))
}

#[test]
fn hadamard_then_cnot_round_trips() {
    let mut sync = controller(2, 5);
    let (mut editor, mut view) = (Editor::default(), View::default());
    let mut s = Surfaces::new(&mut editor, &mut view);

    sync.place(GateKind::H, 0, 0, None, None, &mut s).unwrap();
    sync.place(GateKind::Cx, 0, 1, Some(1), None, &mut s).unwrap();
    drop(s);

    let body: Vec<&str> = editor.text.lines().skip(4).collect();
    assert_eq!(body, vec!["h q[0];", "cx q[0], q[1];"]);

    let mut fresh = controller(2, 5);
    let (mut editor2, mut view2) = (Editor::default(), View::default());
    let text = editor.text.clone();
    fresh
        .text_changed(&text, &mut Surfaces::new(&mut editor2, &mut view2))
        .unwrap();

    let grid = fresh.model().grid();
    assert_eq!(grid.len(), 2);
    assert_eq!(grid.anchored_at(0, 0).map(|g| g.kind()), Some(GateKind::H));
    let cx = grid.anchored_at(0, 1).unwrap();
    assert_eq!((cx.kind(), cx.target_qubit()), (GateKind::Cx, Some(1)));
    assert!(grid.is_occupied(1, 1));
    assert_eq!(view2.0.len(), 2);
}

#[test]
fn target_reservation_blocks_placement() {
    let mut sync = controller(2, 5);
    let (mut editor, mut view) = (Editor::default(), View::default());
    let mut s = Surfaces::new(&mut editor, &mut view);

    sync.place(GateKind::Cx, 0, 0, Some(1), None, &mut s).unwrap();
    let err = sync.place(GateKind::H, 1, 0, None, None, &mut s).unwrap_err();
    assert_eq!(err, CircuitError::OccupiedCell { qubit: 1, step: 0 });
    assert_eq!(sync.model().snapshot().len(), 1);
}

#[test]
fn rejected_text_never_reaches_the_grid() {
    let mut sync = controller(2, 3);
    let (mut editor, mut view) = (Editor::default(), View::default());
    let mut s = Surfaces::new(&mut editor, &mut view);
    sync.place(GateKind::Y, 1, 2, None, None, &mut s).unwrap();
    let before = sync.model().snapshot();
    let good = sync.last_good_text().to_string();

    for bad in [
        "cx q[0];",
        "rx q[0];",
        "h q[0], q[1];",
        "h q[2];",
        "rz(abc) q[0];",
        "cx q[1], q[1];",
        "h r[0];",
    ] {
        assert!(matches!(
            sync.text_changed(bad, &mut s),
            Err(CircuitError::Syntax(_))
        ), "{bad}");
        assert_eq!(sync.model().snapshot(), before);
        assert_eq!(sync.last_good_text(), good);
    }
    drop(s);
    assert!(editor.error.is_some());
}

#[test]
fn gate_after_measurement_is_refused_and_text_stays_importable() {
    let mut sync = controller(2, 2);
    let (mut editor, mut view) = (Editor::default(), View::default());
    let mut s = Surfaces::new(&mut editor, &mut view);

    sync.place(GateKind::Measure, 0, 0, None, None, &mut s).unwrap();
    sync.place(GateKind::X, 1, 0, None, None, &mut s).unwrap();
    assert!(matches!(
        sync.place(GateKind::Cx, 1, 1, Some(0), None, &mut s),
        Err(CircuitError::InvalidRange(_))
    ));
    drop(s);

    let mut fresh = controller(2, 2);
    let (mut editor2, mut view2) = (Editor::default(), View::default());
    fresh
        .text_changed(&editor.text, &mut Surfaces::new(&mut editor2, &mut view2))
        .unwrap();
    assert_eq!(fresh.model().snapshot(), sync.model().snapshot());
}
