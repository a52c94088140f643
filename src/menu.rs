use crate::gate::GateKind;

#[derive(Clone, Debug)]
pub struct MenuItem {
    pub name: &'static str,
    pub kind: GateKind,
    pub symbol: &'static str,
    /// Example shown in the parameter prompt.
    pub param_hint: Option<&'static str>,
}

impl MenuItem {
    pub fn needs_target(&self) -> bool {
        self.kind.is_two_qubit()
    }

    pub fn needs_param(&self) -> bool {
        self.kind.is_parameterized()
    }
}

#[derive(Clone, Debug)]
pub struct MenuCategory {
    pub name: &'static str,
    pub items: &'static [MenuItem],
}

pub static GATE_MENU: &[MenuCategory] = &[
    MenuCategory {
        name: "Single Qubit",
        items: &[
            MenuItem { name: "Hadamard",          kind: GateKind::H,   symbol: "H",  param_hint: None },
            MenuItem { name: "Pauli-X (NOT)",     kind: GateKind::X,   symbol: "X",  param_hint: None },
            MenuItem { name: "Pauli-Y",           kind: GateKind::Y,   symbol: "Y",  param_hint: None },
            MenuItem { name: "Pauli-Z",           kind: GateKind::Z,   symbol: "Z",  param_hint: None },
            MenuItem { name: "Phase (S)",         kind: GateKind::S,   symbol: "S",  param_hint: None },
            MenuItem { name: "Phase Dagger (S†)", kind: GateKind::Sdg, symbol: "S†", param_hint: None },
            MenuItem { name: "T Gate",            kind: GateKind::T,   symbol: "T",  param_hint: None },
            MenuItem { name: "T Dagger (T†)",     kind: GateKind::Tdg, symbol: "T†", param_hint: None },
            MenuItem { name: "√X (SX)",           kind: GateKind::Sx,  symbol: "√X", param_hint: None },
        ],
    },
    MenuCategory {
        name: "Rotation",
        items: &[
            MenuItem { name: "Rotate X",    kind: GateKind::Rx, symbol: "RX", param_hint: Some("pi/2") },
            MenuItem { name: "Rotate Y",    kind: GateKind::Ry, symbol: "RY", param_hint: Some("pi/2") },
            MenuItem { name: "Rotate Z",    kind: GateKind::Rz, symbol: "RZ", param_hint: Some("pi/2") },
            MenuItem { name: "Phase Shift", kind: GateKind::P,  symbol: "P",  param_hint: Some("pi/4") },
        ],
    },
    MenuCategory {
        name: "Two Qubit",
        items: &[
            MenuItem { name: "CNOT",         kind: GateKind::Cx,   symbol: "●─⊕", param_hint: None },
            MenuItem { name: "Controlled-Y", kind: GateKind::Cy,   symbol: "●─Y", param_hint: None },
            MenuItem { name: "Controlled-Z", kind: GateKind::Cz,   symbol: "●─●", param_hint: None },
            MenuItem { name: "Controlled-H", kind: GateKind::Ch,   symbol: "●─H", param_hint: None },
            MenuItem { name: "SWAP",         kind: GateKind::Swap, symbol: "×─×", param_hint: None },
        ],
    },
    MenuCategory {
        name: "Measurement",
        items: &[
            MenuItem { name: "Measure", kind: GateKind::Measure, symbol: "M", param_hint: None },
        ],
    },
];
