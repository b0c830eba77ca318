use plotters::style::RGBColor;

// =============================================================================
// Scene graph: what a plotting function produces and the backend draws
// =============================================================================

/// A complete figure as a list of panels of primitive draw commands.
/// The backend executes these blindly.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneGraph {
    pub width: u32,
    pub height: u32,
    pub panels: Vec<PanelScene>,
}

impl SceneGraph {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            panels: Vec::new(),
        }
    }

    pub fn command_count(&self) -> usize {
        self.panels.iter().map(|p| p.commands.len()).sum()
    }
}

/// Placement of a panel as fractions of the figure: left, top, width, height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub const FULL: Bounds = Bounds {
        left: 0.0,
        top: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AxisKind {
    Continuous,
    /// Integer positions 0..n labelled by level.
    Categorical(Vec<String>),
    /// Continuous values holding epoch seconds.
    Datetime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub label: Option<String>,
    pub kind: AxisKind,
    /// Coordinates on this axis are log10 of the data.
    pub log: bool,
    /// Fixed limits; when absent the range is fitted to the drawn commands.
    pub limits: Option<(f64, f64)>,
    /// Include zero without padding past it (bars, histograms).
    pub sticky_zero: bool,
    pub visible: bool,
    /// Final drawing range, filled in by `scale::fit_axes`.
    pub range: (f64, f64),
}

impl Axis {
    pub fn continuous(label: Option<String>) -> Self {
        Self {
            label,
            kind: AxisKind::Continuous,
            log: false,
            limits: None,
            sticky_zero: false,
            visible: true,
            range: (0.0, 1.0),
        }
    }

    pub fn categorical(label: Option<String>, levels: Vec<String>) -> Self {
        Self {
            kind: AxisKind::Categorical(levels),
            ..Self::continuous(label)
        }
    }

    pub fn hidden() -> Self {
        Self {
            visible: false,
            ..Self::continuous(None)
        }
    }

    pub fn with_log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    pub fn with_sticky_zero(mut self) -> Self {
        self.sticky_zero = true;
        self
    }

    pub fn with_limits(mut self, limits: (f64, f64)) -> Self {
        self.limits = Some(limits);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelScene {
    pub bounds: Bounds,
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub commands: Vec<DrawCommand>,
    pub legend_title: Option<String>,
    pub legend: Vec<LegendEntry>,
    /// Shared-axis group for faceted figures; panels with the same id get
    /// the same fitted ranges.
    pub share_group: Option<usize>,
}

impl PanelScene {
    pub fn new(x: Axis, y: Axis) -> Self {
        Self {
            bounds: Bounds::FULL,
            title: None,
            x,
            y,
            commands: Vec::new(),
            legend_title: None,
            legend: Vec::new(),
            share_group: None,
        }
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Circle,
    Square,
    Triangle,
    Diamond,
    Cross,
    Plus,
}

impl Marker {
    /// Marker cycle used for style levels.
    pub const CYCLE: [Marker; 6] = [
        Marker::Circle,
        Marker::Cross,
        Marker::Square,
        Marker::Plus,
        Marker::Triangle,
        Marker::Diamond,
    ];

    /// Matplotlib-style marker codes.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "o" | "." | "circle" => Some(Marker::Circle),
            "s" | "square" => Some(Marker::Square),
            "^" | "v" | "<" | ">" | "triangle" => Some(Marker::Triangle),
            "D" | "d" | "diamond" => Some(Marker::Diamond),
            "x" | "X" | "cross" => Some(Marker::Cross),
            "+" | "P" | "plus" => Some(Marker::Plus),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dash {
    Solid,
    Dashed,
    Dotted,
    DashDot,
}

impl Dash {
    pub const CYCLE: [Dash; 4] = [Dash::Solid, Dash::Dashed, Dash::Dotted, Dash::DashDot];
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineStyle {
    pub color: RGBColor,
    pub width: f64,
    pub dash: Dash,
    pub alpha: f64,
}

impl LineStyle {
    pub fn solid(color: RGBColor, width: f64) -> Self {
        Self {
            color,
            width,
            dash: Dash::Solid,
            alpha: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointStyle {
    pub color: RGBColor,
    /// Radius in pixels.
    pub size: f64,
    pub marker: Marker,
    pub alpha: f64,
    pub edge: Option<(RGBColor, f64)>,
}

impl PointStyle {
    pub fn new(color: RGBColor, size: f64) -> Self {
        Self {
            color,
            size,
            marker: Marker::Circle,
            alpha: 1.0,
            edge: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FillStyle {
    pub fill: Option<RGBColor>,
    pub edge: Option<(RGBColor, f64)>,
    pub alpha: f64,
}

impl FillStyle {
    pub fn filled(color: RGBColor) -> Self {
        Self {
            fill: Some(color),
            edge: None,
            alpha: 1.0,
        }
    }

    pub fn outline(color: RGBColor, width: f64) -> Self {
        Self {
            fill: None,
            edge: Some((color, width)),
            alpha: 1.0,
        }
    }

    pub fn with_edge(mut self, color: RGBColor, width: f64) -> Self {
        self.edge = Some((color, width));
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub color: RGBColor,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Line {
        points: Vec<(f64, f64)>,
        style: LineStyle,
    },
    Points {
        points: Vec<(f64, f64)>,
        style: PointStyle,
    },
    Rect {
        // Top-Left, Bottom-Right in data coordinates
        tl: (f64, f64),
        br: (f64, f64),
        style: FillStyle,
    },
    Polygon {
        points: Vec<(f64, f64)>,
        style: FillStyle,
    },
    /// Disconnected straight segments sharing one style.
    Segments {
        segments: Vec<[(f64, f64); 2]>,
        style: LineStyle,
    },
    Text {
        pos: (f64, f64),
        text: String,
        style: TextStyle,
    },
}

impl DrawCommand {
    /// Every coordinate the command touches, for range fitting.
    pub fn coords(&self) -> Vec<(f64, f64)> {
        match self {
            DrawCommand::Line { points, .. }
            | DrawCommand::Points { points, .. }
            | DrawCommand::Polygon { points, .. } => points.clone(),
            DrawCommand::Rect { tl, br, .. } => vec![*tl, *br],
            DrawCommand::Segments { segments, .. } => {
                segments.iter().flat_map(|s| s.iter().copied()).collect()
            }
            DrawCommand::Text { pos, .. } => vec![*pos],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Swatch {
    Marker(PointStyle),
    Line(LineStyle),
    Patch(RGBColor),
    /// Section title inside a legend holding several mappings.
    Heading,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub swatch: Swatch,
}
