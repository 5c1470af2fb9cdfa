//! Viewport tool modes.
//!
//! Tools gate which gestures the viewport accepts:
//! - None: view only, pointer input ignored
//! - Draw: drag out a new box
//! - Select: pick, move, resize and delete boxes

/// Active tool mode for viewport manipulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    #[default]
    None,   // Esc - view only
    Draw,   // B - draw box
    Select, // Q - select/move/resize
}

impl ToolMode {
    /// All tool modes in order.
    pub const ALL: [ToolMode; 3] = [ToolMode::None, ToolMode::Draw, ToolMode::Select];

    /// Convert to string for settings storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolMode::None => "none",
            ToolMode::Draw => "draw",
            ToolMode::Select => "select",
        }
    }

    /// Parse from settings string. Unknown values fall back to None.
    pub fn parse(s: &str) -> Self {
        match s {
            "draw" | "bbox" => ToolMode::Draw,
            "select" => ToolMode::Select,
            _ => ToolMode::None,
        }
    }

    /// Display name for UI.
    pub fn display_name(&self) -> &'static str {
        match self {
            ToolMode::None => "View",
            ToolMode::Draw => "Draw BBox",
            ToolMode::Select => "Select",
        }
    }

    /// Hotkey for this tool.
    pub fn hotkey(&self) -> &'static str {
        match self {
            ToolMode::None => "Esc",
            ToolMode::Draw => "B",
            ToolMode::Select => "Q",
        }
    }
}
