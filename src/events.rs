// WheelSense — Shared Value Types

// ---------------------------------------------------------------------------
// Display Mode — what the screen currently shows
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    Speed,
    DailyDistance,
    TotalDistance,
    MaxSpeed,
    AverageSpeed,
    MovingTime,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 6] = [
        Self::Speed,
        Self::DailyDistance,
        Self::TotalDistance,
        Self::MaxSpeed,
        Self::AverageSpeed,
        Self::MovingTime,
    ];

    /// Next mode in the display cycle (wraps around).
    pub fn next(self) -> Self {
        match self {
            Self::Speed         => Self::DailyDistance,
            Self::DailyDistance => Self::TotalDistance,
            Self::TotalDistance => Self::MaxSpeed,
            Self::MaxSpeed      => Self::AverageSpeed,
            Self::AverageSpeed  => Self::MovingTime,
            Self::MovingTime    => Self::Speed,
        }
    }

    /// Screen title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Speed         => "SPEED",
            Self::DailyDistance => "TRIP",
            Self::TotalDistance => "ODO",
            Self::MaxSpeed      => "MAX",
            Self::AverageSpeed  => "AVG",
            Self::MovingTime    => "TIME",
        }
    }
}

// ---------------------------------------------------------------------------
// Button Events — produced by the input classifier
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    /// Released before the short-press limit: cycle the display.
    ShortPress,
    /// Held past the long-press threshold: context reset. Fires once per hold.
    LongPress,
}

/// A long press as the reset monitor sees it: the mode that was on screen
/// when the press fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetRequest {
    pub mode: DisplayMode,
}
