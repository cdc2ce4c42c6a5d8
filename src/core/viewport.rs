use glam::UVec2;

/// Camera viewport - pixel dimensions of the active camera for a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Viewport {
    /// Create new viewport
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Total size in bytes for RGBA buffer
    pub fn buffer_size(&self) -> usize {
        self.pixel_count() * 4
    }

    /// True if either axis is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn extent(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }
}

impl From<UVec2> for Viewport {
    fn from(v: UVec2) -> Self {
        Self::new(v.x, v.y)
    }
}

impl std::str::FromStr for Viewport {
    type Err = String;

    /// Parse `WIDTHxHEIGHT`, e.g. `1920x1080`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width = w.parse().map_err(|e| format!("bad width '{}': {}", w, e))?;
        let height = h.parse().map_err(|e| format!("bad height '{}': {}", h, e))?;
        Ok(Self::new(width, height))
    }
}
