/// On-screen rectangle of a feed cell, in the feed's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn mid_y(&self) -> f32 {
        self.y + self.height.max(0.0) / 2.0
    }

    /// Vertical distance between this rectangle's midpoint and `center_y`.
    pub fn distance_to(&self, center_y: f32) -> f32 {
        (self.mid_y() - center_y).abs()
    }
}
