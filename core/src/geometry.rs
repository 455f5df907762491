#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Placed size of an entity in scene coordinates; `x`/`y` is the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Footprint {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Footprint {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Inclusive on every edge.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GridShape {
    #[default]
    Square,
    Gridless,
    HexPointyTop,
    HexFlatTop,
}

impl GridShape {
    pub fn is_hex(self) -> bool {
        matches!(self, GridShape::HexPointyTop | GridShape::HexFlatTop)
    }
}

pub fn outline_points(footprint: &Footprint, shape: GridShape) -> Vec<Point> {
    let Footprint {
        x,
        y,
        width: w,
        height: h,
    } = *footprint;
    match shape {
        GridShape::HexPointyTop => vec![
            Point::new(x + w * 0.5, y),
            Point::new(x + w, y + h * 0.25),
            Point::new(x + w, y + h * 0.75),
            Point::new(x + w * 0.5, y + h),
            Point::new(x, y + h * 0.75),
            Point::new(x, y + h * 0.25),
        ],
        GridShape::HexFlatTop => vec![
            Point::new(x + w * 0.25, y),
            Point::new(x + w * 0.75, y),
            Point::new(x + w, y + h * 0.5),
            Point::new(x + w * 0.75, y + h),
            Point::new(x + w * 0.25, y + h),
            Point::new(x, y + h * 0.5),
        ],
        GridShape::Square | GridShape::Gridless => vec![
            Point::new(x, y),
            Point::new(x + w, y),
            Point::new(x + w, y + h),
            Point::new(x, y + h),
        ],
    }
}
