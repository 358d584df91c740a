use serde::{Deserialize, Serialize};

/// An integer pixel position in frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in frame pixels. Equality is positional.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Integer center, rounding toward the top-left.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// The rectangle without its top quarter: rows `y + h/4` to `y + h`.
    pub fn lower_three_quarters(&self) -> Rect {
        let skip = self.height / 4;
        Rect::new(self.x, self.y + skip, self.width, self.height - skip)
    }

    /// Intersection with a `width` x `height` frame, or `None` when nothing
    /// of the rectangle lies inside it.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.right().min(width as i32);
        let y2 = self.bottom().min(height as i32);
        let clamped = Rect::new(x1, y1, x2 - x1, y2 - y1);
        (!clamped.is_empty()).then_some(clamped)
    }

    /// Largest non-empty candidate by area. Equal areas resolve to the
    /// earliest one.
    pub fn largest(candidates: &[Rect]) -> Option<Rect> {
        candidates
            .iter()
            .filter(|c| !c.is_empty())
            .fold(None, |best: Option<Rect>, candidate| match best {
            Some(b) if candidate.area() <= b.area() => Some(b),
            _ => Some(*candidate),
        })
    }

    /// `[x, y, width, height]`, the layout used on the wire.
    pub fn to_array(&self) -> [i32; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_area_and_edges() {
        let r = Rect::new(10, 20, 30, 40);
        assert_eq!(r.area(), 1200);
        assert_eq!(r.right(), 40);
        assert_eq!(r.bottom(), 60);
    }

    #[test]
    fn test_center_rounds_down() {
        assert_eq!(Rect::new(100, 100, 80, 80).center(), Point::new(140, 140));
        assert_eq!(Rect::new(0, 0, 5, 5).center(), Point::new(2, 2));
    }

    #[test]
    fn test_lower_three_quarters() {
        let r = Rect::new(100, 100, 80, 80).lower_three_quarters();
        assert_eq!(r, Rect::new(100, 120, 80, 60));
    }

    #[rstest]
    #[case::inside(Rect::new(10, 10, 20, 20), Some(Rect::new(10, 10, 20, 20)))]
    #[case::overhangs_left_top(Rect::new(-5, -5, 20, 20), Some(Rect::new(0, 0, 15, 15)))]
    #[case::overhangs_right_bottom(Rect::new(90, 90, 20, 20), Some(Rect::new(90, 90, 10, 10)))]
    #[case::fully_outside(Rect::new(200, 200, 20, 20), None)]
    #[case::degenerate(Rect::new(10, 10, 0, 5), None)]
    fn test_clamp_to(#[case] rect: Rect, #[case] expected: Option<Rect>) {
        assert_eq!(rect.clamp_to(100, 100), expected);
    }

    #[test]
    fn test_largest_picks_biggest_area() {
        let candidates = [
            Rect::new(0, 0, 10, 10),
            Rect::new(50, 50, 30, 30),
            Rect::new(5, 5, 20, 20),
        ];
        assert_eq!(Rect::largest(&candidates), Some(Rect::new(50, 50, 30, 30)));
    }

    #[test]
    fn test_largest_tie_resolves_to_earliest() {
        let candidates = [
            Rect::new(0, 0, 10, 40),
            Rect::new(50, 50, 20, 20),
            Rect::new(90, 90, 40, 10),
        ];
        assert_eq!(Rect::largest(&candidates), Some(Rect::new(0, 0, 10, 40)));
        // Same set in another order still yields the first of the tied ones.
        let reordered = [candidates[2], candidates[0], candidates[1]];
        assert_eq!(Rect::largest(&reordered), Some(Rect::new(90, 90, 40, 10)));
    }

    #[test]
    fn test_largest_skips_empty_candidates() {
        let candidates = [Rect::new(10, 10, 0, 0), Rect::new(0, 0, -5, 40)];
        assert_eq!(Rect::largest(&candidates), None);
        let mixed = [Rect::new(10, 10, 0, 50), Rect::new(40, 40, 4, 4)];
        assert_eq!(Rect::largest(&mixed), Some(Rect::new(40, 40, 4, 4)));
    }

    #[test]
    fn test_largest_of_nothing() {
        assert_eq!(Rect::largest(&[]), None);
    }

    #[test]
    fn test_translate_and_array() {
        let r = Rect::new(1, 2, 3, 4).translate(10, 20);
        assert_eq!(r.to_array(), [11, 22, 3, 4]);
    }
}
