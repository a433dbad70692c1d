/// Device-space box with inclusive corners.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BBox {
    /// The box used when nothing is known: `x1 > x2`, so it is empty and never equal to a
    /// real clip.
    pub const EMPTY: Self = Self {
        x1: 0,
        y1: 0,
        x2: -1,
        y2: -1,
    };

    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn is_empty(&self) -> bool {
        self.x1 > self.x2 || self.y1 > self.y2
    }

    pub fn width(&self) -> i64 {
        i64::from(self.x2) - i64::from(self.x1) + 1
    }

    pub fn height(&self) -> i64 {
        i64::from(self.y2) - i64::from(self.y1) + 1
    }

    pub fn intersect(&self, other: &BBox) -> BBox {
        BBox {
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
            x2: self.x2.min(other.x2),
            y2: self.y2.min(other.y2),
        }
    }

    pub fn contains_row(&self, y: i32) -> bool {
        self.y1 <= y && y <= self.y2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_can_be_empty() {
        let a = BBox::new(0, 0, 9, 9);
        let b = BBox::new(5, 5, 20, 20);
        assert_eq!(a.intersect(&b), BBox::new(5, 5, 9, 9));
        assert_eq!(a.intersect(&b).width(), 5);
        assert!(a.intersect(&BBox::new(10, 0, 12, 3)).is_empty());
        assert!(BBox::EMPTY.is_empty());
    }
}
