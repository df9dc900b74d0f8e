use {
    crate::Vec2,
    std::ops::{Add, Mul, Sub},
};

/// Axis-aligned rectangle stored as origin (top-left) and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect<T> {
    pub origin: Vec2<T>,
    pub size: Vec2<T>,
}

impl<T: Default> Default for Rect<T> {
    fn default() -> Self {
        Self {
            origin: Vec2::zero(),
            size: Vec2::zero(),
        }
    }
}

impl<T> Rect<T> {
    pub fn new(origin: Vec2<T>, size: Vec2<T>) -> Self {
        Self { origin, size }
    }
}

impl<T: Sub<Output = T> + Copy> Rect<T> {
    pub fn from_min_max(min: Vec2<T>, max: Vec2<T>) -> Self {
        Self {
            origin: min,
            size: max - min,
        }
    }
}

impl<T: Add<Output = T> + Copy> Rect<T> {
    pub fn min(&self) -> Vec2<T> {
        self.origin
    }

    pub fn max(&self) -> Vec2<T> {
        self.origin + self.size
    }
}

impl<T: Mul<Output = T> + Copy> Rect<T> {
    pub fn area(&self) -> T {
        self.size.x * self.size.y
    }
}

fn max_of<T: PartialOrd>(a: T, b: T) -> T {
    if a > b { a } else { b }
}

fn min_of<T: PartialOrd>(a: T, b: T) -> T {
    if a < b { a } else { b }
}

impl<T: Add<Output = T> + Sub<Output = T> + PartialOrd + Copy> Rect<T> {
    pub fn intersects(&self, other: Rect<T>) -> bool {
        let self_max = self.max();
        let other_max = other.max();
        self.origin.x < other_max.x
            && other.origin.x < self_max.x
            && self.origin.y < other_max.y
            && other.origin.y < self_max.y
    }

    /// Overlapping region, `None` when the rectangles only touch or are apart.
    pub fn intersection(&self, other: Rect<T>) -> Option<Rect<T>> {
        if !self.intersects(other) {
            return None;
        }
        let min = Vec2::new(
            max_of(self.origin.x, other.origin.x),
            max_of(self.origin.y, other.origin.y),
        );
        let max = Vec2::new(
            min_of(self.max().x, other.max().x),
            min_of(self.max().y, other.max().y),
        );
        Some(Rect::from_min_max(min, max))
    }
}

impl Rect<f32> {
    /// Intersection over union, 0 for disjoint or degenerate boxes.
    pub fn iou(&self, other: Rect<f32>) -> f32 {
        match self.intersection(other) {
            None => 0.0,
            Some(inter) => {
                let union = self.area() + other.area() - inter.area();
                if union > 0.0 { inter.area() / union } else { 0.0 }
            }
        }
    }
}
