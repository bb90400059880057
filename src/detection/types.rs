use serde::{Deserialize, Serialize};

/// Pixel coordinates of a located object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl Position {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in pixels
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x as f64 - other.x as f64;
        let dy = self.y as f64 - other.y as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Where the tracked object was in one frame, and how fast it moved to get there
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "frame")]
    pub frame_index: u64,
    pub x: u32,
    pub y: u32,
    pub speed_km_s: f64,
}

impl Detection {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Position::new(10, 10);
        let b = Position::new(13, 14);
        assert_eq!(a.distance_to(&b), 5.0);
        assert_eq!(b.distance_to(&a), 5.0);
        assert_eq!(a.distance_to(&a), 0.0);
    }

    #[test]
    fn test_detection_wire_names() {
        let detection = Detection { frame_index: 2, x: 20, y: 10, speed_km_s: 150000.0 };
        let json = serde_json::to_value(detection).unwrap();
        assert_eq!(json["frame"], 2);
        assert_eq!(json["x"], 20);
        assert_eq!(json["speed_km_s"], 150000.0);
    }
}
