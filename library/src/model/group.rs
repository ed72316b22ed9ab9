//! Named visual clusters of nodes. Purely organizational.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::node::Position;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        Rect {
            left,
            top,
            width: self.right().max(other.right()) - left,
            height: self.bottom().max(other.bottom()) - top,
        }
    }

    pub fn expand(&self, padding: f64) -> Rect {
        Rect {
            left: self.left - padding,
            top: self.top - padding,
            width: self.width + padding * 2.0,
            height: self.height + padding * 2.0,
        }
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect {
            left: self.left + dx,
            top: self.top + dy,
            ..*self
        }
    }

    pub fn contains(&self, point: Position) -> bool {
        point.x >= self.left
            && point.x <= self.right()
            && point.y >= self.top
            && point.y <= self.bottom()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: Uuid,
    pub text: String,
    pub rect: Rect,
    /// Member node ids. Ids that no longer exist are ignored during layout.
    #[serde(default)]
    pub links: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
}

impl Group {
    pub fn new(text: &str, rect: Rect, links: Vec<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.to_string(),
            rect,
            links,
            bg_color: None,
            font_color: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_union_and_expand() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 5.0, 10.0, 20.0);
        let u = a.union(&b);
        assert_eq!(u, Rect::new(0.0, 0.0, 30.0, 25.0));
        assert_eq!(u.expand(5.0), Rect::new(-5.0, -5.0, 40.0, 35.0));
        assert!(u.contains(Position::new(15.0, 12.0)));
    }

    #[test]
    fn test_group_json_shape() {
        let group = Group::new("Inputs", Rect::new(1.0, 2.0, 3.0, 4.0), vec![]);
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["rect"]["left"], 1.0);
        assert!(json.get("bgColor").is_none());
        let back: Group = serde_json::from_value(json).unwrap();
        assert_eq!(back, group);
    }
}
