use crate::config::RouterConfig;
use crate::model::Rect;

use super::types::{Route, RouteTemplate};

/// Landing point of a connector on its child: horizontal middle of the box,
/// `header_height` below its top edge.
pub fn child_anchor_point(child: &Rect, header_height: f32) -> (f32, f32) {
    (child.center_x(), child.top + header_height)
}

/// Route one connector. Pure: the same four inputs always give the same
/// polyline.
pub fn route(
    parent_anchor: (f32, f32),
    child_anchor: (f32, f32),
    parent: &Rect,
    child: &Rect,
    config: &RouterConfig,
) -> Route {
    let (x1, y1) = parent_anchor;
    let (x2, y2) = child_anchor;
    let dx = x2 - x1;

    if dx.abs() <= config.align_tolerance {
        return Route::new(RouteTemplate::Straight, vec![(x1, y1), (x1, y2)]);
    }

    let (template, points) = if dx > 0.0 {
        let landing_x = x2 - config.arrow_inset;
        if y2 < y1 || y2 - y1 < config.vertical_gap_threshold {
            let pivot_x = (parent.right() + child.left) / 2.0;
            (
                RouteTemplate::RightDetour,
                detour_points(parent_anchor, child_anchor, pivot_x, landing_x, config),
            )
        } else {
            (
                RouteTemplate::RightDrop,
                drop_points(parent_anchor, child_anchor, landing_x, config),
            )
        }
    } else {
        let landing_x = x2 + config.arrow_inset;
        if y2 < y1 {
            let pivot_x = (parent.left + child.right()) / 2.0;
            (
                RouteTemplate::LeftDetour,
                detour_points(parent_anchor, child_anchor, pivot_x, landing_x, config),
            )
        } else {
            (
                RouteTemplate::LeftDrop,
                drop_points(parent_anchor, child_anchor, landing_x, config),
            )
        }
    };

    Route::new(template, compress_path(&points))
}

fn detour_points(
    (x1, y1): (f32, f32),
    (_, y2): (f32, f32),
    pivot_x: f32,
    landing_x: f32,
    config: &RouterConfig,
) -> Vec<(f32, f32)> {
    let row_y = y1.min(y2) - config.rise + config.clearance;
    vec![
        (x1, y1),
        (pivot_x, y1),
        (pivot_x, row_y),
        (landing_x, row_y),
        (landing_x, y2),
    ]
}

fn drop_points(
    (x1, y1): (f32, f32),
    (_, y2): (f32, f32),
    landing_x: f32,
    config: &RouterConfig,
) -> Vec<(f32, f32)> {
    let row_y = y1 + config.clearance;
    vec![(x1, y1), (x1, row_y), (landing_x, row_y), (landing_x, y2)]
}

/// Drop repeated points so no zero-length segment survives; the first and last
/// points are always kept.
pub(crate) fn compress_path(points: &[(f32, f32)]) -> Vec<(f32, f32)> {
    let mut out: Vec<(f32, f32)> = Vec::with_capacity(points.len());
    for &point in points {
        if out.last() == Some(&point) {
            continue;
        }
        out.push(point);
    }
    if out.len() == 1 {
        out.push(out[0]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RouterConfig {
        RouterConfig::default()
    }

    #[test]
    fn right_child_slightly_below_detours_over_the_top() {
        let parent = Rect::new(0.0, 0.0, 200.0, 300.0);
        let child = Rect::new(400.0, 40.0, 200.0, 100.0);
        let route = route((150.0, 20.0), (500.0, 40.0), &parent, &child, &cfg());
        assert_eq!(route.template, RouteTemplate::RightDetour);
        assert_eq!(
            route.points,
            vec![
                (150.0, 20.0),
                (300.0, 20.0),
                (300.0, -77.0),
                (495.0, -77.0),
                (495.0, 40.0),
            ]
        );
        assert_eq!(route.arrow_segment(), Some(((495.0, -77.0), (495.0, 40.0))));
    }

    #[test]
    fn right_child_above_also_detours() {
        let parent = Rect::new(0.0, 200.0, 100.0, 100.0);
        let child = Rect::new(300.0, 0.0, 100.0, 50.0);
        let route = route((100.0, 250.0), (350.0, 0.0), &parent, &child, &cfg());
        assert_eq!(route.template, RouteTemplate::RightDetour);
        assert_eq!(route.points[2], (200.0, -97.0));
        assert_eq!(route.end(), Some((345.0, 0.0)));
    }

    #[test]
    fn right_child_far_below_drops_in_three_segments() {
        let parent = Rect::new(0.0, 0.0, 100.0, 100.0);
        let child = Rect::new(300.0, 300.0, 100.0, 50.0);
        let route = route((50.0, 100.0), (350.0, 300.0), &parent, &child, &cfg());
        assert_eq!(route.template, RouteTemplate::RightDrop);
        assert_eq!(route.segment_count(), 3);
        assert_eq!(
            route.points,
            vec![(50.0, 100.0), (50.0, 103.0), (345.0, 103.0), (345.0, 300.0)]
        );
    }

    #[test]
    fn gap_threshold_boundary_selects_drop() {
        let parent = Rect::new(0.0, 0.0, 100.0, 100.0);
        let child = Rect::new(300.0, 200.0, 100.0, 50.0);
        let route = route((50.0, 100.0), (350.0, 200.0), &parent, &child, &cfg());
        assert_eq!(route.template, RouteTemplate::RightDrop);
    }

    #[test]
    fn left_templates_mirror_right_ones() {
        let parent = Rect::new(400.0, 200.0, 200.0, 100.0);
        let above = Rect::new(0.0, 0.0, 200.0, 100.0);
        let below = Rect::new(0.0, 500.0, 200.0, 100.0);

        let up = route((500.0, 300.0), (100.0, 0.0), &parent, &above, &cfg());
        assert_eq!(up.template, RouteTemplate::LeftDetour);
        assert_eq!(up.points[1], (300.0, 300.0));
        assert_eq!(up.end(), Some((105.0, 0.0)));

        let down = route((500.0, 300.0), (100.0, 500.0), &parent, &below, &cfg());
        assert_eq!(down.template, RouteTemplate::LeftDrop);
        assert_eq!(down.end(), Some((105.0, 500.0)));
        assert!(down.is_orthogonal());
    }

    #[test]
    fn aligned_anchors_collapse_to_one_segment() {
        let parent = Rect::new(0.0, 0.0, 100.0, 100.0);
        let child = Rect::new(0.0, 300.0, 100.0, 100.0);
        let route = route((50.0, 100.0), (50.2, 300.0), &parent, &child, &cfg());
        assert_eq!(route.template, RouteTemplate::Straight);
        assert_eq!(route.points, vec![(50.0, 100.0), (50.0, 300.0)]);
    }

    #[test]
    fn every_template_is_orthogonal() {
        let parent = Rect::new(100.0, 100.0, 120.0, 80.0);
        for (cx, cy) in [(400.0, 90.0), (400.0, 600.0), (-300.0, -200.0), (-300.0, 400.0)] {
            let child = Rect::new(cx, cy, 80.0, 40.0);
            let anchor = child_anchor_point(&child, 10.0);
            let r = route((200.0, 140.0), anchor, &parent, &child, &cfg());
            assert!(r.is_orthogonal(), "{:?} not orthogonal", r.template);
            assert_eq!(r.start(), Some((200.0, 140.0)));
        }
    }

    #[test]
    fn routing_is_pure() {
        let parent = Rect::new(0.0, 0.0, 200.0, 300.0);
        let child = Rect::new(400.0, 40.0, 200.0, 100.0);
        let first = route((150.0, 20.0), (500.0, 40.0), &parent, &child, &cfg());
        let _other = route((0.0, 0.0), (-500.0, 40.0), &child, &parent, &cfg());
        let second = route((150.0, 20.0), (500.0, 40.0), &parent, &child, &cfg());
        assert_eq!(first, second);
    }

    #[test]
    fn compress_path_drops_zero_length_segments() {
        let points = vec![(0.0, 0.0), (0.0, 0.0), (0.0, 5.0), (0.0, 5.0)];
        assert_eq!(compress_path(&points), vec![(0.0, 0.0), (0.0, 5.0)]);
        assert_eq!(compress_path(&[(1.0, 1.0)]), vec![(1.0, 1.0), (1.0, 1.0)]);
    }
}
