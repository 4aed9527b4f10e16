//! Sliding units off static obstacles after a collision.

use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::math::{Fixed, Vec2Fixed};

/// Override velocity direction applied for a short window after a collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallSlide {
    /// Unit-length direction.
    pub direction: Vec2Fixed,
    /// Battle time at which the override ends.
    pub until: u64,
}

impl WallSlide {
    /// Whether the override still applies at `now`.
    #[must_use]
    pub const fn is_active(&self, now: u64) -> bool {
        now < self.until
    }
}

/// Result of handling one collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallRecovery {
    /// Override velocity for the slide window.
    pub slide: WallSlide,
    /// End of the forced-pathfinding window.
    pub force_path_until: u64,
}

/// Computes slide vectors from collision geometry.
#[derive(Debug, Clone, Copy)]
pub struct WallRecoveryController<'a> {
    ai: &'a AiConfig,
}

impl<'a> WallRecoveryController<'a> {
    /// Create a controller with the given tuning.
    #[must_use]
    pub const fn new(ai: &'a AiConfig) -> Self {
        Self { ai }
    }

    /// Handle a collision between a unit at `position` and an obstacle
    /// centered at `obstacle_center`, while the unit heads for `goal`.
    #[must_use]
    pub fn on_collision(
        &self,
        now: u64,
        position: Vec2Fixed,
        obstacle_center: Vec2Fixed,
        goal: Option<Vec2Fixed>,
    ) -> WallRecovery {
        let direction = self.slide_direction(position, obstacle_center, goal);
        WallRecovery {
            slide: WallSlide {
                direction,
                until: now + u64::from(self.ai.wall_slide_ms),
            },
            force_path_until: now + u64::from(self.ai.force_path_window_ms),
        }
    }

    /// Unit vector `normalize(slide * w_slide + repulsion * w_repulse)`.
    ///
    /// The slide runs along the axis with the smaller offset from the
    /// obstacle center, i.e. parallel to the face that was hit. Its sign
    /// points toward the goal along that axis, falling back to the side
    /// the unit is already on.
    #[must_use]
    pub fn slide_direction(
        &self,
        position: Vec2Fixed,
        obstacle_center: Vec2Fixed,
        goal: Option<Vec2Fixed>,
    ) -> Vec2Fixed {
        let offset = position - obstacle_center;
        let slide_along_x = offset.x.abs() <= offset.y.abs();

        let toward_goal = goal.map_or(Fixed::ZERO, |g| {
            if slide_along_x {
                g.x - position.x
            } else {
                g.y - position.y
            }
        });
        let own_side = if slide_along_x { offset.x } else { offset.y };

        let sign = if toward_goal != Fixed::ZERO {
            toward_goal.signum()
        } else if own_side != Fixed::ZERO {
            own_side.signum()
        } else {
            Fixed::ONE
        };

        let slide = if slide_along_x {
            Vec2Fixed::new(sign, Fixed::ZERO)
        } else {
            Vec2Fixed::new(Fixed::ZERO, sign)
        };
        let repulsion = offset.normalize();

        (slide.scale(self.ai.wall_slide_weight) + repulsion.scale(self.ai.wall_repulsion_weight))
            .normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec2(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    #[test]
    fn test_hit_top_face_slides_horizontally_toward_goal() {
        let ai = AiConfig::default();
        let controller = WallRecoveryController::new(&ai);

        // Unit above the obstacle, goal to the left
        let dir = controller.slide_direction(vec2(2, -20), vec2(0, 0), Some(vec2(-100, 50)));

        assert!(dir.x < Fixed::ZERO, "should slide toward goal: {dir:?}");
        assert!(dir.y < Fixed::ZERO, "should push away from obstacle: {dir:?}");
    }

    #[test]
    fn test_hit_side_face_slides_vertically() {
        let ai = AiConfig::default();
        let controller = WallRecoveryController::new(&ai);

        // Unit right of the obstacle, goal below
        let dir = controller.slide_direction(vec2(20, 3), vec2(0, 0), Some(vec2(0, 200)));

        assert!(dir.y > Fixed::ZERO);
        assert!(dir.x > Fixed::ZERO);
    }

    #[test]
    fn test_without_goal_slides_to_own_side() {
        let ai = AiConfig::default();
        let controller = WallRecoveryController::new(&ai);

        let dir = controller.slide_direction(vec2(-3, -20), vec2(0, 0), None);
        assert!(dir.x < Fixed::ZERO);
    }

    #[test]
    fn test_direction_is_unit_length() {
        let ai = AiConfig::default();
        let controller = WallRecoveryController::new(&ai);

        let dir = controller.slide_direction(vec2(7, -13), vec2(0, 0), Some(vec2(40, 40)));
        let len_sq = dir.dot(dir);
        assert!((len_sq - Fixed::ONE).abs() < crate::math::ratio(1, 1000));
    }

    #[test]
    fn test_collision_arms_windows() {
        let ai = AiConfig::default();
        let controller = WallRecoveryController::new(&ai);

        let recovery = controller.on_collision(1000, vec2(0, -20), vec2(0, 0), None);
        assert_eq!(recovery.slide.until, 1250);
        assert_eq!(recovery.force_path_until, 2500);
        assert!(recovery.slide.is_active(1249));
        assert!(!recovery.slide.is_active(1250));
    }
}
