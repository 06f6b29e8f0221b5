/// Transient behaviour read from the host each frame. Players only; NPCs
/// leave it at the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Behaviour {
    pub weapon_drawn: bool,
    pub in_combat: bool,
    pub in_tent: bool,
    pub riding: bool,
    pub sharpening: bool,
}

/// Per-frame result of the visibility and distance evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub visible: bool,
    pub distance_sq: f64,
    pub behaviour: Behaviour,
}

impl FrameInfo {
    pub fn hidden() -> Self {
        Self {
            visible: false,
            distance_sq: f64::MAX,
            behaviour: Behaviour::default(),
        }
    }

    /// Stage models in menus have no camera distance; they always win.
    pub fn staged(visible: bool) -> Self {
        Self {
            visible,
            distance_sq: 0.0,
            behaviour: Behaviour::default(),
        }
    }
}

impl Default for FrameInfo {
    fn default() -> Self {
        Self::hidden()
    }
}

/// Live-graph readings the evaluation is a pure function of.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityProbe {
    pub motion_skipped: bool,
    pub distance_sq: f64,
}

/// Applies the range and motion-skip rules.
///
/// Skipped animation always hides the entity: pushing attachment changes onto
/// a suspended pose corrupts it when the host resumes updates. The measured
/// distance is kept even when out of range.
pub fn evaluate(probe: VisibilityProbe, range_sq: Option<f64>, behaviour: Behaviour) -> FrameInfo {
    if probe.motion_skipped {
        return FrameInfo {
            behaviour,
            ..FrameInfo::hidden()
        };
    }

    let distance_sq = if probe.distance_sq.is_nan() {
        f64::MAX
    } else {
        probe.distance_sq
    };
    let in_range = range_sq.map_or(true, |limit| distance_sq <= limit);

    FrameInfo {
        visible: in_range,
        distance_sq,
        behaviour,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(distance_sq: f64) -> VisibilityProbe {
        VisibilityProbe {
            motion_skipped: false,
            distance_sq,
        }
    }

    #[test]
    fn unbounded_range_accepts_any_distance() {
        let info = evaluate(probe(1.0e12), None, Behaviour::default());
        assert!(info.visible);
        assert_eq!(info.distance_sq, 1.0e12);
    }

    #[test]
    fn range_boundary_is_inclusive() {
        assert!(evaluate(probe(100.0), Some(100.0), Behaviour::default()).visible);

        let outside = evaluate(probe(100.5), Some(100.0), Behaviour::default());
        assert!(!outside.visible);
        assert_eq!(outside.distance_sq, 100.5);
    }

    #[test]
    fn skipped_motion_hides_regardless_of_distance() {
        let info = evaluate(
            VisibilityProbe {
                motion_skipped: true,
                distance_sq: 1.0,
            },
            None,
            Behaviour {
                in_combat: true,
                ..Behaviour::default()
            },
        );
        assert!(!info.visible);
        assert_eq!(info.distance_sq, f64::MAX);
        assert!(info.behaviour.in_combat);
    }

    #[test]
    fn nan_distance_sorts_last() {
        let info = evaluate(probe(f64::NAN), None, Behaviour::default());
        assert_eq!(info.distance_sq, f64::MAX);
    }
}
