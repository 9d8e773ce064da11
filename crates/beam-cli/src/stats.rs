use beam_core::{ParamId, ResolvedParams, WrapMode, PARAM_COUNT};

/// A jump this large between ticks can only be the 0/1 seam.
const SEAM_JUMP: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    pub seam_crossings: u32,
    last: Option<f32>,
}

impl Default for ParamRange {
    fn default() -> Self {
        Self { min: f32::INFINITY, max: f32::NEG_INFINITY, seam_crossings: 0, last: None }
    }
}

impl ParamRange {
    fn observe(&mut self, v: f32, wrap: WrapMode) {
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        if let Some(last) = self.last {
            if wrap == WrapMode::Wrap && (v - last).abs() > SEAM_JUMP {
                self.seam_crossings += 1;
            }
        }
        self.last = Some(v);
    }

    pub fn moved(&self) -> bool {
        self.max > self.min
    }
}

/// Per-parameter extremes of a simulated run.
#[derive(Debug, Clone)]
pub struct RunStats {
    ranges: [ParamRange; PARAM_COUNT],
    ticks: u64,
}

impl Default for RunStats {
    fn default() -> Self {
        Self { ranges: [ParamRange::default(); PARAM_COUNT], ticks: 0 }
    }
}

impl RunStats {
    pub fn observe(&mut self, resolved: &ResolvedParams) {
        for id in ParamId::ALL {
            self.ranges[id.index()].observe(resolved[id], id.spec().wrap);
        }
        self.ticks += 1;
    }

    pub fn range(&self, id: ParamId) -> &ParamRange {
        &self.ranges[id.index()]
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Everything outside `[0, 1]`. Empty on a healthy run.
    pub fn out_of_range(&self) -> Vec<ParamId> {
        ParamId::ALL
            .into_iter()
            .filter(|id| {
                let r = self.range(*id);
                r.min < 0.0 || r.max > 1.0
            })
            .collect()
    }

    /// One line per parameter that moved during the run.
    pub fn summary(&self) -> Vec<String> {
        ParamId::ALL
            .into_iter()
            .filter(|id| self.range(*id).moved())
            .map(|id| {
                let r = self.range(id);
                format!(
                    "{:<10} min {:.4}  max {:.4}  seams {}",
                    id.key(),
                    r.min,
                    r.max,
                    r.seam_crossings
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved_with(id: ParamId, v: f32) -> ResolvedParams {
        let mut r = ResolvedParams::default();
        r.0[id.index()] = v;
        r
    }

    #[test]
    fn wrap_jumps_count_as_seams() {
        let mut stats = RunStats::default();
        for v in [0.8, 0.95, 0.02, 0.1, 0.97] {
            stats.observe(&resolved_with(ParamId::Hue, v));
        }
        let hue = stats.range(ParamId::Hue);
        assert_eq!(hue.seam_crossings, 2);
        assert_eq!((hue.min, hue.max), (0.02, 0.97));
        assert!(stats.out_of_range().is_empty());
        assert_eq!(stats.ticks(), 5);
    }

    #[test]
    fn mirror_parameters_never_count_seams() {
        let mut stats = RunStats::default();
        for v in [0.9, 0.1, 0.9] {
            stats.observe(&resolved_with(ParamId::Glow, v));
        }
        assert_eq!(stats.range(ParamId::Glow).seam_crossings, 0);
        assert_eq!(stats.summary().len(), 1);
    }
}
