//! Factory presets and their on-disk user overrides.
//!
//! Each user slot is stored as its own JSON object (`preset_<slot>.json`).
//! Loading is tolerant: every well-formed field is merged onto the factory
//! slot, malformed fields are skipped with a warning, and a record that does
//! not parse at all leaves the factory slot untouched.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};
use crate::param::{ParamId, Snapshot};
use crate::preset::Preset;

pub const SLOT_COUNT: usize = 8;

/// `(key, value, rate, depth)` override on top of the default state.
type Override = (&'static str, i32, i32, i32);

const FACTORY: [(u32, i32, &[Override]); SLOT_COUNT] = [
    (2, 500, &[("M_ZOOM", 300, 139, 307), ("WARP", 1000, 0, 0)]),
    (2, 615, &[("M_ZOOM", 248, 293, 383), ("WARP", 1000, 0, 0)]),
    (
        2,
        673,
        &[
            ("M_ZOOM", 268, 293, 559),
            ("M_TILTX", 553, 305, 880),
            ("M_TILTY", 500, 353, 1000),
            ("WARP", 1000, 0, 0),
        ],
    ),
    (
        2,
        673,
        &[
            ("M_ZOOM", 268, 293, 517),
            ("M_TX", 500, 159, 624),
            ("M_TY", 500, 309, 753),
            ("M_TILTX", 553, 305, 880),
            ("M_TILTY", 500, 353, 1000),
            ("WARP", 1000, 0, 0),
        ],
    ),
    (
        2,
        673,
        &[
            ("M_ZOOM", 359, 293, 517),
            ("M_TX", 500, 159, 624),
            ("M_TY", 500, 309, 753),
            ("M_TILTX", 553, 305, 577),
            ("M_TILTY", 500, 353, 854),
            ("C_ROT", 657, 0, 0),
            ("WARP", 0, 0, 0),
        ],
    ),
    (
        2,
        673,
        &[
            ("M_ZOOM", 268, 293, 517),
            ("M_TX", 500, 159, 624),
            ("M_TY", 500, 309, 753),
            ("M_TILTX", 553, 305, 1000),
            ("M_TILTY", 500, 353, 1000),
            ("C_ROT", 657, 0, 0),
            ("WARP", 0, 0, 0),
            ("C_TX", 500, 389, 739),
            ("C_TY", 500, 209, 763),
            ("GLOW", 164, 395, 129),
        ],
    ),
    (
        2,
        673,
        &[
            ("M_ZOOM", 912, 293, 740),
            ("M_TX", 500, 159, 624),
            ("M_TY", 500, 309, 753),
            ("M_TILTX", 553, 305, 1000),
            ("M_TILTY", 500, 353, 1000),
            ("C_ROT", 657, 0, 0),
            ("WARP", 0, 0, 0),
            ("C_TX", 500, 389, 739),
            ("C_TY", 500, 209, 763),
            ("C_TILTX", 500, 287, 677),
            ("C_TILTY", 500, 443, 557),
            ("GLOW", 164, 395, 129),
        ],
    ),
    (
        2,
        673,
        &[
            ("M_ZOOM", 268, 293, 517),
            ("M_TX", 500, 159, 624),
            ("M_TY", 500, 309, 753),
            ("M_TILTX", 553, 305, 1000),
            ("M_TILTY", 500, 353, 1000),
            ("C_ROT", 657, 0, 0),
            ("WARP", 0, 0, 0),
            ("C_TX", 500, 389, 739),
            ("C_TY", 500, 209, 763),
            ("C_TILTX", 500, 287, 677),
            ("C_TILTY", 500, 443, 557),
            ("RGB", 957, 0, 0),
            ("GLOW", 164, 395, 129),
        ],
    ),
];

fn factory_preset(axis: u32, master_rotation: i32, overrides: &[Override]) -> Preset {
    let mut preset = Preset { axis, ..Preset::default() };
    preset
        .snapshots
        .insert(ParamId::MasterRotation, Snapshot::value(master_rotation));
    for &(key, v, r, d) in overrides {
        if let Some(id) = ParamId::from_key(key) {
            preset.snapshots.insert(id, Snapshot::new(v, r, d));
        }
    }
    preset
}

/// Eight numbered preset slots (1-based) and the currently highlighted one.
#[derive(Debug, Clone)]
pub struct PresetBank {
    slots: Vec<Preset>,
    active: Option<usize>,
}

impl Default for PresetBank {
    fn default() -> Self {
        Self::factory()
    }
}

impl PresetBank {
    pub fn factory() -> Self {
        Self {
            slots: FACTORY
                .iter()
                .map(|(axis, m_rot, overrides)| factory_preset(*axis, *m_rot, overrides))
                .collect(),
            active: None,
        }
    }

    fn index(slot: usize) -> CoreResult<usize> {
        if (1..=SLOT_COUNT).contains(&slot) {
            Ok(slot - 1)
        } else {
            Err(CoreError::preset(format!("slot {slot} out of range 1..={SLOT_COUNT}")))
        }
    }

    pub fn get(&self, slot: usize) -> Option<&Preset> {
        Self::index(slot).ok().map(|i| &self.slots[i])
    }

    pub fn store(&mut self, slot: usize, preset: Preset) -> CoreResult<()> {
        let i = Self::index(slot)?;
        self.slots[i] = preset;
        self.active = Some(slot);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Preset)> {
        self.slots.iter().enumerate().map(|(i, p)| (i + 1, p))
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn set_active(&mut self, slot: Option<usize>) {
        self.active = slot.filter(|s| (1..=SLOT_COUNT).contains(s));
    }

    pub fn record_path(dir: &Path, slot: usize) -> PathBuf {
        dir.join(format!("preset_{slot}.json"))
    }

    /// Merge every user record found in `dir` onto the factory slots.
    /// Returns how many slots were overridden.
    pub fn load_dir(&mut self, dir: &Path) -> usize {
        let mut loaded = 0;
        for slot in 1..=SLOT_COUNT {
            let path = Self::record_path(dir, slot);
            if !path.exists() {
                continue;
            }
            let text = match fs::read_to_string(&path) {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("Cannot read preset {}: {e}", path.display());
                    continue;
                }
            };
            match decode_record(&text, &self.slots[slot - 1]) {
                Ok(preset) => {
                    self.slots[slot - 1] = preset;
                    loaded += 1;
                    log::info!("Loaded user preset {slot}");
                }
                Err(e) => log::warn!("Keeping factory preset {slot}: {e}"),
            }
        }
        loaded
    }

    /// Write one slot as `preset_<slot>.json` under `dir`.
    pub fn save_slot(&self, dir: &Path, slot: usize) -> CoreResult<PathBuf> {
        let i = Self::index(slot)?;
        fs::create_dir_all(dir)?;
        let path = Self::record_path(dir, slot);
        fs::write(&path, encode_record(&self.slots[i])?)?;
        log::info!("Saved preset {slot} to {}", path.display());
        Ok(path)
    }
}

pub fn encode_record(preset: &Preset) -> CoreResult<String> {
    Ok(serde_json::to_string(preset)?)
}

fn as_i32(v: &Value) -> Option<i32> {
    v.as_i64().and_then(|n| i32::try_from(n).ok())
}

fn decode_snapshot(v: &Value) -> Option<Snapshot> {
    let obj = v.as_object()?;
    let value = as_i32(obj.get("v")?)?;
    let field = |k: &str| obj.get(k).and_then(as_i32).unwrap_or(0);
    Some(Snapshot::new(value, field("r"), field("d")))
}

fn merge_controls(controls: &Map<String, Value>, preset: &mut Preset) {
    for (key, value) in controls {
        let Some(id) = ParamId::from_key(key) else {
            log::warn!("Preset field {key:?} is not a known control, skipped");
            continue;
        };
        match decode_snapshot(value) {
            Some(snap) => {
                preset.snapshots.insert(id, snap);
            }
            None => log::warn!("Preset control {key:?} is malformed, skipped"),
        }
    }
}

/// Parse a record and merge it onto `fallback`.
///
/// Fails only when the text is not a JSON object; individual bad fields
/// keep the fallback's value.
pub fn decode_record(text: &str, fallback: &Preset) -> CoreResult<Preset> {
    let root: Value = serde_json::from_str(text)?;
    let Some(root) = root.as_object() else {
        return Err(CoreError::preset("record is not a JSON object"));
    };

    let mut preset = fallback.clone();
    for (key, value) in root {
        let ok = match key.as_str() {
            "axis" => value
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(|n| preset.axis = n)
                .is_some(),
            "flipX" => value.as_f64().map(|f| preset.flip_x = f as f32).is_some(),
            "flipY" => value.as_f64().map(|f| preset.flip_y = f as f32).is_some(),
            "rot180" => value.as_bool().map(|b| preset.rot180 = b).is_some(),
            "controls" => value
                .as_object()
                .map(|c| merge_controls(c, &mut preset))
                .is_some(),
            _ => {
                log::warn!("Unknown preset field {key:?}, skipped");
                true
            }
        };
        if !ok {
            log::warn!("Preset field {key:?} has the wrong type, skipped");
        }
    }
    preset.sanitize();
    Ok(preset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::PARAM_COUNT;

    #[test]
    fn factory_slots_are_complete() {
        let bank = PresetBank::factory();
        assert_eq!(bank.iter().count(), SLOT_COUNT);
        for (_, p) in bank.iter() {
            assert_eq!(p.snapshots.len(), PARAM_COUNT);
            assert_eq!(p.axis, 2);
            assert_eq!((p.flip_x, p.flip_y, p.rot180), (1.0, -1.0, false));
        }
        let eight = bank.get(8).unwrap();
        assert_eq!(eight.snapshot(ParamId::SensorRgb), Some(Snapshot::value(957)));
        assert_eq!(eight.snapshot(ParamId::Glow), Some(Snapshot::new(164, 395, 129)));
        assert_eq!(bank.get(1).unwrap().snapshot(ParamId::MasterRotation), Some(Snapshot::value(500)));
    }

    #[test]
    fn slot_zero_and_nine_are_rejected() {
        let mut bank = PresetBank::factory();
        assert!(bank.get(0).is_none());
        assert!(bank.get(9).is_none());
        assert!(bank.store(9, Preset::default()).is_err());
    }

    #[test]
    fn record_matches_persisted_shape() {
        let mut p = Preset::default();
        p.snapshots.clear();
        p.snapshots.insert(ParamId::MasterZoom, Snapshot::new(300, 139, 307));
        let json = encode_record(&p).unwrap();
        assert_eq!(
            json,
            r#"{"axis":2,"flipX":1.0,"flipY":-1.0,"rot180":false,"controls":{"M_ZOOM":{"v":300,"r":139,"d":307}}}"#
        );
    }

    #[test]
    fn decode_merges_onto_fallback() {
        let fallback = PresetBank::factory().get(3).unwrap().clone();
        let text = r#"{"axis":5,"controls":{"HUE":{"v":250}}}"#;
        let p = decode_record(text, &fallback).unwrap();
        assert_eq!(p.axis, 5);
        assert_eq!(p.snapshot(ParamId::Hue), Some(Snapshot::value(250)));
        assert_eq!(p.snapshot(ParamId::MasterZoom), fallback.snapshot(ParamId::MasterZoom));
        assert_eq!(p.flip_y, -1.0);
    }

    #[test]
    fn decode_skips_bad_fields() {
        let fallback = Preset::default();
        let text = r#"{
            "axis": "six",
            "flipX": -1.0,
            "rot180": 3,
            "controls": {
                "NOPE": {"v": 1},
                "GLOW": {"r": 5},
                "NEG": "high",
                "HUE": {"v": 700, "r": "x", "d": 12}
            }
        }"#;
        let p = decode_record(text, &fallback).unwrap();
        assert_eq!(p.axis, 2);
        assert_eq!(p.flip_x, -1.0);
        assert!(!p.rot180);
        assert_eq!(p.snapshot(ParamId::Glow), fallback.snapshot(ParamId::Glow));
        assert_eq!(p.snapshot(ParamId::Negative), fallback.snapshot(ParamId::Negative));
        assert_eq!(p.snapshot(ParamId::Hue), Some(Snapshot::new(700, 0, 12)));
    }

    #[test]
    fn decode_rejects_non_objects() {
        assert!(decode_record("[1,2]", &Preset::default()).is_err());
        assert!(decode_record("{not json", &Preset::default()).is_err());
    }

    #[test]
    fn save_then_load_dir() {
        let dir = std::env::temp_dir().join(format!("beam-bank-{}", std::process::id()));
        let mut bank = PresetBank::factory();
        let mut custom = Preset::default();
        custom.rot180 = true;
        custom.snapshots.insert(ParamId::Flux, Snapshot::new(900, 10, 20));
        bank.store(4, custom.clone()).unwrap();
        bank.save_slot(&dir, 4).unwrap();
        fs::write(PresetBank::record_path(&dir, 5), "garbage").unwrap();

        let mut fresh = PresetBank::factory();
        assert_eq!(fresh.load_dir(&dir), 1);
        assert_eq!(fresh.get(4), Some(&custom));
        assert_eq!(fresh.get(5), PresetBank::factory().get(5));
        let _ = fs::remove_dir_all(&dir);
    }
}
