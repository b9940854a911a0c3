//! Named LUT table sets.
//!
//! The Log layer selects from its own table set; Creative, Secondary and
//! Accent share the display-referred set. Production tables are supplied by
//! the host; [`LutRegistry::builtin`] carries a few tiny baked-in looks.

use std::borrow::Cow;
use std::sync::OnceLock;

use crate::layers::LayerCategory;
use crate::lut::table::Lut3D;

/// A table plus its menu name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedLut {
    pub name: Cow<'static, str>,
    pub lut: Lut3D,
}

impl NamedLut {
    pub fn new(name: impl Into<Cow<'static, str>>, lut: Lut3D) -> Self {
        Self {
            name: name.into(),
            lut,
        }
    }
}

/// The two table sets layers index into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LutRegistry {
    log: Vec<NamedLut>,
    display: Vec<NamedLut>,
}

impl LutRegistry {
    pub fn new(log: Vec<NamedLut>, display: Vec<NamedLut>) -> Self {
        Self { log, display }
    }

    /// Registry holding the baked-in 2³ looks.
    pub fn builtin() -> Self {
        let load = |entries: &[(&'static str, &'static [f32])]| -> Vec<NamedLut> {
            entries
                .iter()
                .filter_map(|&(name, data)| {
                    Lut3D::from_static(data, BUILTIN_DIMENSION)
                        .ok()
                        .map(|lut| NamedLut::new(name, lut))
                })
                .collect()
        };
        Self {
            log: load(&[("Cool Fade", &COOL_FADE_LOG[..])]),
            display: load(&[("Identity", &IDENTITY[..]), ("Film Warm", &FILM_WARM[..])]),
        }
    }

    /// Process-wide built-in registry, created on first use.
    pub fn shared_builtin() -> &'static Self {
        static BUILTIN: OnceLock<LutRegistry> = OnceLock::new();
        BUILTIN.get_or_init(Self::builtin)
    }

    /// Table set a layer category selects from.
    pub fn tables_for(&self, category: LayerCategory) -> &[NamedLut] {
        match category {
            LayerCategory::Log => &self.log,
            LayerCategory::Creative | LayerCategory::Secondary | LayerCategory::Accent => {
                &self.display
            }
        }
    }

    /// Log table at `index`, or `None` when out of range (including `-1`).
    pub fn log_table(&self, index: i32) -> Option<&Lut3D> {
        lookup(&self.log, index)
    }

    /// Display table at `index`, or `None` when out of range (including `-1`).
    pub fn display_table(&self, index: i32) -> Option<&Lut3D> {
        lookup(&self.display, index)
    }

    pub fn log_count(&self) -> usize {
        self.log.len()
    }

    pub fn display_count(&self) -> usize {
        self.display.len()
    }

    pub fn log_names(&self) -> impl Iterator<Item = &str> {
        self.log.iter().map(|e| e.name.as_ref())
    }

    pub fn display_names(&self) -> impl Iterator<Item = &str> {
        self.display.iter().map(|e| e.name.as_ref())
    }

    /// Lookup over a single id space: display tables first, then log tables.
    pub fn lut_by_id(&self, id: i32) -> Option<&Lut3D> {
        let display = self.display.len() as i32;
        if id < display {
            self.display_table(id)
        } else {
            self.log_table(id - display)
        }
    }
}

fn lookup(tables: &[NamedLut], index: i32) -> Option<&Lut3D> {
    usize::try_from(index)
        .ok()
        .and_then(|i| tables.get(i))
        .map(|e| &e.lut)
}

// ── Built-in tables ─────────────────────────────────────────────────

const BUILTIN_DIMENSION: usize = 2;

#[rustfmt::skip]
static IDENTITY: [f32; 24] = [
    0.0, 0.0, 0.0,
    1.0, 0.0, 0.0,
    0.0, 1.0, 0.0,
    1.0, 1.0, 0.0,
    0.0, 0.0, 1.0,
    1.0, 0.0, 1.0,
    0.0, 1.0, 1.0,
    1.0, 1.0, 1.0,
];

/// Lifts reds, pulls blues down.
#[rustfmt::skip]
static FILM_WARM: [f32; 24] = [
    0.02, 0.0, 0.0,
    1.05, 0.0, 0.0,
    0.05, 1.0, 0.0,
    1.05, 1.0, 0.0,
    0.05, 0.0, 0.90,
    1.05, 0.0, 0.90,
    0.08, 1.0, 0.85,
    1.05, 1.0, 0.90,
];

/// Soft cool fade for log footage.
#[rustfmt::skip]
static COOL_FADE_LOG: [f32; 24] = [
    0.0, 0.0,  0.02,
    0.9, 0.95, 1.05,
    0.0, 1.0,  0.15,
    0.9, 1.0,  1.05,
    0.0, 0.0,  0.90,
    0.9, 0.95, 1.05,
    0.0, 1.0,  0.95,
    0.9, 1.0,  1.05,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_load() {
        let registry = LutRegistry::builtin();
        assert_eq!(registry.log_count(), 1);
        assert_eq!(registry.display_count(), 2);
        assert_eq!(registry.display_names().collect::<Vec<_>>(), ["Identity", "Film Warm"]);
        assert_eq!(registry.log_names().next(), Some("Cool Fade"));
    }

    #[test]
    fn test_builtin_identity_matches_generated_identity() {
        let registry = LutRegistry::builtin();
        assert_eq!(registry.display_table(0), Some(&Lut3D::identity(2).unwrap()));
    }

    #[test]
    fn test_out_of_range_indices() {
        let registry = LutRegistry::builtin();
        assert!(registry.log_table(-1).is_none());
        assert!(registry.log_table(1).is_none());
        assert!(registry.display_table(2).is_none());
        assert!(registry.display_table(i32::MIN).is_none());
    }

    #[test]
    fn test_categories_share_display_set() {
        let registry = LutRegistry::builtin();
        assert_eq!(registry.tables_for(LayerCategory::Log).len(), 1);
        for category in [LayerCategory::Creative, LayerCategory::Secondary, LayerCategory::Accent] {
            assert_eq!(registry.tables_for(category).len(), 2);
        }
    }

    #[test]
    fn test_lut_by_id_spans_both_sets() {
        let registry = LutRegistry::builtin();
        assert_eq!(registry.lut_by_id(1), registry.display_table(1));
        assert_eq!(registry.lut_by_id(2), registry.log_table(0));
        assert!(registry.lut_by_id(3).is_none());
        assert!(registry.lut_by_id(-1).is_none());
    }
}
