//! Satellite preset table
//!
//! Static mapping between preset ids and the tuner parameters that identify
//! a satellite+transponder. Preset id 0 is reserved for "unknown": clients
//! that are tuned to parameters not matching any known preset report 0.

/// Preset id reserved for unrecognized tuner settings.
pub const UNKNOWN_PRESET: u8 = 0;

/// Tuner parameters as reported by a client.
///
/// All fields are compared as strings; clients report whatever their
/// acquisition daemon hands out and no unit normalization is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunerParams {
    pub frequency: String,
    pub symbolrate: String,
    pub polarization: String,
    pub delivery: String,
    pub modulation: String,
}

/// One known satellite preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SatPreset {
    pub id: u8,
    pub name: &'static str,
    pub frequency: &'static str,
    pub symbolrate: &'static str,
    pub polarization: &'static str,
    pub delivery: &'static str,
    pub modulation: &'static str,
}

impl SatPreset {
    /// Compare all tuner parameters against this preset.
    pub fn matches(&self, params: &TunerParams) -> bool {
        self.frequency == params.frequency
            && self.symbolrate == params.symbolrate
            && self.polarization == params.polarization
            && self.delivery == params.delivery
            && self.modulation == params.modulation
    }

    /// The tuner parameters a client tuned to this preset reports.
    pub fn params(&self) -> TunerParams {
        TunerParams {
            frequency: self.frequency.to_string(),
            symbolrate: self.symbolrate.to_string(),
            polarization: self.polarization.to_string(),
            delivery: self.delivery.to_string(),
            modulation: self.modulation.to_string(),
        }
    }
}

/// The known presets. Ids are stable identifiers used on the wire and in
/// storage; do not renumber.
pub static PRESETS: [SatPreset; 6] = [
    SatPreset {
        id: 1,
        name: "Galaxy 19 (97.0W)",
        frequency: "11929",
        symbolrate: "22000",
        polarization: "v",
        delivery: "DVB-S",
        modulation: "QPSK",
    },
    SatPreset {
        id: 2,
        name: "Hotbird 13 (13.0E)",
        frequency: "11471",
        symbolrate: "27500",
        polarization: "v",
        delivery: "DVB-S",
        modulation: "QPSK",
    },
    SatPreset {
        id: 3,
        name: "Intelsat 20 (68.5E)",
        frequency: "12522",
        symbolrate: "27500",
        polarization: "v",
        delivery: "DVB-S",
        modulation: "QPSK",
    },
    SatPreset {
        id: 4,
        name: "AsiaSat 5 C-band (100.5E)",
        frequency: "3960",
        symbolrate: "30000",
        polarization: "h",
        delivery: "DVB-S",
        modulation: "QPSK",
    },
    SatPreset {
        id: 5,
        name: "Eutelsat (113.0W)",
        frequency: "12089",
        symbolrate: "11719",
        polarization: "h",
        delivery: "DVB-S",
        modulation: "QPSK",
    },
    SatPreset {
        id: 6,
        name: "ABS-2 (74.9E)",
        frequency: "11734",
        symbolrate: "44000",
        polarization: "h",
        delivery: "DVB-S",
        modulation: "QPSK",
    },
];

/// Look up a preset by id.
pub fn get_preset(preset_id: u8) -> Option<&'static SatPreset> {
    PRESETS.iter().find(|p| p.id == preset_id)
}

/// Display name for a preset id, if known.
pub fn sat_name(preset_id: u8) -> Option<&'static str> {
    get_preset(preset_id).map(|p| p.name)
}

/// Display name for a preset id, with a fallback for unknown ids.
pub fn sat_name_or(preset_id: u8, default: &'static str) -> &'static str {
    sat_name(preset_id).unwrap_or(default)
}

/// All known preset ids, in table order.
pub fn preset_ids() -> impl Iterator<Item = u8> {
    PRESETS.iter().map(|p| p.id)
}

/// Find the preset matching the given tuner parameters.
///
/// Returns [`UNKNOWN_PRESET`] when no preset matches.
pub fn match_preset(params: &TunerParams) -> u8 {
    PRESETS
        .iter()
        .find(|p| p.matches(params))
        .map(|p| p.id)
        .unwrap_or(UNKNOWN_PRESET)
}
