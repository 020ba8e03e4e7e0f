//! Beam-mode derivation for the binary dialects.
//!
//! Raw beam codes (e.g. `["W1", "W2", "W3", "S7"]`) are concatenated and every
//! rule of `BEAM_RULES` is tested in order. A later match overwrites an earlier
//! one, so generic single-letter rules come first and the multi-beam ScanSAR
//! combinations last. Reordering the table changes results.

/// Width of the stored beam-mode tag.
pub const BEAM_TAG_WIDTH: usize = 5;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BeamMode {
    Standard,
    Wide,
    Fine,
    ExtendedLow,
    ExtendedHigh,
    ScanSarNarrowA,
    ScanSarNarrowB,
    ScanSarWideA,
    ScanSarWideB,
}

const BEAM_RULES: &[(&str, BeamMode)] = &[
    ("S", BeamMode::Standard),
    ("W", BeamMode::Wide),
    ("F", BeamMode::Fine),
    ("EL", BeamMode::ExtendedLow),
    ("EH", BeamMode::ExtendedHigh),
    ("W2S5S6", BeamMode::ScanSarNarrowB),
    ("W1W2", BeamMode::ScanSarNarrowA),
    ("W1W2S5S6", BeamMode::ScanSarWideB),
    ("W1W2W3S7", BeamMode::ScanSarWideA),
];

impl BeamMode {
    pub fn name(self) -> &'static str {
        match self {
            BeamMode::Standard => "Standard",
            BeamMode::Wide => "Wide",
            BeamMode::Fine => "Fine",
            BeamMode::ExtendedLow => "Extended Low",
            BeamMode::ExtendedHigh => "Extended High",
            BeamMode::ScanSarNarrowA | BeamMode::ScanSarNarrowB => "ScanSAR Narrow",
            BeamMode::ScanSarWideA | BeamMode::ScanSarWideB => "ScanSAR Wide",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            BeamMode::Standard => "S",
            BeamMode::Wide => "W",
            BeamMode::Fine => "F",
            BeamMode::ExtendedLow => "EL",
            BeamMode::ExtendedHigh => "EH",
            BeamMode::ScanSarNarrowA => "SCNA",
            BeamMode::ScanSarNarrowB => "SCNB",
            BeamMode::ScanSarWideA => "SCWA",
            BeamMode::ScanSarWideB => "SCWB",
        }
    }

    /// Short mnemonic: ScanSAR modes use their fixed designator, single-beam
    /// modes keep the beam number of the first matching code (`"F2"`, `"EH3"`).
    pub fn mnemonic(self, codes: &[String]) -> String {
        let prefix = self.prefix();
        if prefix.len() >= 4 {
            return prefix.to_string();
        }
        codes
            .iter()
            .map(|c| c.trim().to_ascii_uppercase())
            .find(|c| {
                c.strip_prefix(prefix)
                    .is_some_and(|rest| rest.chars().all(|ch| ch.is_ascii_digit()))
            })
            .unwrap_or_else(|| prefix.to_string())
    }
}

/// Apply the rule table to the concatenated codes; `None` when nothing matches.
pub fn classify(codes: &[String]) -> Option<BeamMode> {
    let joined: String = codes
        .iter()
        .map(|c| c.trim().to_ascii_uppercase())
        .collect();
    let mut mode = None;
    for (pattern, candidate) in BEAM_RULES {
        if joined.contains(pattern) {
            mode = Some(*candidate);
        }
    }
    mode
}

/// Left-pad (right-align) to `BEAM_TAG_WIDTH`, truncating longer mnemonics.
pub fn fixed_width_tag(mnemonic: &str) -> String {
    let truncated: String = mnemonic.trim().chars().take(BEAM_TAG_WIDTH).collect();
    format!("{:>width$}", truncated, width = BEAM_TAG_WIDTH)
}

/// Beam-mode tag derived from raw codes, or `None` when no rule matches.
pub fn derive_beam_tag(codes: &[String]) -> Option<String> {
    classify(codes).map(|mode| fixed_width_tag(&mode.mnemonic(codes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_beam_modes_keep_beam_number() {
        assert_eq!(classify(&codes(&["S3"])), Some(BeamMode::Standard));
        assert_eq!(derive_beam_tag(&codes(&["S3"])).unwrap(), "   S3");
        assert_eq!(derive_beam_tag(&codes(&["F2"])).unwrap(), "   F2");
        assert_eq!(derive_beam_tag(&codes(&["EH3"])).unwrap(), "  EH3");
        assert_eq!(derive_beam_tag(&codes(&["w1"])).unwrap(), "   W1");
    }

    #[test]
    fn later_scansar_rules_overwrite_generic_matches() {
        assert_eq!(
            classify(&codes(&["W1", "W2", "W3", "S7"])),
            Some(BeamMode::ScanSarWideA)
        );
        assert_eq!(
            classify(&codes(&["W1", "W2", "S5", "S6"])),
            Some(BeamMode::ScanSarWideB)
        );
        assert_eq!(
            classify(&codes(&["W2", "S5", "S6"])),
            Some(BeamMode::ScanSarNarrowB)
        );
        assert_eq!(classify(&codes(&["W1", "W2"])), Some(BeamMode::ScanSarNarrowA));
        assert_eq!(derive_beam_tag(&codes(&["W1", "W2"])).unwrap(), " SCNA");
        assert_eq!(BeamMode::ScanSarWideA.name(), "ScanSAR Wide");
    }

    #[test]
    fn rule_order_is_load_bearing() {
        // The reversed table would settle on the generic Standard rule.
        let joined = "W1W2W3S7";
        let mut reversed = None;
        for (pattern, mode) in BEAM_RULES.iter().rev() {
            if joined.contains(pattern) {
                reversed = Some(*mode);
            }
        }
        assert_eq!(reversed, Some(BeamMode::Standard));
        assert_eq!(
            classify(&codes(&["W1", "W2", "W3", "S7"])),
            Some(BeamMode::ScanSarWideA)
        );
    }

    #[test]
    fn unknown_codes_do_not_classify() {
        assert_eq!(classify(&codes(&["Q9"])), None);
        assert_eq!(classify(&[]), None);
    }

    #[test]
    fn tags_are_fixed_width() {
        assert_eq!(fixed_width_tag("IW"), "   IW");
        assert_eq!(fixed_width_tag("SCWA"), " SCWA");
        assert_eq!(fixed_width_tag("EXTRAFINE"), "EXTRA");
    }
}
