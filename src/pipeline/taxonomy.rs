//! The six waste streams and their single correct disposal method.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WasteCategory {
    Biodegradable,
    Recyclable,
    NonRecyclable,
    Hazardous,
    Biomedical,
    EWaste,
}

struct CategoryPolicy {
    category: WasteCategory,
    label: &'static str,
    key: &'static str,
    disposal_method: &'static str,
}

// Ordered by stream number.
const POLICY: [CategoryPolicy; 6] = [
    CategoryPolicy {
        category: WasteCategory::Biodegradable,
        label: "Biodegradable Waste",
        key: "biodegradable",
        disposal_method: "Composting or Anaerobic Digestion",
    },
    CategoryPolicy {
        category: WasteCategory::Recyclable,
        label: "Recyclable Waste",
        key: "recyclable",
        disposal_method: "Recycling at a municipal facility",
    },
    CategoryPolicy {
        category: WasteCategory::NonRecyclable,
        label: "Non-Recyclable Waste",
        key: "nonrecyclable",
        disposal_method: "Landfill or Incineration with energy recovery",
    },
    CategoryPolicy {
        category: WasteCategory::Hazardous,
        label: "Hazardous Waste",
        key: "hazardous",
        disposal_method: "Designated Hazardous Waste Collection Center",
    },
    CategoryPolicy {
        category: WasteCategory::Biomedical,
        label: "Biomedical Waste",
        key: "biomedical",
        disposal_method: "Specialized Medical Waste Disposal",
    },
    CategoryPolicy {
        category: WasteCategory::EWaste,
        label: "E-waste",
        key: "e",
        disposal_method: "Certified E-waste Recycler or Take-back Program",
    },
];

/// Lowercases, drops the word "waste", hyphens and whitespace.
pub fn normalize_label(label: &str) -> String {
    label
        .to_lowercase()
        .replace("waste", "")
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}

impl WasteCategory {
    pub const ALL: [WasteCategory; 6] = [
        WasteCategory::Biodegradable,
        WasteCategory::Recyclable,
        WasteCategory::NonRecyclable,
        WasteCategory::Hazardous,
        WasteCategory::Biomedical,
        WasteCategory::EWaste,
    ];

    fn policy(self) -> &'static CategoryPolicy {
        &POLICY[self.index()]
    }

    fn index(self) -> usize {
        match self {
            WasteCategory::Biodegradable => 0,
            WasteCategory::Recyclable => 1,
            WasteCategory::NonRecyclable => 2,
            WasteCategory::Hazardous => 3,
            WasteCategory::Biomedical => 4,
            WasteCategory::EWaste => 5,
        }
    }

    /// Stream number, 1 through 6.
    pub fn ordinal(self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn label(self) -> &'static str {
        self.policy().label
    }

    pub fn disposal_method(self) -> &'static str {
        self.policy().disposal_method
    }

    /// Resolves a free-form label, ignoring case, hyphens, whitespace and the
    /// word "waste".
    pub fn from_label(label: &str) -> Option<Self> {
        let key = normalize_label(label);
        POLICY
            .iter()
            .find(|policy| policy.key == key)
            .map(|policy| policy.category)
    }

    pub fn from_disposal_method(method: &str) -> Option<Self> {
        let method = method.trim();
        POLICY
            .iter()
            .find(|policy| policy.disposal_method.eq_ignore_ascii_case(method))
            .map(|policy| policy.category)
    }

    pub fn labels() -> impl Iterator<Item = &'static str> {
        POLICY.iter().map(|policy| policy.label)
    }

    pub fn disposal_methods() -> impl Iterator<Item = &'static str> {
        POLICY.iter().map(|policy| policy.disposal_method)
    }
}

impl fmt::Display for WasteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
