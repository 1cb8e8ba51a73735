/// Class names in the order the model emits its scores.
pub const CLASS_NAMES: [&str; 6] = [
    "bacterial",
    "early",
    "mold",
    "target spot",
    "yellow",
    "healthy",
];

const UNKNOWN_DESCRIPTION: &str = "Unknown class";
const UNKNOWN_ACTION: &str = "No action available";

/// Human-readable diagnosis attached to a predicted class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advice {
    pub description: &'static str,
    pub action: &'static str,
}

const ADVICE_TABLE: [(&str, Advice); 6] = [
    (
        "healthy",
        Advice {
            description: "Green, medium to large leaves.",
            action: "Water 1-2 times daily, add compost biweekly, ensure 4-6 hours of sunlight.",
        },
    ),
    (
        "yellow",
        Advice {
            description: "Yellowing leaves, often starting from the bottom.",
            action: "Add NPK fertilizer, reduce watering, remove yellow leaves.",
        },
    ),
    (
        "target spot",
        Advice {
            description: "Yellow or brown spots on leaves, expanding and merging.",
            action: "Prune infected leaves, use fungicides, ensure proper spacing.",
        },
    ),
    (
        "mold",
        Advice {
            description: "Brown, black, or gray spots with white fungal layer.",
            action: "Clean the garden, space plants well, use fungicides, remove infected leaves.",
        },
    ),
    (
        "early",
        Advice {
            description: "Brown spots with dark concentric rings.",
            action: "Prune infected leaves, use fungicides, ensure good air circulation.",
        },
    ),
    (
        "bacterial",
        Advice {
            description: "Wilting leaves, brown/black spots, rotten fruit.",
            action: "Remove infected plants, use antibiotics (with guidance), ensure proper spacing.",
        },
    ),
];

/// Maps a model output index to its class name.
pub fn class_name(index: usize) -> Option<&'static str> {
    CLASS_NAMES.get(index).copied()
}

/// Looks up the advice for a class name, falling back to a generic entry
/// for names outside the table.
pub fn advice_for(label: &str) -> Advice {
    ADVICE_TABLE
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, advice)| *advice)
        .unwrap_or(Advice {
            description: UNKNOWN_DESCRIPTION,
            action: UNKNOWN_ACTION,
        })
}
