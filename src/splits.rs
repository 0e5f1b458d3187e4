//! Split definitions - the push/pull/legs/rest catalog

/// Name of the recovery split, also used as the deload placeholder
pub const REST: &str = "Rest";

/// Rotation used by auto-scheduling, one step per calendar day
pub const ROTATION: [&str; 4] = ["Push", "Pull", "Legs", REST];

#[derive(Debug, Clone)]
pub struct SplitDefinition {
    pub name: &'static str,
    pub description: &'static str,
}

/// Catalog seeded into every database, in id order
pub const DEFAULT_SPLITS: &[SplitDefinition] = &[
    SplitDefinition {
        name: "Push",
        description: "Chest, shoulders and triceps",
    },
    SplitDefinition {
        name: "Pull",
        description: "Back and biceps",
    },
    SplitDefinition {
        name: "Legs",
        description: "Quads, hamstrings, glutes and calves",
    },
    SplitDefinition {
        name: REST,
        description: "Rest Day - Recovery",
    },
];

/// Split for a rotation counter value
pub fn rotation_split_name(counter: usize) -> &'static str {
    ROTATION[counter % ROTATION.len()]
}

/// Suggest the split for the next training day
pub fn next_split_after(current: &str) -> &'static str {
    match current.to_lowercase().as_str() {
        "push" => "Pull",
        "pull" => "Legs",
        "legs" => "Push",
        _ => "Push",
    }
}

/// Fallback split when nothing is planned for a day (0 = Sunday)
pub fn default_split_for_weekday(weekday: u32) -> &'static str {
    match weekday % 7 {
        0 => REST,
        1 | 4 => "Pull",
        2 | 5 => "Push",
        _ => "Legs",
    }
}

/// Guess the split of a logged workout from its exercise categories
pub fn split_for_categories<'a, I>(categories: I) -> &'static str
where
    I: IntoIterator<Item = &'a str>,
{
    let categories: Vec<String> = categories.into_iter().map(|c| c.to_lowercase()).collect();
    let any = |keys: &[&str]| categories.iter().any(|c| keys.iter().any(|k| c.contains(k)));

    if any(&["chest", "shoulder", "tricep"]) {
        "Push"
    } else if any(&["back", "bicep"]) {
        "Pull"
    } else if any(&["leg", "quad", "hamstring", "glute", "calf"]) {
        "Legs"
    } else {
        "Push"
    }
}

pub fn find_split_definition(name: &str) -> Option<&'static SplitDefinition> {
    DEFAULT_SPLITS.iter().find(|s| s.name == name)
}
