//! The closed vocabulary `Journal::subject_areas` values must come from
//! (spec §3.2).

pub const SUBJECT_AREAS: [&str; 8] = [
    "Agricultural Sciences",
    "Applied Social Sciences",
    "Biological Sciences",
    "Engineering",
    "Exact and Earth Sciences",
    "Health Sciences",
    "Human Sciences",
    "Linguistics, Letters and Arts",
];

pub fn is_valid(area: &str) -> bool {
    SUBJECT_AREAS.contains(&area)
}
