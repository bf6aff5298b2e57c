/// Deterministic identifier assignment for compiled content.
///
/// Ids are a pure function of position so recompiling the same source
/// always yields the same ids, keeping save-game references valid.

/// Where a node sits in its chapter's authored layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot<'a> {
    /// Shared opening nodes; position 0 is the chapter entry.
    Prologue(usize),
    /// A node within a perspective track.
    Track { pov: &'a str, position: usize },
    Investigation,
    End,
}

/// The entry node id of chapter `chapter`.
pub fn entry_id(chapter: u32) -> String {
    format!("CH{}_START", chapter)
}

/// Id for the node in `slot` of chapter `chapter`.
pub fn node_id(chapter: u32, slot: Slot<'_>) -> String {
    match slot {
        Slot::Prologue(0) => entry_id(chapter),
        Slot::Prologue(position) => format!("CH{}_{:03}", chapter, position + 1),
        Slot::Track { pov, position } => {
            format!("CH{}_{}_{:03}", chapter, track_label(pov), position + 1)
        }
        Slot::Investigation => format!("CH{}_INVESTIGATION", chapter),
        Slot::End => format!("CH{}_END", chapter),
    }
}

/// Default id for the question at `position` within a case.
pub fn question_id(position: usize) -> String {
    format!("Q{:03}", position + 1)
}

/// Default id for puzzle case `number`.
pub fn case_id(number: u32) -> String {
    format!("CASE_{:03}", number)
}

/// Upper-cased pov name with anything but ASCII alphanumerics mapped to `_`.
fn track_label(pov: &str) -> String {
    pov.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
