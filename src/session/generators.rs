/// Suggests a display name for a new player
pub trait NameSuggester: Send + Sync {
    fn suggest(&self) -> String;
}

/// Pet name-based suggestions, e.g. "happy-otter"
#[derive(Default)]
pub struct PetNameSuggester;

impl NameSuggester for PetNameSuggester {
    fn suggest(&self) -> String {
        petname::Petnames::default().generate_one(2, "-")
    }
}
