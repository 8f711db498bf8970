/// Modals paused beneath the active one, most recent last.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NavigationStack {
    entries: Vec<String>,
}

impl NavigationStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// A modal appears at most once; pushing it again moves it to the top.
    pub fn push(&mut self, modal_id: &str) {
        self.remove(modal_id);
        self.entries.push(modal_id.to_string());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.entries.pop()
    }

    pub fn remove(&mut self, modal_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry != modal_id);
        before != self.entries.len()
    }

    pub fn contains(&self, modal_id: &str) -> bool {
        self.entries.iter().any(|entry| entry == modal_id)
    }

    pub fn top(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}
